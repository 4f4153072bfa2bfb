//! Hugging Face download collaborator.
//!
//! The `hf` CLI does the actual transfer; this module owns the invocation,
//! the one-shot retry without the quantization filter, and the selection of
//! the working GGUF among whatever landed on disk. The CLI's flag surface
//! has drifted across releases, so support for `--local-dir-use-symlinks`
//! is probed once per process and cached.

use std::{
    path::{Path, PathBuf},
    process::Command,
    sync::OnceLock,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::error::{PrepError, PrepResult};

const HF_EXECUTABLE: &str = "hf";
const HF_REMEDIATION: &str =
    "Install the Hugging Face CLI with: python -m pip install -U huggingface_hub";

static HF_DOWNLOAD_HELP: OnceLock<String> = OnceLock::new();

/// One-time capability probe: some `hf` releases accept
/// `--local-dir-use-symlinks`, others reject it. Probed lazily on first
/// need; the result holds for the process lifetime.
fn supports_local_dir_use_symlinks() -> bool {
    let help = HF_DOWNLOAD_HELP.get_or_init(|| {
        Command::new(HF_EXECUTABLE)
            .args(["download", "--help"])
            .output()
            .map(|out| {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                text
            })
            .unwrap_or_default()
    });
    help.contains("--local-dir-use-symlinks")
}

/// Downloads GGUF files from `repo_id` into a fresh subdirectory of the
/// downloads cache and returns the selected working file.
pub struct HfFetcher<'a> {
    downloads_dir: &'a Path,
}

impl<'a> HfFetcher<'a> {
    pub fn new(downloads_dir: &'a Path) -> Self {
        Self { downloads_dir }
    }

    pub fn fetch(&self, repo_id: &str, quant: Option<&str>) -> PrepResult<PathBuf> {
        if crate::tools::which(HF_EXECUTABLE).is_none() {
            return Err(PrepError::ToolNotFound {
                tool: HF_EXECUTABLE,
                remediation: HF_REMEDIATION,
            });
        }

        let dest = self.fresh_download_dir()?;

        if let Some(quant) = quant {
            tracing::info!("downloading {repo_id} (quantization filter: {quant})");
            self.run_download(repo_id, &dest, &format!("*{quant}*.gguf"))?;
            // Filter may have been too strict; one retry without it.
            if collect_ggufs(&dest).is_empty() {
                tracing::warn!("no files matched '{quant}'; retrying without the filter");
                self.run_download(repo_id, &dest, "*.gguf")?;
            }
        } else {
            tracing::info!("downloading {repo_id}");
            self.run_download(repo_id, &dest, "*.gguf")?;
        }

        let ggufs = collect_ggufs(&dest);
        if ggufs.is_empty() {
            return Err(PrepError::DownloadFailed(format!(
                "no GGUF files found in {repo_id}. If this is a gated repo, run 'hf auth login' first"
            )));
        }
        Ok(select_working_gguf(ggufs))
    }

    fn fresh_download_dir(&self) -> PrepResult<PathBuf> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let dir = self
            .downloads_dir
            .join(format!("hf_{}_{nanos:08x}", std::process::id()));
        std::fs::create_dir_all(&dir)
            .map_err(|e| PrepError::file_system("create download dir", &dir, e))?;
        Ok(dir)
    }

    fn run_download(&self, repo_id: &str, dest: &Path, include: &str) -> PrepResult<()> {
        let mut cmd = Command::new(HF_EXECUTABLE);
        cmd.arg("download")
            .arg(repo_id)
            .arg("--local-dir")
            .arg(dest)
            .arg("--include")
            .arg(include)
            // Quiet the warning in environments where symlinks are blocked.
            .env("HF_HUB_DISABLE_SYMLINKS_WARNING", "1");
        if supports_local_dir_use_symlinks() {
            cmd.args(["--local-dir-use-symlinks", "False"]);
        }

        let out = cmd
            .output()
            .map_err(|e| PrepError::file_system("spawn hf download", HF_EXECUTABLE, e))?;
        if !out.status.success() {
            let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
            output.push_str(&String::from_utf8_lossy(&out.stderr));
            return Err(PrepError::DownloadFailed(format!(
                "hf download exited with {}:\n{output}",
                out.status
            )));
        }
        Ok(())
    }
}

/// Recursively lists `.gguf` files under `dir`. Traversal errors degrade to
/// an empty or partial listing; "nothing found" has its own diagnostic.
fn collect_ggufs(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return found,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(collect_ggufs(&path));
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gguf"))
        {
            found.push(path);
        }
    }
    found
}

/// Companion GGUFs that are never the model weights themselves.
fn is_helper_gguf(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    ["imatrix", "mmproj", "clip", "vision", "text-encoder", "vae"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

fn is_first_shard(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    lowered.ends_with(".gguf") && lowered.contains("-00001-of-")
}

/// Picks the file the pipeline should continue with: real weights over
/// helper files, the first shard when the repo is sharded, otherwise the
/// largest file.
fn select_working_gguf(ggufs: Vec<PathBuf>) -> PathBuf {
    let name_of = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    let mut primary: Vec<PathBuf> = ggufs
        .iter()
        .filter(|p| !is_helper_gguf(&name_of(p)))
        .cloned()
        .collect();
    if primary.is_empty() {
        primary = ggufs;
    }

    let mut first_shards: Vec<PathBuf> = primary
        .iter()
        .filter(|p| is_first_shard(&name_of(p)))
        .cloned()
        .collect();
    if !first_shards.is_empty() {
        first_shards.sort_by_key(|p| name_of(p));
        return first_shards.remove(0);
    }

    primary.sort_by_key(|p| {
        std::cmp::Reverse(std::fs::metadata(p).map(|m| m.len()).unwrap_or(0))
    });
    primary.remove(0)
}
