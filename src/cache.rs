//! Cache layout, the content-addressed merge cache, and cache maintenance.
//!
//! The cache root holds three subdirectories shared across invocations:
//!
//! ```text
//! <cache-root>/
//! ├── downloads/   # per-invocation Hugging Face download targets
//! ├── merged/      # merge cache: merged_<fingerprint>.gguf
//! └── work/        # scratch directories (Modelfiles, temp state)
//! ```
//!
//! There is deliberately no locking: this is a single-user interactive tool,
//! and two concurrent invocations with the same fingerprint may both run the
//! merge and write the same destination. The loser's work is wasted, not
//! corrupted, because a cache hit requires a non-empty file at the
//! deterministic path.

use std::path::{Path, PathBuf};

use crate::{
    error::{PrepError, PrepResult},
    shard::ShardSet,
};

/// Resolved, existing cache directories for one invocation.
#[derive(Debug, Clone)]
pub struct CacheDirs {
    pub root: PathBuf,
    pub downloads: PathBuf,
    pub merged: PathBuf,
    pub work: PathBuf,
}

impl CacheDirs {
    /// Resolves the layout under `root`, creating anything missing.
    pub fn resolve(root: impl Into<PathBuf>) -> PrepResult<Self> {
        let root = root.into();
        let dirs = Self {
            downloads: root.join("downloads"),
            merged: root.join("merged"),
            work: root.join("work"),
            root,
        };
        for dir in [&dirs.root, &dirs.downloads, &dirs.merged, &dirs.work] {
            std::fs::create_dir_all(dir)
                .map_err(|e| PrepError::file_system("create cache dir", dir, e))?;
        }
        Ok(dirs)
    }
}

/// Durable, content-addressed store of merge outputs, keyed by shard-set
/// fingerprint. Guarantees at most one successful merge per distinct
/// fingerprint in sequential use.
#[derive(Debug, Clone)]
pub struct MergeCache {
    dir: PathBuf,
    merge_tool: PathBuf,
}

impl MergeCache {
    pub fn new(dir: impl Into<PathBuf>, merge_tool: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            merge_tool: merge_tool.into(),
        }
    }

    /// Deterministic output path for a fingerprint.
    pub fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("merged_{fingerprint}.gguf"))
    }

    /// A hit requires an existing, non-empty file — a zero-byte leftover
    /// from a failed merge is not trusted.
    pub fn lookup(&self, fingerprint: &str) -> Option<PathBuf> {
        let path = self.entry_path(fingerprint);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.len() > 0 => Some(path),
            _ => None,
        }
    }

    /// Runs the external merge tool, targeting the deterministic cache path
    /// for this fingerprint.
    pub fn store(&self, fingerprint: &str, shards: &ShardSet) -> PrepResult<PathBuf> {
        if shards.len() < 2 {
            return Err(PrepError::ShardSetIncomplete);
        }

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| PrepError::file_system("create merged dir", &self.dir, e))?;

        let dest = self.entry_path(fingerprint);
        tracing::info!(
            "merging {} shards into {}",
            shards.len(),
            dest.file_name().unwrap_or_default().to_string_lossy()
        );

        // llama-gguf-split --merge <first_shard> <output>
        let out = std::process::Command::new(&self.merge_tool)
            .arg("--merge")
            .arg(shards.first())
            .arg(&dest)
            .output()
            .map_err(|e| PrepError::file_system("spawn merge tool", &self.merge_tool, e))?;

        let combined = combined_output(&out);
        if !out.status.success() {
            return Err(PrepError::MergeFailed {
                status: out.status.to_string(),
                output: combined,
            });
        }
        // Success requires a non-empty file at the destination, the same
        // rule `lookup` applies; a tool exiting 0 with nothing written is a
        // failure, not a cacheable artifact.
        let merged_len = std::fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
        if merged_len == 0 {
            return Err(PrepError::MergeFailed {
                status: "output file missing or empty".to_string(),
                output: combined,
            });
        }
        Ok(dest)
    }

    /// Cache lookup, falling back to a merge. Returns the artifact path and
    /// whether this call created it.
    pub fn resolve(&self, shards: &ShardSet) -> PrepResult<(PathBuf, bool)> {
        let fingerprint = shards.fingerprint();
        if let Some(path) = self.lookup(&fingerprint) {
            tracing::info!(
                "reusing cached merge: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );
            return Ok((path, false));
        }
        Ok((self.store(&fingerprint, shards)?, true))
    }
}

fn combined_output(out: &std::process::Output) -> String {
    let mut combined = String::from_utf8_lossy(&out.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&out.stderr);
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }
    combined
}

/// Byte sizes of the cache directories, all best-effort.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheInfo {
    pub root: PathBuf,
    pub downloads_bytes: u64,
    pub merged_bytes: u64,
    pub work_bytes: u64,
    pub total_bytes: u64,
}

impl CacheInfo {
    pub fn gather(dirs: &CacheDirs) -> Self {
        let downloads_bytes = dir_size(&dirs.downloads);
        let merged_bytes = dir_size(&dirs.merged);
        let work_bytes = dir_size(&dirs.work);
        Self {
            root: dirs.root.clone(),
            downloads_bytes,
            merged_bytes,
            work_bytes,
            total_bytes: downloads_bytes + merged_bytes + work_bytes,
        }
    }
}

impl std::fmt::Display for CacheInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Cache root: {}", self.root.display())?;
        writeln!(f, "  downloads: {}", format_bytes(self.downloads_bytes))?;
        writeln!(f, "  merged:    {}", format_bytes(self.merged_bytes))?;
        writeln!(f, "  work:      {}", format_bytes(self.work_bytes))?;
        write!(f, "  total:     {}", format_bytes(self.total_bytes))
    }
}

/// Recursive directory size. Swallows per-entry errors: size accounting is
/// informational only.
fn dir_size(dir: &Path) -> u64 {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    let mut total = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            total += dir_size(&path);
        } else if let Ok(meta) = entry.metadata() {
            total += meta.len();
        }
    }
    total
}

pub fn format_bytes(num_bytes: u64) -> String {
    let mut size = num_bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return if unit == "B" {
                format!("{num_bytes} B")
            } else {
                format!("{size:.2} {unit}")
            };
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

/// Which cache directories to clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearTargets {
    pub downloads: bool,
    pub merged: bool,
    pub work: bool,
}

impl ClearTargets {
    pub fn all() -> Self {
        Self {
            downloads: true,
            merged: true,
            work: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.downloads || self.merged || self.work)
    }
}

/// Removes and recreates the selected directories.
pub fn clear(dirs: &CacheDirs, targets: ClearTargets) -> PrepResult<()> {
    let selected = [
        (targets.downloads, &dirs.downloads),
        (targets.merged, &dirs.merged),
        (targets.work, &dirs.work),
    ];
    for (selected, dir) in selected {
        if !selected {
            continue;
        }
        match std::fs::remove_dir_all(dir) {
            Ok(()) => (),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (),
            Err(e) => return Err(PrepError::file_system("clear cache dir", dir, e)),
        }
        std::fs::create_dir_all(dir)
            .map_err(|e| PrepError::file_system("recreate cache dir", dir, e))?;
    }
    Ok(())
}
