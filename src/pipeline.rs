//! End-to-end preparation pipeline.
//!
//! One invocation runs a strict sequence: parse the source, resolve a local
//! GGUF (downloading if remote), detect sharding, fingerprint and consult
//! the merge cache, classify the architecture, render the Modelfile, and
//! register the model with Ollama. Every long step is a synchronous
//! blocking call; there is no internal parallelism, and ordering is
//! enforced purely by composition.

use std::{
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
    time::{SystemTime, UNIX_EPOCH},
};

use bon::Builder;

use crate::{
    arch::ArchKind,
    cache::{CacheDirs, MergeCache},
    error::{PrepError, PrepResult},
    hf::HfFetcher,
    shard::{is_split, ShardSet},
    source::ModelSource,
    template::{render_modelfile, ModelfileOptions},
};

/// Extra stop tokens applied when a Nemotron-sourced GGUF is served through
/// a generic template: these models leak turn markers as plain text.
const NEMOTRON_EXTRA_STOP: [&str; 2] = ["<|start_of_turn|>", "<|end_of_turn|>"];

const NEMOTRON_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant with tool calling \
     capabilities. Use tools when needed. Do not emit tool-call markup as plain text. When \
     calling a tool, use the tool calling mechanism only.";

/// All inputs for one preparation run.
#[derive(Debug, Clone, Builder)]
pub struct PrepJob {
    /// Local GGUF path or Hugging Face repo reference, in any of the forms
    /// [`ModelSource::parse`] accepts.
    #[builder(into)]
    pub model_source: String,

    /// Name to register in Ollama; derived from the GGUF filename when
    /// omitted.
    #[builder(into)]
    pub model_name: Option<String>,

    /// Force a family instead of auto-detecting.
    pub architecture: Option<ArchKind>,

    /// `num_ctx`; leave unset to inherit Ollama/model defaults.
    pub context_length: Option<i64>,

    #[builder(default = 0.7)]
    pub temperature: f32,

    /// Quantization filter for downloads, e.g. `Q4_K_M`. Falls back to the
    /// source string's `:suffix` when present.
    #[builder(into)]
    pub quantization: Option<String>,

    /// llama.cpp checkout/install or the `llama-gguf-split` binary itself.
    #[builder(into)]
    pub gguf_split_path: Option<PathBuf>,

    #[builder(default = false)]
    pub keep_downloads: bool,

    /// Skip the post-registration `ollama run` smoke test.
    #[builder(default = false)]
    pub skip_test: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PrepOutcome {
    pub model_name: String,
    pub artifact_path: PathBuf,
    pub architecture: ArchKind,
    /// `Some(false)` when a cached merge was reused, `Some(true)` when this
    /// run performed the merge, `None` for single-file models.
    pub merged: Option<bool>,
}

impl std::fmt::Display for PrepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "model:        {}", self.model_name)?;
        writeln!(f, "artifact:     {}", self.artifact_path.display())?;
        write!(f, "architecture: {}", self.architecture)?;
        if let Some(created) = self.merged {
            write!(
                f,
                "\nmerge:        {}",
                if created { "performed" } else { "cache hit" }
            )?;
        }
        Ok(())
    }
}

/// The scratch directory of the in-flight invocation, if any. Interrupt
/// handlers use this for best-effort cleanup before exiting.
static CURRENT_SCRATCH: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();

fn current_scratch() -> &'static Mutex<Option<PathBuf>> {
    CURRENT_SCRATCH.get_or_init(|| Mutex::new(None))
}

/// Best-effort removal of the in-flight scratch directory. Safe to call
/// from a signal handler thread.
pub fn cleanup_scratch() {
    if let Ok(mut guard) = current_scratch().lock() {
        if let Some(dir) = guard.take() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

/// Unregisters the in-flight scratch directory without deleting it, so an
/// interrupt arriving after a kept run cannot remove what the user asked to
/// keep.
fn release_scratch() {
    if let Ok(mut guard) = current_scratch().lock() {
        guard.take();
    }
}

impl PrepJob {
    /// Runs the full pipeline. The scratch directory is removed on every
    /// exit path unless `keep_downloads` is set.
    pub fn run(&self, dirs: &CacheDirs) -> PrepResult<PrepOutcome> {
        crate::ollama::ensure_available()?;

        let scratch = self.create_scratch(dirs)?;
        if let Ok(mut guard) = current_scratch().lock() {
            *guard = Some(scratch.clone());
        }

        let result = self.run_inner(dirs, &scratch);

        if self.keep_downloads {
            release_scratch();
            tracing::info!("kept working directory: {}", scratch.display());
        } else {
            cleanup_scratch();
        }
        result
    }

    fn run_inner(&self, dirs: &CacheDirs, scratch: &Path) -> PrepResult<PrepOutcome> {
        let source = ModelSource::parse(&self.model_source);
        let quant = self
            .quantization
            .as_deref()
            .or_else(|| source.quant_hint())
            .map(str::to_string);

        // 1. Resolve a local working GGUF.
        let working_gguf = match &source {
            ModelSource::Remote { repo_id, .. } => {
                tracing::info!("Hugging Face repo detected: {repo_id}");
                HfFetcher::new(&dirs.downloads).fetch(repo_id, quant.as_deref())?
            }
            ModelSource::Local { path } => {
                if path.as_os_str().is_empty() || !path.exists() {
                    return Err(PrepError::InputNotRecognized {
                        input: self.model_source.clone(),
                    });
                }
                path.canonicalize()
                    .map_err(|e| PrepError::file_system("canonicalize model path", path, e))?
            }
        };
        tracing::info!("working with: {}", working_gguf.display());

        // 2. Shard detection, then fingerprint + cache, then merge.
        let (final_gguf, merged) = if is_split(&working_gguf) {
            tracing::info!("sharded model detected; merge required");
            let merge_tool = crate::tools::find_gguf_split(self.gguf_split_path.as_deref())
                .ok_or(PrepError::ToolNotFound {
                    tool: crate::tools::GGUF_SPLIT_EXECUTABLE,
                    remediation: "Install llama.cpp and add llama-gguf-split to PATH, or pass \
                                  --llama-cpp-path",
                })?;

            let shards = ShardSet::discover(&working_gguf);
            let cache = MergeCache::new(&dirs.merged, merge_tool);
            let (path, created) = cache.resolve(&shards)?;
            (path, Some(created))
        } else {
            tracing::info!("single-file model (no merge needed)");
            (working_gguf.clone(), None)
        };
        // Merged and downloaded artifacts inherit the cache root, which may
        // be relative; the Modelfile's FROM must be absolute.
        let final_gguf = absolute_artifact(&final_gguf)?;

        // 3. Classify and resolve the template.
        let architecture = match self.architecture {
            Some(kind) => kind,
            None => ArchKind::detect(&final_gguf),
        };
        tracing::info!("architecture: {architecture}");

        // 4. Render the Modelfile.
        let source_hint = format!(
            "{} {}",
            source.repo_id().unwrap_or_default(),
            final_gguf.file_name().unwrap_or_default().to_string_lossy()
        );
        let mut options = ModelfileOptions {
            context_length: self.context_length,
            temperature: self.temperature,
            ..Default::default()
        };
        // Nemotron GGUFs leak turn markers through generic templates; when
        // one is served that way, pin extra stops and stronger guidance.
        if source_hint.to_ascii_lowercase().contains("nemotron")
            && architecture != ArchKind::Nemotron
        {
            tracing::info!("nemotron source detected; applying compatibility tweaks");
            options.extra_stop = NEMOTRON_EXTRA_STOP.iter().map(|s| s.to_string()).collect();
            options.system_message = Some(NEMOTRON_SYSTEM_MESSAGE.to_string());
        }

        let modelfile_text = render_modelfile(&final_gguf, architecture, &options)?;
        let modelfile_path = scratch.join("Modelfile");
        std::fs::write(&modelfile_path, &modelfile_text)
            .map_err(|e| PrepError::file_system("write Modelfile", &modelfile_path, e))?;
        tracing::info!("wrote Modelfile: {}", modelfile_path.display());

        // 5. Register and verify.
        let model_name = sanitize_model_name(
            &self
                .model_name
                .clone()
                .unwrap_or_else(|| auto_model_name(&final_gguf)),
        );
        let create_out = crate::ollama::create_model(&model_name, &modelfile_path)?;
        if !create_out.trim().is_empty() {
            tracing::debug!("ollama create: {}", create_out.trim());
        }
        tracing::info!("created model: {model_name}");

        match crate::ollama::list_models() {
            Ok(listing) if listing.contains(&model_name) => {
                tracing::info!("model is registered in Ollama");
            }
            Ok(_) => {
                tracing::warn!("model not visible in 'ollama list' yet (can be transient)");
            }
            Err(e) => tracing::warn!("could not verify registration: {e}"),
        }

        if !self.skip_test {
            match crate::ollama::run_model(&model_name, "Hello, can you help me with code?") {
                Ok(out) if !out.trim().is_empty() => {
                    tracing::info!("smoke test: model responded");
                }
                Ok(_) => tracing::warn!("smoke test: empty response"),
                Err(e) => tracing::warn!("smoke test failed: {e}"),
            }
        }

        Ok(PrepOutcome {
            model_name,
            artifact_path: final_gguf,
            architecture,
            merged,
        })
    }

    fn create_scratch(&self, dirs: &CacheDirs) -> PrepResult<PathBuf> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let dir = dirs
            .work
            .join(format!("prep_{}_{nanos:08x}", std::process::id()));
        std::fs::create_dir_all(&dir)
            .map_err(|e| PrepError::file_system("create scratch dir", &dir, e))?;
        Ok(dir)
    }
}

/// Canonical absolute form of the artifact path, as emitted in `FROM`.
fn absolute_artifact(path: &Path) -> PrepResult<PathBuf> {
    path.canonicalize()
        .map_err(|e| PrepError::file_system("canonicalize artifact path", path, e))
}

/// Lowercases and collapses anything outside `[a-z0-9-_]`.
pub fn sanitize_model_name(name: &str) -> String {
    let cleaned = sanitize_filename::sanitize(name.trim().to_ascii_lowercase());
    let mut out = String::with_capacity(cleaned.len());
    let mut last_dash = false;
    for c in cleaned.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '-'
        };
        if mapped == '-' {
            if !last_dash {
                out.push('-');
            }
            last_dash = true;
        } else {
            out.push(mapped);
            last_dash = false;
        }
    }
    out.trim_matches('-').to_string()
}

/// Derives a registration name from the artifact filename: shard tags
/// stripped, sanitized, with a fixed fallback.
pub fn auto_model_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let base = shard_tag_re().replace(&stem, "").into_owned();
    let name = sanitize_model_name(&base);
    if name.is_empty() {
        "ollama-model".to_string()
    } else {
        name
    }
}

fn shard_tag_re() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"-\d{5}-of-\d{5}$|-\d{4}-of-\d{4}$").expect("static regex")
    })
}
