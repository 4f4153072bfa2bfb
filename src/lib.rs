//! ollama-prep — download, merge, and register GGUF models with Ollama
//! ====================================================================
//!
//! Takes a model source (a local GGUF file or a Hugging Face repo
//! reference), resolves it to one consolidated GGUF, and registers it with
//! a local Ollama runtime under an architecture-appropriate chat template.
//!
//! The interesting part is the resolution pipeline:
//!
//! * **Shard detection** — multi-part GGUFs are recognized by filename
//!   convention and by sibling scanning ([`shard`]).
//! * **Merge cache** — a shard set is identified by a cheap metadata
//!   fingerprint, and the expensive `llama-gguf-split --merge` runs at most
//!   once per distinct set ([`cache`]).
//! * **Architecture classification** — the model family is inferred from a
//!   bounded content prefix, falling back to the filename, falling back to
//!   a default ([`arch`]); the family selects the chat template, stop
//!   tokens, and renderer/parser directives ([`template`]).
//!
//! Downloads (`hf`), merging (`llama-gguf-split`), and registration
//! (`ollama`) are external executables invoked with captured output.
//!
//! ```rust,no_run
//! use ollama_prep::*;
//!
//! fn main() -> PrepResult<()> {
//!     let config = AppConfig::load(None)?;
//!     let dirs = CacheDirs::resolve(config.cache_root())?;
//!     let outcome = PrepJob::builder()
//!         .model_source("unsloth/Llama-3.2-3B-Instruct-GGUF:Q4_K_M")
//!         .build()
//!         .run(&dirs)?;
//!     println!("{outcome}");
//!     Ok(())
//! }
//! ```

pub mod arch;
pub mod cache;
pub mod config;
pub mod error;
pub mod hf;
pub mod logging;
pub mod ollama;
pub mod pipeline;
pub mod shard;
pub mod source;
pub mod template;
pub mod tools;

pub use arch::ArchKind;
pub use cache::{CacheDirs, CacheInfo, ClearTargets, MergeCache};
pub use config::AppConfig;
pub use error::{PrepError, PrepResult};
pub use pipeline::{PrepJob, PrepOutcome};
pub use shard::{is_split, ShardSet};
pub use source::ModelSource;
pub use template::{render_modelfile, ModelfileOptions, TemplateDescriptor};
