//! ollama-prep CLI — set up GGUF models in Ollama
//! ==============================================
//!
//! ```bash
//! # Download, merge if sharded, and register with a tool-capable template:
//! ollama-prep-cli setup --model-source unsloth/Llama-3.2-3B-Instruct-GGUF:Q4_K_M
//!
//! # Local file, forced architecture, fixed context window:
//! ollama-prep-cli setup --model-source ./model.gguf --architecture qwen --context-length 8192
//!
//! # Cache maintenance:
//! ollama-prep-cli cache info
//! ollama-prep-cli cache clear --merged
//! ```
//!
//! Exit codes: `0` success, `1` any pipeline failure, `2` argument errors
//! (from clap), `130` user cancellation.

use std::path::PathBuf;

use ollama_prep::*;

#[derive(Debug, clap::Parser)]
#[command(name = "ollama-prep-cli", version)]
struct Cli {
    /// Override the cache root (downloads/merged/work live here).
    #[arg(long, value_name = "PATH", global = true)]
    cache_root: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, clap::Subcommand)]
enum Cmd {
    /// Download/merge a GGUF and create an Ollama model with a
    /// tool-capable chat template.
    Setup(SetupArgs),

    /// Inspect or clear the cache directories.
    Cache {
        #[command(subcommand)]
        cmd: CacheCmd,
    },
}

#[derive(Debug, clap::Args)]
struct SetupArgs {
    /// Local GGUF path OR Hugging Face repo id/URL. Examples:
    /// `unsloth/Llama-3.2-3B-Instruct-GGUF`, `hf.co/owner/repo:Q4_0`,
    /// or a pasted `ollama run hf.co/owner/repo:Q4_0`.
    #[arg(long)]
    model_source: String,

    /// Name to register in Ollama (default: derived from the GGUF
    /// filename).
    #[arg(long)]
    model_name: Option<String>,

    /// Force an architecture instead of auto-detecting.
    #[arg(long)]
    architecture: Option<String>,

    /// Context window (num_ctx). When omitted, no num_ctx directive is
    /// emitted and Ollama/model defaults apply.
    #[arg(long)]
    context_length: Option<i64>,

    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Quantization filter for Hugging Face downloads, e.g. Q4_0, Q4_K_M.
    #[arg(long)]
    quantization_type: Option<String>,

    /// Path to a llama.cpp folder or the llama-gguf-split binary
    /// (required to merge sharded GGUFs).
    #[arg(long)]
    llama_cpp_path: Option<PathBuf>,

    /// Keep the per-invocation working directory.
    #[arg(long)]
    keep_downloads: bool,

    /// Skip the quick `ollama run` smoke test.
    #[arg(long)]
    skip_test: bool,
}

#[derive(Debug, clap::Subcommand)]
enum CacheCmd {
    /// Show cache locations and sizes.
    Info {
        /// Emit machine-readable JSON instead of the table.
        #[arg(long)]
        json: bool,
    },
    /// Clear cache directories (everything unless a subset is selected).
    Clear {
        #[arg(long)]
        all: bool,
        #[arg(long)]
        downloads: bool,
        #[arg(long)]
        merged: bool,
        #[arg(long)]
        work: bool,
    },
}

fn main() {
    let cli = <Cli as clap::Parser>::parse();
    logging::init(cli.verbose);

    // Interrupt: abort the current external call, clean the scratch
    // directory, and exit with a code distinct from ordinary failures.
    let _ = ctrlc::set_handler(|| {
        pipeline::cleanup_scratch();
        eprintln!("Cancelled.");
        std::process::exit(130);
    });

    match run(cli) {
        Ok(()) => (),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> PrepResult<()> {
    let config = AppConfig::load(cli.cache_root)?;
    let dirs = CacheDirs::resolve(config.cache_root())?;

    match cli.cmd {
        Cmd::Setup(args) => {
            let architecture = args
                .architecture
                .as_deref()
                .map(ArchKind::from_name)
                .transpose()?;

            let outcome = PrepJob::builder()
                .model_source(args.model_source)
                .maybe_model_name(args.model_name)
                .maybe_architecture(architecture)
                .maybe_context_length(args.context_length)
                .temperature(args.temperature)
                .maybe_quantization(args.quantization_type)
                .maybe_gguf_split_path(args.llama_cpp_path)
                .keep_downloads(args.keep_downloads || config.keep_downloads)
                .skip_test(args.skip_test)
                .build()
                .run(&dirs)?;

            println!("{outcome}");
        }

        Cmd::Cache { cmd } => match cmd {
            CacheCmd::Info { json } => {
                let info = CacheInfo::gather(&dirs);
                if json {
                    let rendered = serde_json::to_string_pretty(&info).map_err(|e| {
                        PrepError::InvalidConfiguration {
                            field: "cache info",
                            reason: e.to_string(),
                        }
                    })?;
                    println!("{rendered}");
                } else {
                    println!("{info}");
                }
            }
            CacheCmd::Clear {
                all,
                downloads,
                merged,
                work,
            } => {
                let mut targets = ClearTargets {
                    downloads,
                    merged,
                    work,
                };
                if all || targets.is_empty() {
                    targets = ClearTargets::all();
                }
                cache::clear(&dirs, targets)?;
                println!("Cache cleared.");
            }
        },
    }
    Ok(())
}
