//! Tracing subscriber wiring for the CLI.

use tracing_subscriber::layer::SubscriberExt;

/// Installs a process-global subscriber: compact terminal output, default
/// level INFO (DEBUG with `verbose`), overridable via `RUST_LOG`.
pub fn init(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let terminal_layer = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(terminal_layer);

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
