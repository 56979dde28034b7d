use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with file and console logging
///
/// Console (stdout) gets INFO and above, the daily rolling file under
/// `./logs` gets DEBUG and above. `RUST_LOG` overrides the console filter.
///
/// The returned WorkerGuard flushes the non-blocking file writer when
/// dropped, so keep it alive for the whole program.
pub fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // social_backend.log.2026-01-01, social_backend.log.2026-01-02, ...
    let file_appender = rolling::daily("./logs", "social_backend.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug,sqlx=info,hyper=info"));

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Tracing initialized (console=INFO+, file=DEBUG+)");

    guard
}
