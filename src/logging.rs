use tracing_subscriber::EnvFilter;

/// Where log lines go. `serve` answers on one standard stream, so logs
/// must use the other.
#[derive(Debug, Clone, Copy)]
pub enum LogTarget {
    Stdout,
    Stderr,
}

/// Initialize structured logging with tracing-subscriber.
///
/// Uses the `FERRY_LOG` env var if set, otherwise falls back to the provided level.
pub fn init(log_level: &str, target: LogTarget) {
    let env_filter =
        EnvFilter::try_from_env("FERRY_LOG").unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    match target {
        LogTarget::Stdout => builder.with_writer(std::io::stdout).init(),
        LogTarget::Stderr => builder.with_writer(std::io::stderr).init(),
    }
}
