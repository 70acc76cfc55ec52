use chrono::Duration;

/// Initialize logging.
///
/// `RUST_LOG` wins, then `--verbose`, then the configured level.
pub fn init_logging(verbose: bool, configured: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { configured.unwrap_or("info") };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Format a watch duration as `1h 05m`, `12m 30s` or `45s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds();
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.abs();

    if secs >= 3600 {
        format!("{}{}h {:02}m", sign, secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}{}m {:02}s", sign, secs / 60, secs % 60)
    } else {
        format!("{}{}s", sign, secs)
    }
}
