use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Installs the process-wide subscriber. Call once, before anything logs.
///
/// With `json` set, log lines are emitted as JSON objects for the platform's
/// log pipeline; otherwise a human-readable format is used, with ANSI colors
/// when stderr is a terminal.
pub fn register_logger(json: bool) {
    let log_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt().with_env_filter(log_filter);
    if json {
        builder.json().init();
    } else {
        builder.with_ansi(atty::is(atty::Stream::Stderr)).init();
    }
}
