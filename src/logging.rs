use tracing_subscriber::{fmt, EnvFilter};

/// Install the JSON stderr subscriber used by the app and its binaries.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place. `log` records (sqlx) are bridged into tracing.
pub fn init_logging(filter: &str) {
    let _ = tracing_log::LogTracer::init();
    let env_filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER));
    let _ = fmt()
        .with_env_filter(env_filter)
        .json()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .try_init();
}
