use tracing_subscriber::{EnvFilter, fmt};

const FALLBACK_FILTER: &str = "info";

/// Installs the global stderr subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(filter: &str) {
    let filter = EnvFilter::try_new(filter_spec(filter))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER));
    let installed = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

fn filter_spec(raw: &str) -> &str {
    let raw = raw.trim();
    if raw.is_empty() { FALLBACK_FILTER } else { raw }
}
