use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Initialize stderr logging with an env-filter (`RUST_LOG`), defaulting
/// to `info`.
pub fn init() -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .map_err(|err| err.to_string())
}
