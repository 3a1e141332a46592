//! Logging setup
//!
//! Everything goes to stderr; stdout is left to the caller.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: overrides the level filter entirely
/// - `PREDWRAP_LOG_FORMAT`: `json` for structured output, anything else for compact text
pub fn init_logging(debug: bool) -> Result<()> {
    let log_format =
        std::env::var("PREDWRAP_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let default_directive = if debug {
        "predwrap=debug,predwrap_core=debug,predwrap_infra_system=debug,predwrap_infra_fs=debug"
    } else {
        "predwrap=warn,predwrap_core=warn,predwrap_infra_system=warn,predwrap_infra_fs=warn"
    };
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}
