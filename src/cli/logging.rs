//! Logging initialization

use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Filter used when RUST_LOG is unset
pub fn fallback_filter(debug: bool, configured_level: &str) -> &str {
    if debug { "debug" } else { configured_level }
}

/// Initialize logging
///
/// `RUST_LOG` wins over `--debug`, which wins over the configured level.
/// With a log file, output goes there without ANSI codes and with source
/// locations; otherwise it goes to stderr.
pub fn init_logging(debug: bool, log_file: Option<&Path>, configured_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_filter(debug, configured_level)))
        .with_context(|| format!("Invalid log level '{}'", configured_level))?;

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_writer(file)
                .with_env_filter(filter)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .with_target(true)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_overrides_configured_level() {
        assert_eq!(fallback_filter(true, "warn"), "debug");
        assert_eq!(fallback_filter(false, "warn"), "warn");
    }
}
