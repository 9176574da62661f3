//! Logging setup for sweepx
//!
//! Verbosity is decided once at process start from --verbose and threaded
//! through the tracing subscriber; nothing mutates it afterwards. Progress
//! lines go to stdout, diagnostics to stderr.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `--verbose` raises the default filter to debug; RUST_LOG overrides
/// either way.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose { "sweepx=debug" } else { "sweepx=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(filter),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_sets_global_once() {
        // First call wins; a second call reports an error instead of panicking
        assert!(init_logging(false).is_ok());
        assert!(init_logging(true).is_err());
    }
}
