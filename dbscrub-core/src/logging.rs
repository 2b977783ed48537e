//! Shared logging setup for the dbscrub binary.

use crate::Result;

/// Initializes structured logging.
///
/// INFO is the default level; `--debug` raises it to DEBUG so per-row write
/// diagnostics become visible.
pub fn init_logging(debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| {
            crate::error::ScrubError::configuration(format!("failed to initialize logging: {}", e))
        })?;

    Ok(())
}
