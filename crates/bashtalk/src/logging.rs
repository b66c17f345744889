//! Logging initialization.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::BashTalkError;

/// Installs a console `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. `"info"` or
/// `"bashtalk=debug"`) is used. Fails if a global subscriber already
/// exists.
pub fn init(default_level: &str) -> Result<(), BashTalkError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true),
        )
        .with(filter)
        .try_init()?;

    Ok(())
}
