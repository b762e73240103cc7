//! Subscriber setup for binaries and tests embedding the compiler.

use tracing_subscriber::{fmt, EnvFilter};

use crate::types::{Error, Result};

/// Installs a global fmt subscriber filtered by `level` (any `EnvFilter` directive).
///
/// Fails instead of panicking when the directive is malformed or a subscriber
/// is already installed.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| Error::Logging(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| Error::Logging("logging already initialized".into()))
}
