//! Tracing setup for test binaries that want to see harness logs.
//!
//! Harness logs go through the test writer, straight to the real process
//! output, so they never end up in a capture transcript.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mockconf::{LoggingConfig, MockConfig};

/// Install a global fmt subscriber filtered by `config.log_level`.
///
/// Fails if a global subscriber is already installed, which is normal when
/// several tests in one binary call it; callers usually ignore the error.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log filter {:?}", config.log_level))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .context("tracing subscriber already installed")?;

    tracing::debug!(filter = %config.log_level, "mockcli tracing initialized");
    Ok(())
}

/// [`init`] with the logging section of the loaded configuration, falling
/// back to defaults when it cannot be loaded.
pub fn init_from_env() -> Result<()> {
    let config = MockConfig::load().unwrap_or_default();
    init(&config.logging)
}
