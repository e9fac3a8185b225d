use anyhow::{Error, Result};
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Initializes the process-wide tracing subscriber exactly once: an
/// `EnvFilter` (defaulting to `info`) feeding a JSON `fmt` layer.
///
/// # Errors
/// Returns an error if the subscriber has already been installed, or if
/// registry construction otherwise fails.
pub fn init() -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).json();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|error| Error::msg(error.to_string()))?;

        info!("tracing initialized");

        Ok::<(), Error>(())
    })?;
    Ok(())
}
