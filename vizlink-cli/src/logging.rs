//! Log setup.
//!
//! The subscriber is installed before the config file is read, so
//! warnings about the file itself are printed. Once the file is loaded
//! its `logging.level` replaces the startup filter unless `RUST_LOG`
//! is set.

use std::error::Error;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Filter in effect until the config file has been read.
pub const STARTUP_LEVEL: &str = "info";

/// `RUST_LOG` wins over the configured level when it is non-empty.
pub fn directive(env: Option<&str>, configured: &str) -> String {
    match env.map(str::trim) {
        Some(env) if !env.is_empty() => env.to_owned(),
        _ => configured.to_owned(),
    }
}

/// Handle for adjusting the level once configuration is known.
pub struct LogHandle {
    reload: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

/// Install the global subscriber.
pub fn init() -> Result<LogHandle, Box<dyn Error>> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(directive(env.as_deref(), STARTUP_LEVEL))?;
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()?;
    Ok(LogHandle {
        reload: handle,
        from_env: env.is_some_and(|e| !e.trim().is_empty()),
    })
}

impl LogHandle {
    /// Switch to the configured level. No-op when `RUST_LOG` is set.
    pub fn apply_config(&self, level: &str) -> Result<(), Box<dyn Error>> {
        if self.from_env {
            return Ok(());
        }
        self.reload.reload(EnvFilter::try_new(level)?)?;
        Ok(())
    }
}
