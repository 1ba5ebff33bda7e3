//! Engine configuration.

use log::warn;
use std::env;
use std::time::Duration;

/// Environment variable holding the lock acquisition timeout in milliseconds.
pub const LOCK_TIMEOUT_ENV: &str = "POINT_LOCK_TIMEOUT_MS";

/// Tunables for [`PointEngine`](crate::PointEngine).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum time to wait for a user's lock. `None` waits without bound.
    pub lock_timeout: Option<Duration>,
}

impl EngineConfig {
    /// Reads configuration from the environment.
    ///
    /// An unset or empty `POINT_LOCK_TIMEOUT_MS` means no timeout. A value that
    /// does not parse is logged and ignored.
    pub fn from_env() -> Self {
        EngineConfig {
            lock_timeout: parse_timeout(env::var(LOCK_TIMEOUT_ENV).ok().as_deref()),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}

fn parse_timeout(raw: Option<&str>) -> Option<Duration> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    match raw.parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", LOCK_TIMEOUT_ENV, raw, e);
            None
        }
    }
}
