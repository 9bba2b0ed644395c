use std::time::Duration;

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};

/// Backoff settings for the reconnect supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Give up after this long without a connection. `None` retries forever.
    #[serde(default)]
    pub max_elapsed_secs: Option<u64>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_elapsed_secs: None,
        }
    }
}

impl ReconnectConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_secs.map(Duration::from_secs)
    }

    /// Fresh backoff schedule starting now.
    pub fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval(),
            initial_interval: self.initial_interval(),
            max_interval: self.max_interval(),
            max_elapsed_time: self.max_elapsed(),
            ..Default::default()
        }
    }
}

fn default_enabled() -> bool {
    true
}
fn default_initial_interval_ms() -> u64 {
    500
}
fn default_max_interval_ms() -> u64 {
    10_000
}
