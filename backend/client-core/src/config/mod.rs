pub mod paths;
pub mod reconnect;

pub use reconnect::ReconnectConfig;

use crate::DEFAULT_PEER_URL;
use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;
const PEER_URL_SCHEME: &str = "ws";

/// Environment variable that replaces `peer.url`.
pub const PEER_URL_ENV: &str = "LED_CONTROLLER_URL";

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    #[serde(default = "default_peer_url")]
    pub url: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            url: default_peer_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub peer: PeerConfig,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            peer: PeerConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_peer_url() -> String {
    DEFAULT_PEER_URL.to_string()
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ControllerConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(ControllerConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: ControllerConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json using atomic write.
    ///
    /// Uses temp file + rename so a crash never leaves a half-written file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, serialization, the write or the
    /// rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Replace `peer.url` with `LED_CONTROLLER_URL` when set.
    ///
    /// A `.env` file in the working directory is loaded first, without
    /// overriding variables that are already set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the override is not a
    /// usable peer URL.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded .env from: {}", path.display());
        }

        match env::var(PEER_URL_ENV) {
            Ok(url) => {
                info!("Using {PEER_URL_ENV} override: {url}");
                self.peer.url = url;
                self.validate()
            }
            Err(env::VarError::NotUnicode(_)) => {
                warn!("{PEER_URL_ENV} contains invalid unicode, ignoring it");
                Ok(())
            }
            Err(env::VarError::NotPresent) => Ok(()),
        }
    }

    /// Parsed peer address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if `peer.url` is not a `ws://`
    /// URL with a host.
    pub fn peer_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.peer.url).map_err(|e| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("Invalid peer URL {:?}: {e}", self.peer.url),
        })?;

        if url.scheme() != PEER_URL_SCHEME {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Unsupported peer URL scheme {:?} (expected {PEER_URL_SCHEME})",
                    url.scheme()
                ),
            });
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Peer URL {:?} has no host", self.peer.url),
            });
        }

        Ok(url)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        self.peer_url()?;

        let reconnect = &self.reconnect;
        if reconnect.initial_interval_ms == 0 || reconnect.max_interval_ms == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "Reconnect intervals must be greater than zero".to_string(),
            });
        }

        if reconnect.initial_interval_ms > reconnect.max_interval_ms {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Reconnect initial interval {}ms exceeds max interval {}ms",
                    reconnect.initial_interval_ms, reconnect.max_interval_ms
                ),
            });
        }

        Ok(())
    }
}
