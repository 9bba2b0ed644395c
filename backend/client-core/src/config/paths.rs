//! Where the controller keeps its config file and logs.
//!
//! # Platform Behavior
//! - **Linux**: `$XDG_CONFIG_HOME/led-controller`, logs under `$XDG_DATA_HOME/led-controller/logs`
//! - **macOS**: `~/Library/Application Support/led-controller`
//! - **Windows**: `%APPDATA%/led-controller`

use std::env;
use std::path::PathBuf;

use log::{debug, info};

pub const APP_DIR_NAME: &str = "led-controller";
pub const CONFIG_DIR_ENV: &str = "LED_CONTROLLER_CONFIG_DIR";
pub const LOG_DIR_ENV: &str = "LED_CONTROLLER_LOG_DIR";

const LOG_SUBDIR: &str = "logs";

/// Resolve the config directory.
///
/// Order: `LED_CONTROLLER_CONFIG_DIR`, the platform config dir, then the
/// system temp dir.
pub fn resolve_config_dir() -> PathBuf {
    if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
        info!("Using {CONFIG_DIR_ENV} override: {custom_dir}");
        return PathBuf::from(custom_dir);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let dir = config_dir.join(APP_DIR_NAME);
        debug!("Platform config dir: {}", dir.display());
        return dir;
    }

    env::temp_dir().join(APP_DIR_NAME)
}

/// Resolve the log directory.
///
/// Order: `LED_CONTROLLER_LOG_DIR`, the platform local data dir, then the
/// system temp dir. Called before logging is up, so it does not log.
pub fn resolve_log_dir() -> PathBuf {
    if let Ok(custom_dir) = env::var(LOG_DIR_ENV) {
        return PathBuf::from(custom_dir);
    }

    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join(APP_DIR_NAME)
        .join(LOG_SUBDIR)
}
