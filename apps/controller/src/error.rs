use client_core::error::CoreError;
use client_core::error::config::ConfigError;
use client_core::error::session::SessionError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the controller app.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Error from this App
    #[error("Controller Error: {message} {location}")]
    Controller {
        message: String,
        location: ErrorLocation,
    },

    /// Error from client-core operations (config, session)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// Reading the console failed
    #[error("Console Error: {message} {location}")]
    Console {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for ControllerError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        ControllerError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for ControllerError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        ControllerError::from(CoreError::from(error))
    }
}

impl From<SessionError> for ControllerError {
    #[track_caller]
    fn from(error: SessionError) -> Self {
        ControllerError::from(CoreError::from(error))
    }
}
