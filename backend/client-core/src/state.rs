//! Observable values owned by the session.

use std::fmt::{Display, Formatter, Result as FormatResult};

/// State of the single remote actuator (the LED).
///
/// Defaults to off until the peer or a local command says otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ActuatorState {
    pub on: bool,
}

impl ActuatorState {
    pub const ON: ActuatorState = ActuatorState { on: true };
    pub const OFF: ActuatorState = ActuatorState { on: false };
}

impl From<bool> for ActuatorState {
    fn from(on: bool) -> Self {
        Self { on }
    }
}

impl Display for ActuatorState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(if self.on { "ON" } else { "OFF" })
    }
}

/// Lifecycle of the transport connection as seen by the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl Display for ConnectionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        formatter.write_str(label)
    }
}
