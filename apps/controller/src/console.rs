//! Line-oriented console front end: command parsing and the LED label.

use client_core::session::ConnectionEvent;
use client_core::state::{ActuatorState, ConnectionState};

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::str::FromStr;

pub const HELP_TEXT: &str = "\
Commands:
  on          turn the LED on
  off         turn the LED off
  toggle      flip the LED
  connect     connect to the peer (and keep reconnecting)
  disconnect  close the connection (and stop reconnecting)
  status      show the LED label
  help        show this text
  quit        disconnect and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    On,
    Off,
    Toggle,
    Connect,
    Disconnect,
    Status,
    Help,
    Quit,
}

/// Input that is not a known command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl Display for UnknownCommand {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "Unknown command: {:?}", self.0)
    }
}

impl FromStr for ConsoleCommand {
    type Err = UnknownCommand;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let command = match input.trim().to_ascii_lowercase().as_str() {
            "on" => ConsoleCommand::On,
            "off" => ConsoleCommand::Off,
            "toggle" => ConsoleCommand::Toggle,
            "connect" => ConsoleCommand::Connect,
            "disconnect" => ConsoleCommand::Disconnect,
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            _ => return Err(UnknownCommand(input.trim().to_string())),
        };
        Ok(command)
    }
}

/// Notification forwarded from the session listeners to the console loop.
#[derive(Debug, Clone)]
pub enum UiEvent {
    Actuator(ActuatorState),
    Connection(ConnectionEvent),
}

/// Label shown for the LED.
pub fn render_label(connection: ConnectionState, actuator: ActuatorState) -> String {
    match connection {
        ConnectionState::Connecting => String::from("Connecting..."),
        ConnectionState::Connected => actuator.to_string(),
        ConnectionState::Disconnected => format!("{actuator} (disconnected)"),
    }
}

/// What the console currently displays, fed only by listener events.
///
/// Listeners run before the session publishes its snapshots, so the view
/// keeps its own copy instead of reading the handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleView {
    pub connection: ConnectionState,
    pub actuator: ActuatorState,
}

impl ConsoleView {
    pub fn label(&self) -> String {
        render_label(self.connection, self.actuator)
    }

    /// Apply `event` and return the line to print, if any.
    pub fn apply(&mut self, event: UiEvent) -> Option<String> {
        match event {
            UiEvent::Actuator(state) => {
                self.actuator = state;
                Some(self.label())
            }
            UiEvent::Connection(ConnectionEvent::StateChanged(state)) => {
                if self.connection == state {
                    return None;
                }
                self.connection = state;
                Some(self.label())
            }
            UiEvent::Connection(ConnectionEvent::Error(error)) => {
                Some(format!("Connection error: {error}"))
            }
        }
    }
}
