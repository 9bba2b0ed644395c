//! Controller wiring: config, session, listeners, reconnect supervisor and
//! the console loop.

use crate::console::{ConsoleCommand, ConsoleView, HELP_TEXT, UiEvent};
use crate::error::ControllerError;
use crate::logger::initialize as LoggerInitialize;

use client_core::config::{ControllerConfig, ReconnectConfig};
use client_core::config::paths::{resolve_config_dir, resolve_log_dir};
use client_core::reconnect::spawn_reconnect_supervisor;
use client_core::session::SessionHandle;
use client_core::state::ConnectionState;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::io::{Write, stdout};
use std::panic::Location;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, stdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How long `quit` waits for the close handshake before exiting anyway.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Whether the console loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run the controller until `quit` or end of input.
pub async fn run() -> Result<(), ControllerError> {
    let log_dir = resolve_log_dir();
    create_dir_all(&log_dir).map_err(|e| ControllerError::Controller {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("LED controller starting");
    info!("Log directory: {}", log_dir.display());

    let config_dir = resolve_config_dir();
    let mut config = ControllerConfig::load(&config_dir)?;
    config.apply_env_overrides()?;
    let address = config.peer_url()?;

    let handle = SessionHandle::start(address);
    let events = forward_session_events(&handle).await?;

    let mut controller = Controller::new(handle, config.reconnect, stdout());
    controller.write_line(HELP_TEXT)?;
    controller.connect().await?;
    controller
        .run_console(BufReader::new(stdin()), events)
        .await?;

    info!("LED controller stopped");
    Ok(())
}

/// Register both session listeners, forwarding what they see to one channel.
pub async fn forward_session_events(
    handle: &SessionHandle,
) -> Result<mpsc::UnboundedReceiver<UiEvent>, ControllerError> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let state_tx = event_tx.clone();
    handle
        .set_state_listener(move |state| {
            info!("LED is now {state}");
            state_tx.send(UiEvent::Actuator(state)).ok();
        })
        .await?;

    handle
        .set_connection_listener(move |event| {
            event_tx.send(UiEvent::Connection(event.clone())).ok();
        })
        .await?;

    Ok(event_rx)
}

/// Console front end over one [`SessionHandle`].
///
/// Owns the reconnect supervisor: `connect` starts it, `disconnect` and
/// `quit` stop it.
pub struct Controller<W: Write> {
    handle: SessionHandle,
    reconnect: ReconnectConfig,
    supervisor: Option<JoinHandle<()>>,
    view: ConsoleView,
    out: W,
}

impl<W: Write> Controller<W> {
    pub fn new(handle: SessionHandle, reconnect: ReconnectConfig, out: W) -> Self {
        Self {
            handle,
            reconnect,
            supervisor: None,
            view: ConsoleView::default(),
            out,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn view(&self) -> ConsoleView {
        self.view
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn is_supervised(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_some_and(|supervisor| !supervisor.is_finished())
    }

    /// Read commands from `input` and render `events` until `quit` or EOF.
    pub async fn run_console<R>(
        &mut self,
        input: R,
        mut events: mpsc::UnboundedReceiver<UiEvent>,
    ) -> Result<(), ControllerError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = line.map_err(|e| ControllerError::Console {
                        message: format!("Failed to read console input: {e}"),
                        location: ErrorLocation::from(Location::caller()),
                    })?;

                    let Some(line) = line else {
                        info!("Console input closed");
                        self.shutdown().await?;
                        break;
                    };

                    if line.trim().is_empty() {
                        continue;
                    }

                    match line.parse::<ConsoleCommand>() {
                        Ok(command) => {
                            if self.execute(command).await? == Flow::Quit {
                                break;
                            }
                        }
                        Err(unknown) => {
                            self.write_line(&unknown.to_string())?;
                            self.write_line(HELP_TEXT)?;
                        }
                    }
                }
                Some(event) = events.recv() => self.handle_event(event)?,
            }
        }

        Ok(())
    }

    pub async fn execute(&mut self, command: ConsoleCommand) -> Result<Flow, ControllerError> {
        debug!("Console command: {command:?}");

        match command {
            ConsoleCommand::On => self.set_state(true).await?,
            ConsoleCommand::Off => self.set_state(false).await?,
            ConsoleCommand::Toggle => {
                if self.handle.is_connected() {
                    self.handle.request_toggle().await?;
                } else {
                    self.write_line("Not connected, toggle ignored")?;
                }
            }
            ConsoleCommand::Connect => self.connect().await?,
            ConsoleCommand::Disconnect => self.disconnect().await?,
            ConsoleCommand::Status => {
                let label = self.view.label();
                self.write_line(&label)?;
            }
            ConsoleCommand::Help => self.write_line(HELP_TEXT)?,
            ConsoleCommand::Quit => {
                self.shutdown().await?;
                return Ok(Flow::Quit);
            }
        }

        Ok(Flow::Continue)
    }

    /// Print whatever `event` changes on screen.
    pub fn handle_event(&mut self, event: UiEvent) -> Result<(), ControllerError> {
        match self.view.apply(event) {
            Some(line) => self.write_line(&line),
            None => Ok(()),
        }
    }

    /// Connect and make sure the reconnect supervisor is running.
    pub async fn connect(&mut self) -> Result<(), ControllerError> {
        self.handle.connect().await?;

        if !self.is_supervised() {
            self.supervisor = spawn_reconnect_supervisor(&self.handle, &self.reconnect);
        }

        Ok(())
    }

    /// Stop reconnecting, then close the connection.
    pub async fn disconnect(&mut self) -> Result<(), ControllerError> {
        self.stop_supervisor();
        self.handle.disconnect().await?;
        Ok(())
    }

    /// Disconnect and wait briefly for the close to go through.
    pub async fn shutdown(&mut self) -> Result<(), ControllerError> {
        info!("Shutting down controller");
        self.disconnect().await?;

        let mut connection = self.handle.watch_connection();
        let closed = timeout(
            SHUTDOWN_TIMEOUT,
            connection.wait_for(|state| *state == ConnectionState::Disconnected),
        )
        .await
        .is_ok_and(|result| result.is_ok());

        if !closed {
            warn!("Connection still open after {SHUTDOWN_TIMEOUT:?}, exiting anyway");
        }

        Ok(())
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), ControllerError> {
        writeln!(self.out, "{line}")
            .and_then(|()| self.out.flush())
            .map_err(|e| ControllerError::Console {
                message: format!("Failed to write console output: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    async fn set_state(&mut self, on: bool) -> Result<(), ControllerError> {
        if !self.handle.is_connected() {
            return self.write_line("Not connected, command ignored");
        }

        self.handle.request_set_state(on).await?;
        Ok(())
    }

    fn stop_supervisor(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            debug!("Stopping reconnect supervisor");
            supervisor.abort();
        }
    }
}

impl<W: Write> Drop for Controller<W> {
    fn drop(&mut self) {
        self.stop_supervisor();
    }
}
