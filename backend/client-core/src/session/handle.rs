//! Session actor and its handle.
//!
//! # Architecture
//!
//! Uses an actor pattern so every mutation is serialized:
//! - User commands from [`SessionHandle`]s and events from transport
//!   instances land on one unbounded mpsc queue, so arrival order is
//!   processing order
//! - One task owns the [`Session`] and applies inputs one at a time
//! - After each one the task publishes connection and actuator snapshots to
//!   `watch` channels, which is what the handle's reads look at
//! - Only [`SessionHandle`]s hold the queue strongly; transports and
//!   [`WeakSessionHandle`]s do not keep the actor alive

use crate::error::session::SessionError;
use crate::session::state_machine::{ConnectionEvent, ConnectionListener, Session, StateListener};
use crate::state::{ActuatorState, ConnectionState};
use crate::transport::{
    ConnectionId, Connector, TransportEvent, TransportEventSender, WsConnector,
};

use common::ErrorLocation;

use std::panic::Location;

use log::{debug, info};
use tokio::spawn as TokioSpawn;
use tokio::sync::{mpsc, watch};
use url::Url;

/// Commands that reach the session actor.
pub(crate) enum SessionCommand {
    Connect,
    Disconnect,
    SetState(bool),
    Toggle,
    SetStateListener(StateListener),
    SetConnectionListener(ConnectionListener),
}

/// Everything the session actor consumes, in one queue.
pub(crate) enum SessionInput {
    Command(SessionCommand),
    Transport(ConnectionId, TransportEvent),
}

/// Handle to the process-wide session.
///
/// Construct one at startup and clone it to whoever needs it. All clones talk
/// to the same actor; the actor stops once every clone is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    /// Queue feeding the actor
    input_tx: mpsc::UnboundedSender<SessionInput>,

    /// Latest published connection state
    connection: watch::Receiver<ConnectionState>,

    /// Latest published actuator state
    actuator: watch::Receiver<ActuatorState>,
}

/// Non-owning [`SessionHandle`] for background helpers.
///
/// Snapshots stay readable; commands need [`WeakSessionHandle::upgrade`],
/// which fails once every strong handle is gone.
#[derive(Clone)]
pub struct WeakSessionHandle {
    input_tx: mpsc::WeakUnboundedSender<SessionInput>,
    connection: watch::Receiver<ConnectionState>,
    actuator: watch::Receiver<ActuatorState>,
}

impl WeakSessionHandle {
    pub fn upgrade(&self) -> Option<SessionHandle> {
        Some(SessionHandle {
            input_tx: self.input_tx.upgrade()?,
            connection: self.connection.clone(),
            actuator: self.actuator.clone(),
        })
    }

    /// Subscribe to connection state snapshots. The receiver errors once the
    /// actor has stopped.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }
}

impl SessionHandle {
    /// Spawn a session that talks WebSocket to `address`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(address: Url) -> Self {
        Self::start_with(address, WsConnector::new)
    }

    /// Spawn a session over a custom transport.
    ///
    /// `make_connector` receives the sender its transport instances must
    /// report events through.
    pub fn start_with<C, F>(address: Url, make_connector: F) -> Self
    where
        C: Connector + 'static,
        F: FnOnce(TransportEventSender) -> C,
    {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let session = Session::new(address, make_connector(TransportEventSender::new(&input_tx)));

        let (connection_tx, connection_rx) = watch::channel(session.connection_state());
        let (actuator_tx, actuator_rx) = watch::channel(session.actuator_state());

        TokioSpawn(session_actor(session, input_rx, connection_tx, actuator_tx));
        info!("Session actor spawned");

        Self {
            input_tx,
            connection: connection_rx,
            actuator: actuator_rx,
        }
    }

    /// A handle that does not keep the actor alive.
    pub fn downgrade(&self) -> WeakSessionHandle {
        WeakSessionHandle {
            input_tx: self.input_tx.downgrade(),
            connection: self.connection.clone(),
            actuator: self.actuator.clone(),
        }
    }

    /// Start connecting. Ignored unless disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ActorStopped`] if the actor is gone.
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Connect).await
    }

    /// Close the current connection, if any.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Disconnect).await
    }

    /// Set the actuator. Dropped by the actor unless connected at the time
    /// the command is applied.
    pub async fn request_set_state(&self, on: bool) -> Result<(), SessionError> {
        self.send(SessionCommand::SetState(on)).await
    }

    /// Flip the actuator, based on the state the actor holds when it applies
    /// the command.
    pub async fn request_toggle(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Toggle).await
    }

    /// Replace the state listener. It runs on the actor task.
    pub async fn set_state_listener<F>(&self, listener: F) -> Result<(), SessionError>
    where
        F: FnMut(ActuatorState) + Send + 'static,
    {
        self.send(SessionCommand::SetStateListener(Box::new(listener)))
            .await
    }

    /// Replace the connection listener. It runs on the actor task.
    pub async fn set_connection_listener<F>(&self, listener: F) -> Result<(), SessionError>
    where
        F: FnMut(&ConnectionEvent) + Send + 'static,
    {
        self.send(SessionCommand::SetConnectionListener(Box::new(listener)))
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn actuator_state(&self) -> ActuatorState {
        *self.actuator.borrow()
    }

    /// Subscribe to connection state snapshots.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    /// Subscribe to actuator state snapshots.
    pub fn watch_actuator(&self) -> watch::Receiver<ActuatorState> {
        self.actuator.clone()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.input_tx
            .send(SessionInput::Command(command))
            .map_err(|_| SessionError::ActorStopped {
                message: String::from("Session actor stopped: input queue closed"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

/// The session actor task.
///
/// Runs until every [`SessionHandle`] is dropped. Dropping the session on
/// exit drops the transport link, which closes the connection.
async fn session_actor<C: Connector>(
    mut session: Session<C>,
    mut input_rx: mpsc::UnboundedReceiver<SessionInput>,
    connection_tx: watch::Sender<ConnectionState>,
    actuator_tx: watch::Sender<ActuatorState>,
) {
    info!("Session actor started for {}", session.address());

    while let Some(input) = input_rx.recv().await {
        match input {
            SessionInput::Command(command) => apply_command(&mut session, command),
            SessionInput::Transport(id, event) => session.handle_transport_event(id, event),
        }

        publish(&connection_tx, session.connection_state());
        publish(&actuator_tx, session.actuator_state());
    }

    info!("Session actor stopped, all handles dropped");
}

fn apply_command<C: Connector>(session: &mut Session<C>, command: SessionCommand) {
    match command {
        SessionCommand::Connect => session.connect(),
        SessionCommand::Disconnect => session.disconnect(),
        SessionCommand::SetState(on) => session.request_set_state(on),
        SessionCommand::Toggle => session.request_toggle(),
        SessionCommand::SetStateListener(listener) => {
            debug!("Replacing state listener");
            session.set_state_listener(listener);
        }
        SessionCommand::SetConnectionListener(listener) => {
            debug!("Replacing connection listener");
            session.set_connection_listener(listener);
        }
    }
}

fn publish<T: Copy + PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}
