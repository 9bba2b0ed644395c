use crate::codec::{Decoded, decode_frame, encode_set_state};
use crate::error::transport::TransportError;
use crate::state::{ActuatorState, ConnectionState};
use crate::transport::{ConnectionId, Connector, TransportEvent, TransportLink};

use log::{debug, error, info, warn};
use url::Url;

/// Callback invoked with the new actuator state after every update.
pub type StateListener = Box<dyn FnMut(ActuatorState) + Send>;

/// Callback invoked on connection state changes and transport errors.
pub type ConnectionListener = Box<dyn FnMut(&ConnectionEvent) + Send>;

/// What the connection listener is told about.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    Error(TransportError),
}

struct ActiveTransport<L> {
    id: ConnectionId,
    link: L,
}

/// Session state machine for one peer and one actuator.
///
/// `Disconnected --connect()--> Connecting --open--> Connected`, and any
/// close or error goes back to `Disconnected`. Nothing here reconnects on its
/// own; see [`crate::reconnect`].
pub struct Session<C: Connector> {
    address: Url,
    connector: C,
    connection: ConnectionState,
    actuator: ActuatorState,
    transport: Option<ActiveTransport<C::Link>>,
    state_listener: Option<StateListener>,
    connection_listener: Option<ConnectionListener>,
}

impl<C: Connector> Session<C> {
    pub fn new(address: Url, connector: C) -> Self {
        Self {
            address,
            connector,
            connection: ConnectionState::Disconnected,
            actuator: ActuatorState::default(),
            transport: None,
            state_listener: None,
            connection_listener: None,
        }
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn actuator_state(&self) -> ActuatorState {
        self.actuator
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Id of the transport instance currently owned, if any.
    pub fn current_connection(&self) -> Option<ConnectionId> {
        self.transport.as_ref().map(|transport| transport.id)
    }

    /// Start a new transport instance. No-op unless disconnected.
    pub fn connect(&mut self) {
        if self.connection != ConnectionState::Disconnected {
            debug!("connect() ignored, session is {}", self.connection);
            return;
        }

        let id = ConnectionId::new();
        info!("[{id}] Connecting to {}", self.address);

        self.set_connection_state(ConnectionState::Connecting);
        let link = self.connector.connect(&self.address, id);
        self.transport = Some(ActiveTransport { id, link });
    }

    /// Ask the current transport instance to close.
    ///
    /// The session only becomes `Disconnected` once the transport reports the
    /// close.
    pub fn disconnect(&mut self) {
        match self.transport.as_mut() {
            Some(transport) => {
                info!("[{}] Disconnecting from {}", transport.id, self.address);
                transport.link.close();
            }
            None => debug!("disconnect() ignored, no transport"),
        }
    }

    /// Set the actuator, optimistically.
    ///
    /// Dropped silently unless connected. Otherwise the local state and the
    /// state listener are updated before the frame is handed to the transport.
    pub fn request_set_state(&mut self, on: bool) {
        if !self.is_connected() {
            debug!("Dropping set-state command ({on}), session is {}", self.connection);
            return;
        }

        self.apply_actuator_state(ActuatorState { on });

        let frame = encode_set_state(on);
        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.link.send(frame) {
                warn!("[{}] Failed to queue frame: {e}", transport.id);
            }
        }
    }

    /// Request the inverse of the current actuator state.
    pub fn request_toggle(&mut self) {
        self.request_set_state(!self.actuator.on);
    }

    /// Route an event from transport instance `id`.
    ///
    /// Events from any instance other than the current one are ignored.
    pub fn handle_transport_event(&mut self, id: ConnectionId, event: TransportEvent) {
        if self.current_connection() != Some(id) {
            warn!("[{id}] Ignoring event from stale transport: {event:?}");
            return;
        }

        match event {
            TransportEvent::Open => self.on_transport_open(),
            TransportEvent::Message(bytes) => self.on_transport_message(&bytes),
            TransportEvent::Close {
                code,
                reason,
                remote,
            } => self.on_transport_close(code, &reason, remote),
            TransportEvent::Error(error) => self.on_transport_error(error),
        }
    }

    pub fn on_transport_open(&mut self) {
        match self.connection {
            ConnectionState::Connecting => {
                info!("Connected to {}", self.address);
                self.set_connection_state(ConnectionState::Connected);
            }
            other => warn!("Ignoring transport open while {other}"),
        }
    }

    /// Apply one inbound frame. The peer always wins over local state.
    pub fn on_transport_message(&mut self, bytes: &[u8]) {
        match decode_frame(bytes) {
            Ok(Decoded::State(state)) => {
                debug!("Peer reported actuator {state}");
                self.apply_actuator_state(state);
            }
            Ok(Decoded::NoOp { message_type }) => {
                debug!("Ignoring message type {message_type}");
            }
            Err(e) => warn!("Discarding inbound frame: {e}"),
        }
    }

    /// The transport closed. The last actuator state is kept.
    pub fn on_transport_close(&mut self, code: u16, reason: &str, remote: bool) {
        let origin = if remote { "peer" } else { "client" };
        info!(
            "Connection to {} closed by {origin} (code {code}, reason {reason:?})",
            self.address
        );

        self.transport = None;
        self.set_connection_state(ConnectionState::Disconnected);
    }

    pub fn on_transport_error(&mut self, error: TransportError) {
        error!("Transport error on {}: {error}", self.address);

        self.notify_connection(&ConnectionEvent::Error(error));
        self.transport = None;
        self.set_connection_state(ConnectionState::Disconnected);
    }

    /// Replace the state listener.
    pub fn set_state_listener<F>(&mut self, listener: F)
    where
        F: FnMut(ActuatorState) + Send + 'static,
    {
        self.state_listener = Some(Box::new(listener));
    }

    /// Replace the connection listener.
    pub fn set_connection_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&ConnectionEvent) + Send + 'static,
    {
        self.connection_listener = Some(Box::new(listener));
    }

    fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection == state {
            return;
        }

        debug!("Connection state {} -> {state}", self.connection);
        self.connection = state;
        self.notify_connection(&ConnectionEvent::StateChanged(state));
    }

    fn apply_actuator_state(&mut self, state: ActuatorState) {
        self.actuator = state;
        if let Some(listener) = self.state_listener.as_mut() {
            listener(state);
        }
    }

    fn notify_connection(&mut self, event: &ConnectionEvent) {
        if let Some(listener) = self.connection_listener.as_mut() {
            listener(event);
        }
    }
}
