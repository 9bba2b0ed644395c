//! Transport collaborator seam.
//!
//! A [`Connector`] builds one transport instance per [`Session::connect`]
//! call. The instance reports its lifecycle as [`TransportEvent`]s tagged with
//! the [`ConnectionId`] it was created for; the session uses the id to ignore
//! events from instances it has already discarded.
//!
//! Transport I/O runs wherever the connector likes (the WebSocket connector
//! uses one tokio task per instance). Events are marshalled back to the
//! session's task through a [`TransportEventSender`], which feeds the same
//! queue as user commands, so session state is only ever touched from one
//! place and in arrival order.
//!
//! [`Session::connect`]: crate::session::Session::connect

mod ws;

pub use ws::{WsConnector, WsLink};

use crate::codec::Frame;
use crate::error::transport::TransportError;
use crate::session::SessionInput;

use std::fmt::{Display, Formatter, Result as FormatResult};

use tokio::sync::mpsc;
use url::Url;
use uuid::Uuid;

/// WebSocket close code for a normal, requested close.
pub const CLOSE_CODE_NORMAL: u16 = 1000;

/// WebSocket close code used when the stream ended without a close frame.
pub const CLOSE_CODE_ABNORMAL: u16 = 1006;

/// Identity of one transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConnectionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        // Short form is plenty to tell instances apart in the log
        let id = self.0.simple().to_string();
        formatter.write_str(&id[..8])
    }
}

/// Lifecycle and data events emitted by a transport instance.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Handshake completed.
    Open,

    /// One inbound binary frame.
    Message(Vec<u8>),

    /// The connection ended. `remote` is true when the peer closed it.
    Close {
        code: u16,
        reason: String,
        remote: bool,
    },

    /// The connection failed. No further events follow.
    Error(TransportError),
}

/// The session's handle on a live transport instance.
///
/// Dropping the link releases the instance; implementations close the
/// underlying connection when that happens.
pub trait TransportLink: Send {
    /// Queue a frame for transmission. Must not block.
    fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Ask the instance to close. Completion is reported as
    /// [`TransportEvent::Close`].
    fn close(&mut self);
}

/// Factory for transport instances.
pub trait Connector: Send {
    type Link: TransportLink + 'static;

    /// Start connecting to `address`. Must return immediately; progress is
    /// reported through events tagged with `id`.
    fn connect(&mut self, address: &Url, id: ConnectionId) -> Self::Link;
}

/// Sending half of the session's input queue, as seen by a transport.
///
/// Holds the queue weakly: transport tasks never keep the session alive.
#[derive(Debug, Clone)]
pub struct TransportEventSender {
    tx: mpsc::WeakUnboundedSender<SessionInput>,
}

impl TransportEventSender {
    pub(crate) fn new(tx: &mpsc::UnboundedSender<SessionInput>) -> Self {
        Self { tx: tx.downgrade() }
    }

    /// Deliver an event. Returns false once the session is gone.
    pub fn emit(&self, id: ConnectionId, event: TransportEvent) -> bool {
        self.tx
            .upgrade()
            .is_some_and(|tx| tx.send(SessionInput::Transport(id, event)).is_ok())
    }
}
