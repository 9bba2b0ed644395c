//! WebSocket transport over `tokio-tungstenite`.

use crate::codec::Frame;
use crate::error::transport::TransportError;
use crate::transport::{
    CLOSE_CODE_ABNORMAL, CLOSE_CODE_NORMAL, ConnectionId, Connector, TransportEvent,
    TransportEventSender, TransportLink,
};

use common::ErrorLocation;

use std::panic::Location;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use url::Url;

const CLOSED_BEFORE_OPEN_REASON: &str = "closed before handshake completed";
const CLOSED_BY_CLIENT_REASON: &str = "closed by client";
const STREAM_ENDED_REASON: &str = "stream ended without close frame";

enum Outbound {
    Frame(Frame),
    Close,
}

/// Builds one WebSocket connection task per [`Connector::connect`] call.
#[derive(Debug, Clone)]
pub struct WsConnector {
    events: TransportEventSender,
}

impl WsConnector {
    pub fn new(events: TransportEventSender) -> Self {
        Self { events }
    }
}

impl Connector for WsConnector {
    type Link = WsLink;

    fn connect(&mut self, address: &Url, id: ConnectionId) -> WsLink {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        TokioSpawn(run_connection(
            address.to_string(),
            id,
            outbound_rx,
            self.events.clone(),
        ));
        WsLink {
            id,
            outbound: outbound_tx,
        }
    }
}

/// Session-side end of a WebSocket connection task.
///
/// Dropping it makes the task close the socket and exit without reporting.
#[derive(Debug)]
pub struct WsLink {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl TransportLink for WsLink {
    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::Closed {
                message: format!("Connection task {} has stopped", self.id),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn close(&mut self) {
        if self.outbound.send(Outbound::Close).is_err() {
            debug!("[{}] Close requested but connection task already stopped", self.id);
        }
    }
}

/// Drives one connection: handshake, then inbound/outbound traffic until
/// either side closes or the link is dropped.
async fn run_connection(
    address: String,
    id: ConnectionId,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: TransportEventSender,
) {
    debug!("[{id}] Opening WebSocket to {address}");

    let handshake = connect_async(address.as_str());
    tokio::pin!(handshake);

    let ws_stream = loop {
        tokio::select! {
            result = &mut handshake => match result {
                Ok((ws_stream, _response)) => break ws_stream,
                Err(e) => {
                    error!("[{id}] WebSocket handshake with {address} failed: {e}");
                    events.emit(id, TransportEvent::Error(TransportError::handshake(&e)));
                    return;
                }
            },
            request = outbound.recv() => match request {
                Some(Outbound::Frame(frame)) => {
                    warn!("[{id}] Dropping frame {:?} queued before handshake completed", frame.as_bytes());
                }
                Some(Outbound::Close) => {
                    events.emit(
                        id,
                        TransportEvent::Close {
                            code: CLOSE_CODE_NORMAL,
                            reason: CLOSED_BEFORE_OPEN_REASON.to_string(),
                            remote: false,
                        },
                    );
                    return;
                }
                None => {
                    debug!("[{id}] Link dropped during handshake");
                    return;
                }
            },
        }
    };

    info!("[{id}] WebSocket open to {address}");
    if !events.emit(id, TransportEvent::Open) {
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Binary(data))) => {
                    trace!("[{id}] Received {} bytes", data.len());
                    if !events.emit(id, TransportEvent::Message(data.to_vec())) {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    // Flushes the close reply tungstenite queued on read
                    if let Err(e) = write.close().await {
                        debug!("[{id}] Close reply not delivered: {e}");
                    }
                    let (code, reason) = close_details(frame);
                    events.emit(id, TransportEvent::Close { code, reason, remote: true });
                    return;
                }
                Some(Ok(other)) => {
                    trace!("[{id}] Ignoring non-binary message ({} bytes)", other.len());
                }
                Some(Err(e)) => {
                    error!("[{id}] Error reading from {address}: {e}");
                    events.emit(id, TransportEvent::Error(TransportError::read(&e)));
                    return;
                }
                None => {
                    events.emit(
                        id,
                        TransportEvent::Close {
                            code: CLOSE_CODE_ABNORMAL,
                            reason: STREAM_ENDED_REASON.to_string(),
                            remote: true,
                        },
                    );
                    return;
                }
            },
            request = outbound.recv() => match request {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = write.send(Message::Binary(frame.to_vec().into())).await {
                        error!("[{id}] Error sending to {address}: {e}");
                        events.emit(id, TransportEvent::Error(TransportError::send(&e)));
                        return;
                    }
                }
                Some(Outbound::Close) => {
                    if let Err(e) = write.close().await {
                        debug!("[{id}] Close frame not delivered: {e}");
                    }
                    events.emit(
                        id,
                        TransportEvent::Close {
                            code: CLOSE_CODE_NORMAL,
                            reason: CLOSED_BY_CLIENT_REASON.to_string(),
                            remote: false,
                        },
                    );
                    return;
                }
                None => {
                    debug!("[{id}] Link dropped, closing WebSocket");
                    if let Err(e) = write.close().await {
                        debug!("[{id}] Close frame not delivered: {e}");
                    }
                    return;
                }
            },
        }
    }
}

fn close_details(frame: Option<CloseFrame>) -> (u16, String) {
    match frame {
        Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_owned()),
        None => (CLOSE_CODE_NORMAL, String::new()),
    }
}
