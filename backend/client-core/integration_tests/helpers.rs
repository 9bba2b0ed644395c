//! Test helpers for WebSocket integration tests.
//!
//! [`TestPeer`] behaves like the relay server the controller talks to in the
//! field: it sends its current LED state to every client on connect, records
//! every binary frame it receives, and can push frames or close clients on
//! request. After closing a client it records whether the client answered
//! with its own close frame.

use client_core::session::SessionHandle;
use client_core::state::{ActuatorState, ConnectionState};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
enum PeerAction {
    Send(Vec<u8>),
    Close,
}

pub struct TestPeer {
    pub address: Url,
    received: mpsc::UnboundedReceiver<Vec<u8>>,
    close_replies: mpsc::UnboundedReceiver<bool>,
    control: broadcast::Sender<PeerAction>,
    connections: Arc<AtomicUsize>,
}

impl TestPeer {
    /// Start a peer on an ephemeral localhost port.
    ///
    /// `initial_state` is sent as a state-update frame to each new client.
    pub async fn start(initial_state: Option<bool>) -> TestPeer {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test peer");
        let port = listener.local_addr().expect("No local address").port();
        let address = Url::parse(&format!("ws://127.0.0.1:{port}/")).expect("Invalid peer URL");

        let (received_tx, received) = mpsc::unbounded_channel();
        let (close_replies_tx, close_replies) = mpsc::unbounded_channel();
        let (control, _) = broadcast::channel(16);
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_control = control.clone();
        let accept_connections = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((stream, _addr)) = listener.accept().await {
                accept_connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_client(
                    stream,
                    initial_state,
                    received_tx.clone(),
                    close_replies_tx.clone(),
                    accept_control.subscribe(),
                ));
            }
        });

        TestPeer {
            address,
            received,
            close_replies,
            control,
            connections,
        }
    }

    /// Next binary frame received from any client.
    pub async fn next_frame(&mut self) -> Vec<u8> {
        timeout(WAIT_TIMEOUT, self.received.recv())
            .await
            .expect("Timed out waiting for a frame at the peer")
            .expect("Peer stopped")
    }

    /// Whether the next client closed by [`TestPeer::close_clients`] replied
    /// with a close frame.
    pub async fn next_close_reply(&mut self) -> bool {
        timeout(WAIT_TIMEOUT, self.close_replies.recv())
            .await
            .expect("Timed out waiting for the close handshake")
            .expect("Peer stopped")
    }

    /// Send `bytes` to every connected client.
    pub fn push(&self, bytes: &[u8]) {
        self.control
            .send(PeerAction::Send(bytes.to_vec()))
            .expect("No client connected to the peer");
    }

    /// Close every connected client.
    pub fn close_clients(&self) {
        self.control
            .send(PeerAction::Close)
            .expect("No client connected to the peer");
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve_client(
    stream: TcpStream,
    initial_state: Option<bool>,
    received_tx: mpsc::UnboundedSender<Vec<u8>>,
    close_replies_tx: mpsc::UnboundedSender<bool>,
    mut control_rx: broadcast::Receiver<PeerAction>,
) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    if let Some(on) = initial_state {
        let frame = vec![1, u8::from(on)];
        if write.send(Message::Binary(frame.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Binary(data))) => {
                    received_tx.send(data.to_vec()).ok();
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            action = control_rx.recv() => match action {
                Ok(PeerAction::Send(bytes)) => {
                    if write.send(Message::Binary(bytes.into())).await.is_err() {
                        return;
                    }
                }
                Ok(PeerAction::Close) | Err(_) => {
                    if write.send(Message::Close(None)).await.is_err() {
                        return;
                    }
                    let reply = timeout(WAIT_TIMEOUT, read.next()).await;
                    let replied = matches!(reply, Ok(Some(Ok(Message::Close(_)))));
                    close_replies_tx.send(replied).ok();
                    return;
                }
            },
        }
    }
}

/// A localhost URL that accepts TCP connections but never answers the
/// WebSocket handshake.
pub async fn stalled_address() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stalled listener");
    let port = listener.local_addr().expect("No local address").port();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _addr)) = listener.accept().await {
            held.push(stream);
        }
    });

    Url::parse(&format!("ws://127.0.0.1:{port}/")).expect("Invalid URL")
}

/// A localhost URL nothing is listening on.
pub async fn unreachable_address() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);
    Url::parse(&format!("ws://127.0.0.1:{port}/")).expect("Invalid URL")
}

pub async fn wait_for_connection(handle: &SessionHandle, expected: ConnectionState) {
    timeout(
        WAIT_TIMEOUT,
        handle.watch_connection().wait_for(|state| *state == expected),
    )
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for {expected}"))
    .expect("Session actor stopped");
}

pub async fn wait_for_actuator(handle: &SessionHandle, expected: ActuatorState) {
    timeout(
        WAIT_TIMEOUT,
        handle.watch_actuator().wait_for(|state| *state == expected),
    )
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for actuator {expected}"))
    .expect("Session actor stopped");
}
