//! A minimal LED relay for driving the controller end to end.

use client_core::config::ReconnectConfig;
use client_core::session::SessionHandle;
use client_core::state::{ActuatorState, ConnectionState};

use led_controller::app::{Controller, forward_session_events};
use led_controller::console::UiEvent;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// What the relay saw from its clients.
#[derive(Debug, PartialEq, Eq)]
pub enum PeerSeen {
    Frame(Vec<u8>),
    Closed,
}

pub struct Relay {
    pub address: Url,
    seen: mpsc::UnboundedReceiver<PeerSeen>,
}

impl Relay {
    /// Start a relay that greets each client with `[1, led_on]`.
    pub async fn start(led_on: bool) -> Relay {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind relay");
        let port = listener.local_addr().expect("No local address").port();
        let address = Url::parse(&format!("ws://127.0.0.1:{port}/")).expect("Invalid relay URL");
        let (seen_tx, seen) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _addr)) = listener.accept().await {
                let seen_tx = seen_tx.clone();
                tokio::spawn(async move {
                    let Ok(mut ws_stream) = accept_async(stream).await else {
                        return;
                    };
                    let greeting = vec![1, u8::from(led_on)];
                    if ws_stream.send(Message::Binary(greeting.into())).await.is_err() {
                        return;
                    }
                    while let Some(message) = ws_stream.next().await {
                        match message {
                            Ok(Message::Binary(data)) => {
                                seen_tx.send(PeerSeen::Frame(data.to_vec())).ok();
                            }
                            Ok(Message::Close(_)) | Err(_) => break,
                            Ok(_) => {}
                        }
                    }
                    seen_tx.send(PeerSeen::Closed).ok();
                });
            }
        });

        Relay { address, seen }
    }

    pub async fn next_seen(&mut self) -> PeerSeen {
        timeout(WAIT_TIMEOUT, self.seen.recv())
            .await
            .expect("Timed out waiting for the relay")
            .expect("Relay stopped")
    }
}

/// A controller writing into a buffer, connected to `relay` and showing
/// `expected` as the LED state.
pub async fn connected_controller(
    relay: &Relay,
    expected: ActuatorState,
) -> (Controller<Vec<u8>>, mpsc::UnboundedReceiver<UiEvent>) {
    let handle = SessionHandle::start(relay.address.clone());
    let events = forward_session_events(&handle)
        .await
        .expect("Failed to register listeners");
    let reconnect = ReconnectConfig {
        enabled: false,
        ..ReconnectConfig::default()
    };

    let mut controller = Controller::new(handle, reconnect, Vec::new());
    controller.connect().await.expect("Session actor stopped");

    let mut connection = controller.handle().watch_connection();
    timeout(
        WAIT_TIMEOUT,
        connection.wait_for(|state| *state == ConnectionState::Connected),
    )
    .await
    .expect("Timed out connecting")
    .expect("Session actor stopped");

    let mut actuator = controller.handle().watch_actuator();
    timeout(WAIT_TIMEOUT, actuator.wait_for(|state| *state == expected))
        .await
        .expect("Timed out waiting for the greeting")
        .expect("Session actor stopped");

    (controller, events)
}
