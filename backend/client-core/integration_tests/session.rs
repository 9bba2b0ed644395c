use crate::helpers::{
    TestPeer, WAIT_TIMEOUT, stalled_address, unreachable_address, wait_for_actuator,
    wait_for_connection,
};

use client_core::config::ReconnectConfig;
use client_core::reconnect::spawn_reconnect_supervisor;
use client_core::session::{ConnectionEvent, SessionHandle};
use client_core::state::{ActuatorState, ConnectionState};

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

async fn connect_to(peer: &TestPeer) -> SessionHandle {
    let handle = SessionHandle::start(peer.address.clone());
    handle.connect().await.expect("Session actor stopped");
    wait_for_connection(&handle, ConnectionState::Connected).await;
    handle
}

/// **VALUE**: Verifies that the state the peer sends on connect is applied.
///
/// **WHY THIS MATTERS**: The relay server greets every client with the current
/// LED state. That greeting is the only way a fresh controller learns it.
///
/// **BUG THIS CATCHES**: Would catch inbound binary frames never reaching the
/// session, or the first frame being lost during the open transition.
#[tokio::test]
async fn given_peer_with_led_on_when_connected_then_initial_state_applied() {
    // GIVEN: A peer whose LED is on
    let peer = TestPeer::start(Some(true)).await;

    // WHEN: Connecting
    let handle = connect_to(&peer).await;

    // THEN: The session shows "on"
    wait_for_actuator(&handle, ActuatorState::ON).await;
    assert!(handle.is_connected());
}

/// **VALUE**: Verifies that commands reach the peer as two-byte binary frames.
///
/// **WHY THIS MATTERS**: This is the whole point of the controller: a click
/// must arrive at the LED.
///
/// **BUG THIS CATCHES**: Would catch frames being sent as text, with extra
/// bytes, or not at all.
#[tokio::test]
async fn given_connected_session_when_set_state_requested_then_peer_receives_frames() {
    // GIVEN: A connected session
    let mut peer = TestPeer::start(Some(false)).await;
    let handle = connect_to(&peer).await;

    // WHEN: Turning the LED on, then off
    handle.request_set_state(true).await.unwrap();
    let first = peer.next_frame().await;
    handle.request_set_state(false).await.unwrap();
    let second = peer.next_frame().await;

    // THEN: [1, 1] then [1, 0]
    assert_eq!(first, vec![1, 1]);
    assert_eq!(second, vec![1, 0]);
    assert_eq!(handle.actuator_state(), ActuatorState::OFF);
}

/// **VALUE**: Verifies that peer pushes are applied and bad frames are ignored.
///
/// **WHY THIS MATTERS**: Other controllers and the device itself change the LED.
/// Garbage from the peer must not cost us the connection.
///
/// **BUG THIS CATCHES**: Would catch malformed or unknown frames closing the
/// connection or changing the displayed state.
#[tokio::test]
async fn given_connected_session_when_peer_pushes_frames_then_valid_ones_applied() {
    // GIVEN: Connected, LED on
    let peer = TestPeer::start(Some(true)).await;
    let handle = connect_to(&peer).await;
    wait_for_actuator(&handle, ActuatorState::ON).await;

    // WHEN: The peer sends a truncated frame, an unknown type, then "off"
    peer.push(&[1]);
    peer.push(&[99, 1]);
    peer.push(&[1, 0]);

    // THEN: Off is applied and the connection survives
    wait_for_actuator(&handle, ActuatorState::OFF).await;
    assert!(handle.is_connected());

    // AND: Only the exact byte 1 counts as on
    peer.push(&[1, 42]);
    peer.push(&[1, 1]);
    wait_for_actuator(&handle, ActuatorState::ON).await;
}

/// **VALUE**: Verifies that a peer close leaves the last state in place.
///
/// **BUG THIS CATCHES**: Would catch remote close frames not being turned into
/// Disconnected, or the state being reset.
#[tokio::test]
async fn given_connected_session_when_peer_closes_then_disconnected_with_last_state() {
    // GIVEN: Connected, LED on
    let peer = TestPeer::start(Some(true)).await;
    let handle = connect_to(&peer).await;
    wait_for_actuator(&handle, ActuatorState::ON).await;

    // WHEN: The peer closes the connection
    peer.close_clients();

    // THEN: Disconnected, still on
    wait_for_connection(&handle, ConnectionState::Disconnected).await;
    assert_eq!(handle.actuator_state(), ActuatorState::ON);
}

/// **VALUE**: Verifies that an unreachable peer produces an error and Disconnected.
///
/// **WHY THIS MATTERS**: The UI has to be told why it is not connected, and the
/// session must not hang in Connecting after a refused TCP connect.
///
/// **BUG THIS CATCHES**: Would catch handshake failures that are swallowed.
#[tokio::test]
async fn given_unreachable_peer_when_connect_then_error_reported() {
    // GIVEN: A session pointed at a closed port, with a connection listener
    let handle = SessionHandle::start(unreachable_address().await);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    handle
        .set_connection_listener(move |event| {
            event_tx.send(event.clone()).ok();
        })
        .await
        .unwrap();

    // WHEN: Connecting
    handle.connect().await.unwrap();

    // THEN: An error, then Disconnected
    let mut saw_error = false;
    loop {
        let event = timeout(WAIT_TIMEOUT, event_rx.recv())
            .await
            .expect("Timed out waiting for connection events")
            .expect("Listener dropped");
        match event {
            ConnectionEvent::Error(_) => saw_error = true,
            ConnectionEvent::StateChanged(ConnectionState::Disconnected) => break,
            ConnectionEvent::StateChanged(_) => {}
        }
    }
    assert!(saw_error, "Handshake failure should be reported");
    assert!(!handle.is_connected());
}

/// **VALUE**: Verifies that a local disconnect closes the socket and ends Disconnected.
///
/// **BUG THIS CATCHES**: Would catch disconnect() leaving the session Connected.
#[tokio::test]
async fn given_connected_session_when_disconnect_requested_then_disconnected() {
    // GIVEN: Connected
    let peer = TestPeer::start(None).await;
    let handle = connect_to(&peer).await;

    // WHEN: Disconnecting
    handle.disconnect().await.unwrap();

    // THEN: Disconnected; commands are dropped from now on
    wait_for_connection(&handle, ConnectionState::Disconnected).await;
    handle.request_set_state(true).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.actuator_state(), ActuatorState::OFF);
}

/// **VALUE**: Verifies that the reconnect supervisor brings a dropped connection back.
///
/// **WHY THIS MATTERS**: Relay restarts and Wi-Fi hiccups should heal on their
/// own, with a fresh transport instance each time.
///
/// **BUG THIS CATCHES**: Would catch a transport being reused after close, or
/// the supervisor never calling connect() again.
#[tokio::test]
async fn given_supervised_session_when_peer_drops_connection_then_reconnects() {
    // GIVEN: A supervised, connected session
    let peer = TestPeer::start(Some(true)).await;
    let handle = connect_to(&peer).await;
    let config = ReconnectConfig {
        enabled: true,
        initial_interval_ms: 20,
        max_interval_ms: 100,
        max_elapsed_secs: None,
    };
    let supervisor = spawn_reconnect_supervisor(&handle, &config).unwrap();

    // WHEN: The peer drops the client
    peer.close_clients();

    // THEN: A second connection is accepted and the session is Connected again
    timeout(WAIT_TIMEOUT, async {
        while peer.connection_count() < 2 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Supervisor never reconnected");
    wait_for_connection(&handle, ConnectionState::Connected).await;
    assert_eq!(peer.connection_count(), 2);

    supervisor.abort();
}

/// **VALUE**: Verifies that the client answers a peer close with its own close frame.
///
/// **WHY THIS MATTERS**: WebSocket peers expect the close handshake to
/// complete. Relays log an abrupt reset as an error and may treat the client
/// as crashed.
///
/// **BUG THIS CATCHES**: Would catch the connection task dropping the socket
/// before the queued close reply is flushed.
#[tokio::test]
async fn given_connected_session_when_peer_closes_then_close_reply_sent() {
    // GIVEN: Connected
    let mut peer = TestPeer::start(None).await;
    let handle = connect_to(&peer).await;

    // WHEN: The peer starts the close handshake
    peer.close_clients();

    // THEN: The client replies with a close frame and ends Disconnected
    assert!(
        peer.next_close_reply().await,
        "Client should answer the close frame"
    );
    wait_for_connection(&handle, ConnectionState::Disconnected).await;
}

/// **VALUE**: Verifies that disconnect() during a stalled handshake returns the
/// session to Disconnected without reporting an error.
///
/// **WHY THIS MATTERS**: A relay that accepts TCP but hangs would otherwise
/// leave the controller stuck in Connecting with no way out.
///
/// **BUG THIS CATCHES**: Would catch the connection task ignoring close
/// requests until the handshake finishes.
#[tokio::test]
async fn given_stalled_handshake_when_disconnect_requested_then_disconnected_without_error() {
    // GIVEN: A session connecting to a peer that never answers the handshake
    let handle = SessionHandle::start(stalled_address().await);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    handle
        .set_connection_listener(move |event| {
            event_tx.send(event.clone()).ok();
        })
        .await
        .unwrap();
    handle.connect().await.unwrap();
    wait_for_connection(&handle, ConnectionState::Connecting).await;

    // WHEN: Disconnecting mid-handshake
    handle.disconnect().await.unwrap();

    // THEN: Connecting, then Disconnected, with no error in between
    let mut events = Vec::new();
    while events.len() < 2 {
        let event = timeout(WAIT_TIMEOUT, event_rx.recv())
            .await
            .expect("Timed out waiting for connection events")
            .expect("Listener dropped");
        events.push(event);
    }
    assert!(matches!(
        events[0],
        ConnectionEvent::StateChanged(ConnectionState::Connecting)
    ));
    assert!(
        matches!(
            events[1],
            ConnectionEvent::StateChanged(ConnectionState::Disconnected)
        ),
        "Unexpected events: {events:?}"
    );
    assert_eq!(handle.connection_state(), ConnectionState::Disconnected);
}
