use crate::helpers::{PeerSeen, Relay, connected_controller};

use client_core::state::{ActuatorState, ConnectionState};

/// **VALUE**: Verifies the full path from typed commands to frames at the relay.
///
/// **WHY THIS MATTERS**: This is the product: typing "on" must light the LED.
///
/// **BUG THIS CATCHES**: Would catch console commands that parse but never
/// reach the session, or quit leaving the socket open.
#[tokio::test]
async fn given_connected_console_when_on_off_quit_typed_then_relay_sees_frames_and_close() {
    // GIVEN: A controller connected to a relay whose LED is off
    let mut relay = Relay::start(false).await;
    let (mut controller, events) = connected_controller(&relay, ActuatorState::OFF).await;

    // WHEN: Typing on, off, quit
    let input: &[u8] = b"on\n  OFF \nquit\n";
    controller.run_console(input, events).await.unwrap();

    // THEN: The relay sees both frames, then the close
    assert_eq!(relay.next_seen().await, PeerSeen::Frame(vec![1, 1]));
    assert_eq!(relay.next_seen().await, PeerSeen::Frame(vec![1, 0]));
    assert_eq!(relay.next_seen().await, PeerSeen::Closed);
    assert_eq!(
        controller.handle().connection_state(),
        ConnectionState::Disconnected
    );
}

/// **VALUE**: Verifies that toggle is based on the state the relay reported.
///
/// **BUG THIS CATCHES**: Would catch toggle using a stale local default
/// instead of the greeting.
#[tokio::test]
async fn given_relay_reports_on_when_toggle_typed_then_sends_off() {
    // GIVEN: A controller showing the relay's "on"
    let mut relay = Relay::start(true).await;
    let (mut controller, events) = connected_controller(&relay, ActuatorState::ON).await;

    // WHEN: Typing toggle, then quit
    let input: &[u8] = b"toggle\nquit\n";
    controller.run_console(input, events).await.unwrap();

    // THEN: The relay receives "off"
    assert_eq!(relay.next_seen().await, PeerSeen::Frame(vec![1, 0]));
    assert_eq!(controller.handle().actuator_state(), ActuatorState::OFF);
}

/// **VALUE**: Verifies that unknown input prints help and end of input shuts down.
///
/// **BUG THIS CATCHES**: Would catch a typo killing the console loop, or EOF
/// (Ctrl-D, closed pipe) leaving the connection open.
#[tokio::test]
async fn given_connected_console_when_unknown_then_eof_then_help_printed_and_closed() {
    // GIVEN: A connected controller
    let mut relay = Relay::start(false).await;
    let (mut controller, events) = connected_controller(&relay, ActuatorState::OFF).await;

    // WHEN: Typing garbage and closing input
    let input: &[u8] = b"blink\n";
    controller.run_console(input, events).await.unwrap();

    // THEN: Help was printed and the relay saw the close
    let printed = String::from_utf8(controller.output().clone()).unwrap();
    assert!(printed.contains("Unknown command: \"blink\""), "{printed}");
    assert!(printed.contains("Commands:"), "{printed}");
    assert_eq!(relay.next_seen().await, PeerSeen::Closed);
}
