// Unit tests for the session state machine, driven by hand through a fake transport

use crate::codec::encode_set_state;
use crate::session::{ConnectionEvent, Session};
use crate::state::{ActuatorState, ConnectionState};
use crate::tests::support::{FakeConnector, Recorder, handshake_error, test_url};
use crate::transport::{ConnectionId, TransportEvent};

use std::sync::{Arc, Mutex};

fn new_session(recorder: &Recorder) -> Session<FakeConnector> {
    Session::new(test_url(), FakeConnector::detached(recorder))
}

fn connected_session(recorder: &Recorder) -> Session<FakeConnector> {
    let mut session = new_session(recorder);
    session.connect();
    session.on_transport_open();
    session
}

/// Attach a state listener that records every value it is called with.
fn record_states(session: &mut Session<FakeConnector>) -> Arc<Mutex<Vec<ActuatorState>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session.set_state_listener(move |state| sink.lock().unwrap().push(state));
    seen
}

/// Attach a connection listener that records every event it is called with.
fn record_connection_events(
    session: &mut Session<FakeConnector>,
) -> Arc<Mutex<Vec<ConnectionEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session.set_connection_listener(move |event| sink.lock().unwrap().push(event.clone()));
    seen
}

/// **VALUE**: Verifies that commands issued while disconnected do nothing at all.
///
/// **WHY THIS MATTERS**: The UI may fire a click before the connection is up.
/// Showing a state the peer never received would lie to the user.
///
/// **BUG THIS CATCHES**: Would catch commands being queued, transmitted or
/// applied locally while disconnected.
#[test]
fn given_disconnected_session_when_set_state_requested_then_nothing_happens() {
    // GIVEN: A fresh session with a state listener
    let recorder = Recorder::default();
    let mut session = new_session(&recorder);
    let seen = record_states(&mut session);

    // WHEN: Requesting "on"
    session.request_set_state(true);

    // THEN: No frame, no state change, no listener call
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(recorder.frames().is_empty(), "Nothing should be transmitted");
    assert_eq!(session.actuator_state(), ActuatorState::OFF);
    assert!(seen.lock().unwrap().is_empty(), "Listener should not be called");
}

/// **VALUE**: Verifies the Disconnected → Connecting → Connected path and the
/// optimistic command that follows.
///
/// **WHY THIS MATTERS**: This is the main happy path: click, immediate UI
/// feedback, exactly one frame on the wire.
///
/// **BUG THIS CATCHES**: Would catch duplicate listener calls, duplicate
/// frames, or a wrong frame encoding.
#[test]
fn given_connected_session_when_set_state_requested_then_notifies_once_and_sends_frame() {
    // GIVEN: A session walked through connect + open
    let recorder = Recorder::default();
    let mut session = new_session(&recorder);
    let seen = record_states(&mut session);

    session.connect();
    assert_eq!(session.connection_state(), ConnectionState::Connecting);
    session.on_transport_open();
    assert!(session.is_connected());

    // WHEN: Requesting "on"
    session.request_set_state(true);

    // THEN: One listener call with true, one [1, 1] frame
    assert_eq!(*seen.lock().unwrap(), vec![ActuatorState::ON]);
    assert_eq!(recorder.frames(), vec![encode_set_state(true)]);
    assert_eq!(recorder.frames()[0].as_bytes(), &[1, 1]);
    assert_eq!(session.actuator_state(), ActuatorState::ON);
}

/// **VALUE**: Verifies that the peer's state overrides an optimistic local value.
///
/// **WHY THIS MATTERS**: The peer is authoritative. If another controller changed
/// the LED at the same time, the UI must end up showing what the LED actually is.
///
/// **BUG THIS CATCHES**: Would catch inbound frames being suppressed after a
/// local command.
#[test]
fn given_optimistic_on_when_peer_reports_off_then_final_state_is_off() {
    // GIVEN: Connected session after an optimistic "on"
    let recorder = Recorder::default();
    let mut session = connected_session(&recorder);
    let seen = record_states(&mut session);
    session.request_set_state(true);

    // WHEN: The peer reports "off"
    session.on_transport_message(&[1, 0]);

    // THEN: Off wins, and the listener saw both values in order
    assert_eq!(session.actuator_state(), ActuatorState::OFF);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![ActuatorState::ON, ActuatorState::OFF]
    );
}

/// **VALUE**: Verifies that a close keeps the last known state and the listeners.
///
/// **WHY THIS MATTERS**: The UI keeps showing the last value while offline, and
/// must keep receiving updates after a reconnect without re-registering.
///
/// **BUG THIS CATCHES**: Would catch close resetting the actuator or dropping listeners.
#[test]
fn given_connected_session_when_transport_closes_then_keeps_state_and_listeners() {
    // GIVEN: Connected session with actuator on
    let recorder = Recorder::default();
    let mut session = connected_session(&recorder);
    let seen = record_states(&mut session);
    session.on_transport_message(&[1, 1]);

    // WHEN: The peer closes the connection
    session.on_transport_close(1000, "bye", true);

    // THEN: Disconnected, state kept, no transport
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(session.actuator_state(), ActuatorState::ON);
    assert!(session.current_connection().is_none());

    // AND: The listener still fires after reconnecting
    session.connect();
    session.on_transport_open();
    session.on_transport_message(&[1, 0]);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![ActuatorState::ON, ActuatorState::OFF]
    );
}

/// **VALUE**: Verifies that malformed and unknown frames leave the session alone.
///
/// **WHY THIS MATTERS**: A bad frame from the peer must never tear down the
/// connection or flip the LED.
///
/// **BUG THIS CATCHES**: Would catch decode errors disconnecting the session or
/// NoOp frames reaching the listener.
#[test]
fn given_connected_session_when_bad_frames_arrive_then_state_unchanged() {
    // GIVEN: Connected session with actuator on
    let recorder = Recorder::default();
    let mut session = connected_session(&recorder);
    session.on_transport_message(&[1, 1]);
    let seen = record_states(&mut session);

    // WHEN: Truncated and unknown frames arrive
    session.on_transport_message(&[]);
    session.on_transport_message(&[1]);
    session.on_transport_message(&[99, 0]);

    // THEN: Still connected, still on, listener untouched
    assert!(session.is_connected());
    assert_eq!(session.actuator_state(), ActuatorState::ON);
    assert!(seen.lock().unwrap().is_empty());
}

/// **VALUE**: Verifies that connect() is idempotent while a transport exists.
///
/// **WHY THIS MATTERS**: A UI "connect" click racing the reconnect supervisor
/// must not open a second socket to the peer.
///
/// **BUG THIS CATCHES**: Would catch a second transport being created while
/// Connecting or Connected.
#[test]
fn given_connecting_or_connected_when_connect_called_then_no_new_transport() {
    // GIVEN: A session that is connecting
    let recorder = Recorder::default();
    let mut session = new_session(&recorder);
    session.connect();

    // WHEN: connect() again while Connecting, and again once Connected
    session.connect();
    session.on_transport_open();
    session.connect();

    // THEN: Only one transport instance was requested
    assert_eq!(recorder.connections().len(), 1);
    assert!(session.is_connected());
}

/// **VALUE**: Verifies that commands issued mid-handshake are dropped.
///
/// **BUG THIS CATCHES**: Would catch Connecting being treated as connected, or
/// commands being queued until the handshake completes.
#[test]
fn given_connecting_session_when_set_state_requested_then_dropped() {
    // GIVEN: A session that is connecting
    let recorder = Recorder::default();
    let mut session = new_session(&recorder);
    session.connect();

    // WHEN: Requesting "on", then completing the handshake
    session.request_set_state(true);
    session.on_transport_open();

    // THEN: Nothing was sent or applied
    assert!(recorder.frames().is_empty());
    assert_eq!(session.actuator_state(), ActuatorState::OFF);
}

/// **VALUE**: Verifies that transport errors are reported before the
/// Disconnected transition.
///
/// **WHY THIS MATTERS**: The UI shows why the connection failed; the error must
/// reach it, and the session must be ready for another connect().
///
/// **BUG THIS CATCHES**: Would catch errors being swallowed or the session
/// staying Connecting after a failed handshake.
#[test]
fn given_connecting_session_when_transport_errors_then_reports_and_disconnects() {
    // GIVEN: A connecting session with a connection listener
    let recorder = Recorder::default();
    let mut session = new_session(&recorder);
    let events = record_connection_events(&mut session);
    session.connect();

    // WHEN: The handshake fails
    session.on_transport_error(handshake_error());

    // THEN: Connecting, then the error, then Disconnected
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3, "Unexpected events: {events:?}");
    assert!(matches!(
        events[0],
        ConnectionEvent::StateChanged(ConnectionState::Connecting)
    ));
    assert!(matches!(events[1], ConnectionEvent::Error(_)));
    assert!(matches!(
        events[2],
        ConnectionEvent::StateChanged(ConnectionState::Disconnected)
    ));
    assert!(session.current_connection().is_none());
}

/// **VALUE**: Verifies that events from a discarded transport are ignored.
///
/// **WHY THIS MATTERS**: An old socket may still deliver a late frame or close
/// after a reconnect. It must not close or overwrite the new connection.
///
/// **BUG THIS CATCHES**: Would catch the session acting on events without
/// checking which transport they came from.
#[test]
fn given_new_transport_when_stale_events_arrive_then_ignored() {
    // GIVEN: A session on its second transport instance
    let recorder = Recorder::default();
    let mut session = connected_session(&recorder);
    let stale = recorder.last_connection();
    session.on_transport_close(1006, "", true);
    session.connect();
    let current = recorder.last_connection();
    session.handle_transport_event(current, TransportEvent::Open);

    // WHEN: The old instance reports a frame and a close
    session.handle_transport_event(stale, TransportEvent::Message(vec![1, 1]));
    session.handle_transport_event(
        stale,
        TransportEvent::Close {
            code: 1000,
            reason: String::new(),
            remote: true,
        },
    );
    session.handle_transport_event(ConnectionId::new(), TransportEvent::Open);

    // THEN: The current connection is untouched
    assert!(session.is_connected());
    assert_eq!(session.current_connection(), Some(current));
    assert_eq!(session.actuator_state(), ActuatorState::OFF);
}

/// **VALUE**: Verifies that disconnect() asks the transport to close and waits
/// for its close event.
///
/// **BUG THIS CATCHES**: Would catch disconnect() flipping state on its own
/// instead of following the transport lifecycle.
#[test]
fn given_connected_session_when_disconnect_called_then_transport_asked_to_close() {
    // GIVEN: Connected session
    let recorder = Recorder::default();
    let mut session = connected_session(&recorder);
    let id = recorder.last_connection();

    // WHEN: Disconnecting
    session.disconnect();

    // THEN: Close requested, still connected until the transport confirms
    assert_eq!(recorder.close_requests(), 1);
    assert!(session.is_connected());

    session.handle_transport_event(
        id,
        TransportEvent::Close {
            code: 1000,
            reason: String::from("closed by client"),
            remote: false,
        },
    );
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

/// **VALUE**: Verifies that toggle requests the inverse of the current state.
///
/// **BUG THIS CATCHES**: Would catch toggle reading a stale value or sending
/// the current value again.
#[test]
fn given_connected_session_when_toggled_then_sends_inverse() {
    // GIVEN: Connected session where the peer reported "on"
    let recorder = Recorder::default();
    let mut session = connected_session(&recorder);
    session.on_transport_message(&[1, 1]);

    // WHEN: Toggling twice
    session.request_toggle();
    session.request_toggle();

    // THEN: off, then on
    assert_eq!(
        recorder.frames(),
        vec![encode_set_state(false), encode_set_state(true)]
    );
    assert_eq!(session.actuator_state(), ActuatorState::ON);
}

/// **VALUE**: Verifies that setting a listener replaces the previous one.
///
/// **BUG THIS CATCHES**: Would catch listeners accumulating instead of replacing.
#[test]
fn given_listener_when_replaced_then_only_new_listener_called() {
    // GIVEN: Connected session with a first listener
    let recorder = Recorder::default();
    let mut session = connected_session(&recorder);
    let first = record_states(&mut session);

    // WHEN: Replacing it and receiving a frame
    let second = record_states(&mut session);
    session.on_transport_message(&[1, 1]);

    // THEN: Only the second listener saw it
    assert!(first.lock().unwrap().is_empty());
    assert_eq!(*second.lock().unwrap(), vec![ActuatorState::ON]);
}

/// **VALUE**: Verifies that an error on a live connection is reported before
/// the Disconnected transition and keeps the last actuator state.
///
/// **WHY THIS MATTERS**: A socket can die mid-session (relay crash, Wi-Fi
/// drop). The UI must learn why, then show the last known value as offline.
///
/// **BUG THIS CATCHES**: Would catch the error being surfaced after the state
/// change, or the actuator being reset on error.
#[test]
fn given_connected_session_when_transport_errors_then_reports_before_disconnect_and_keeps_state() {
    // GIVEN: Connected session showing "on", with a connection listener
    let recorder = Recorder::default();
    let mut session = connected_session(&recorder);
    session.on_transport_message(&[1, 1]);
    let events = record_connection_events(&mut session);
    let id = recorder.last_connection();

    // WHEN: The live connection fails
    session.handle_transport_event(id, TransportEvent::Error(handshake_error()));

    // THEN: The error, then Disconnected
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2, "Unexpected events: {events:?}");
    assert!(matches!(events[0], ConnectionEvent::Error(_)));
    assert!(matches!(
        events[1],
        ConnectionEvent::StateChanged(ConnectionState::Disconnected)
    ));

    // AND: The last state survives, the transport is gone
    assert_eq!(session.actuator_state(), ActuatorState::ON);
    assert!(session.current_connection().is_none());
}

/// **VALUE**: Verifies that a close before the handshake completes goes
/// straight back to Disconnected without an error.
///
/// **WHY THIS MATTERS**: Disconnecting while the peer is still answering the
/// handshake is a normal user action, not a failure.
///
/// **BUG THIS CATCHES**: Would catch the session staying Connecting after a
/// pre-open close, or reporting it as an error.
#[test]
fn given_connecting_session_when_transport_closes_then_disconnected_without_error() {
    // GIVEN: A session mid-handshake whose previous connection left "on"
    let recorder = Recorder::default();
    let mut session = connected_session(&recorder);
    session.on_transport_message(&[1, 1]);
    session.on_transport_close(1006, "", true);
    session.connect();
    let events = record_connection_events(&mut session);
    let id = recorder.last_connection();
    session.disconnect();

    // WHEN: The transport reports the close before ever opening
    session.handle_transport_event(
        id,
        TransportEvent::Close {
            code: 1000,
            reason: String::from("closed before handshake completed"),
            remote: false,
        },
    );

    // THEN: Only the Disconnected transition, state kept
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1, "Unexpected events: {events:?}");
    assert!(matches!(
        events[0],
        ConnectionEvent::StateChanged(ConnectionState::Disconnected)
    ));
    assert_eq!(recorder.close_requests(), 1);
    assert_eq!(session.actuator_state(), ActuatorState::ON);
    assert!(session.current_connection().is_none());
}
