// Fake transport shared by the session, handle and reconnect tests.

use crate::codec::Frame;
use crate::error::transport::TransportError;
use crate::transport::{
    ConnectionId, Connector, TransportEvent, TransportEventSender, TransportLink,
};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use url::Url;

pub(crate) const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) fn test_url() -> Url {
    Url::parse("ws://127.0.0.1:9/").unwrap()
}

/// What the fake transport reports right after `connect()`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum OnConnect {
    /// Nothing; the test drives the lifecycle by hand.
    Silent,
    /// Report `Open` immediately.
    Open,
    /// Report a handshake error immediately.
    Fail,
}

/// Records everything the session asks of the fake transport.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    frames: Arc<Mutex<Vec<Frame>>>,
    connections: Arc<Mutex<Vec<ConnectionId>>>,
    close_requests: Arc<Mutex<usize>>,
    events: Arc<Mutex<Option<TransportEventSender>>>,
}

impl Recorder {
    pub(crate) fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub(crate) fn connections(&self) -> Vec<ConnectionId> {
        self.connections.lock().unwrap().clone()
    }

    pub(crate) fn last_connection(&self) -> ConnectionId {
        *self.connections.lock().unwrap().last().unwrap()
    }

    pub(crate) fn close_requests(&self) -> usize {
        *self.close_requests.lock().unwrap()
    }

    /// Inject an event as if the current transport instance emitted it.
    pub(crate) fn emit(&self, event: TransportEvent) {
        let events = self.events.lock().unwrap().clone().unwrap();
        assert!(events.emit(self.last_connection(), event), "session is gone");
    }
}

pub(crate) struct FakeConnector {
    recorder: Recorder,
    events: Option<TransportEventSender>,
    on_connect: OnConnect,
}

impl FakeConnector {
    /// Connector for driving a bare `Session` by hand.
    pub(crate) fn detached(recorder: &Recorder) -> Self {
        Self {
            recorder: recorder.clone(),
            events: None,
            on_connect: OnConnect::Silent,
        }
    }

    /// Connector for a `SessionHandle`, reporting through `events`.
    pub(crate) fn attached(
        recorder: &Recorder,
        events: TransportEventSender,
        on_connect: OnConnect,
    ) -> Self {
        *recorder.events.lock().unwrap() = Some(events.clone());
        Self {
            recorder: recorder.clone(),
            events: Some(events),
            on_connect,
        }
    }
}

impl Connector for FakeConnector {
    type Link = FakeLink;

    fn connect(&mut self, _address: &Url, id: ConnectionId) -> FakeLink {
        self.recorder.connections.lock().unwrap().push(id);

        if let Some(events) = &self.events {
            match self.on_connect {
                OnConnect::Silent => {}
                OnConnect::Open => {
                    events.emit(id, TransportEvent::Open);
                }
                OnConnect::Fail => {
                    events.emit(id, TransportEvent::Error(handshake_error()));
                }
            }
        }

        FakeLink {
            recorder: self.recorder.clone(),
        }
    }
}

pub(crate) struct FakeLink {
    recorder: Recorder,
}

impl TransportLink for FakeLink {
    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.recorder.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&mut self) {
        *self.recorder.close_requests.lock().unwrap() += 1;
    }
}

pub(crate) fn handshake_error() -> TransportError {
    TransportError::Handshake {
        message: String::from("connection refused"),
        location: ErrorLocation::from(Location::caller()),
    }
}

/// Wait until the watched value satisfies `predicate`, failing the test after
/// [`WAIT_TIMEOUT`].
pub(crate) async fn wait_until<T>(receiver: &mut watch::Receiver<T>, predicate: impl FnMut(&T) -> bool) {
    tokio::time::timeout(WAIT_TIMEOUT, receiver.wait_for(predicate))
        .await
        .expect("timed out waiting for session state")
        .expect("session actor stopped");
}
