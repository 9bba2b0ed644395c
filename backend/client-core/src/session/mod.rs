//! The connection-and-protocol session.
//!
//! [`Session`] is the synchronous state machine: it owns the transport
//! instance, the [`ConnectionState`](crate::state::ConnectionState) and the
//! [`ActuatorState`](crate::state::ActuatorState), and is the only thing that
//! mutates them.
//!
//! [`SessionHandle`] runs one `Session` inside a tokio task. User commands and
//! transport events share one queue, so they are applied one at a time, in
//! arrival order. Cheap snapshot reads are served from `watch` channels the
//! task publishes to.

mod handle;
mod state_machine;

pub use handle::{SessionHandle, WeakSessionHandle};
pub(crate) use handle::SessionInput;
pub use state_machine::{ConnectionEvent, ConnectionListener, Session, StateListener};
