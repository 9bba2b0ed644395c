//! Reconnection policy layered on top of [`SessionHandle::connect`].
//!
//! The session never reconnects by itself. The supervisor watches the
//! published connection state and, whenever it settles on `Disconnected`,
//! waits the next exponential-backoff interval and calls `connect()` again.
//! Reaching `Connected` resets the schedule.
//!
//! The supervisor holds a [`WeakSessionHandle`], so it never keeps the
//! session alive: once the last [`SessionHandle`] is dropped the actor stops
//! and the supervisor exits with it.

use crate::config::ReconnectConfig;
use crate::session::{SessionHandle, WeakSessionHandle};
use crate::state::ConnectionState;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use log::{debug, info, warn};
use tokio::spawn as TokioSpawn;
use tokio::task::JoinHandle;
use tokio::time::sleep as TokioSleep;

/// Spawn the reconnect supervisor for `handle`.
///
/// Returns `None` when reconnection is disabled in `config`. Abort the
/// returned task to stop reconnecting.
pub fn spawn_reconnect_supervisor(
    handle: &SessionHandle,
    config: &ReconnectConfig,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("Automatic reconnection disabled");
        return None;
    }

    info!(
        "Automatic reconnection enabled (initial {:?}, max {:?}, give up after {:?})",
        config.initial_interval(),
        config.max_interval(),
        config.max_elapsed()
    );

    Some(TokioSpawn(supervise(handle.downgrade(), config.to_backoff())))
}

async fn supervise(handle: WeakSessionHandle, mut backoff: ExponentialBackoff) {
    let mut connection = handle.watch_connection();

    loop {
        let state = *connection.borrow_and_update();

        match state {
            ConnectionState::Connected => backoff.reset(),
            ConnectionState::Connecting => {}
            ConnectionState::Disconnected => match backoff.next_backoff() {
                Some(delay) => {
                    info!("Reconnecting in {delay:?}");
                    TokioSleep(delay).await;

                    let Some(session) = handle.upgrade() else {
                        debug!("Session gone, reconnect supervisor exiting");
                        return;
                    };

                    if let Err(e) = session.connect().await {
                        warn!("Reconnect supervisor stopping: {e}");
                        return;
                    }
                }
                None => {
                    warn!("Giving up on reconnecting, backoff time exhausted");
                    return;
                }
            },
        }

        if connection.changed().await.is_err() {
            debug!("Session gone, reconnect supervisor exiting");
            return;
        }
    }
}
