use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::connection::Inner;
use crate::transport::Transport;

/// How often the watchdog wakes to check whether a PINGREQ is due.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls once a second; if the connection has been idle for at least the
/// negotiated keep-alive, it issues a full PINGREQ/PINGRESP transaction
/// (through the same transaction mutex every other request uses, so it
/// can never race a caller's own transaction).
pub(crate) fn spawn_watchdog<T: Transport>(inner: Arc<Inner<T>>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Acquire) {
            thread::sleep(POLL_INTERVAL);
            if stop.load(Ordering::Acquire) {
                return;
            }
            if inner.keep_alive.is_zero() || !inner.is_connected() {
                continue;
            }
            let idle = inner.last_activity.lock().unwrap().elapsed();
            if idle < inner.keep_alive {
                continue;
            }
            if let Err(e) = inner.ping() {
                log::warn!("keep-alive ping failed: {}", e);
            }
        }
    })
}
