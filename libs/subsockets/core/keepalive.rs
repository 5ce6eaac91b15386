//! Keep-alive liveness monitor
//!
//! A single deadline, rearmed by every keep-alive signal and armed once on
//! handshake success. Expiry is the one mechanism that detects a half-open
//! connection the transport layer itself never reported as closed, and it
//! is fatal: every registered subscriber gets a terminal liveness error and
//! the socket is torn down.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Shared deadline state between the connection and its monitor task
pub(crate) struct KeepAliveState {
    deadline: Mutex<Instant>,
    interval: Duration,
    armed: AtomicBool,
}

impl KeepAliveState {
    /// Arm the monitor with the negotiated (or fallback) interval
    pub fn new(interval: Duration) -> Self {
        Self {
            deadline: Mutex::new(Instant::now() + interval),
            interval,
            armed: AtomicBool::new(true),
        }
    }

    /// A liveness signal arrived: push the deadline out by one interval
    pub fn signal(&self) {
        if self.is_armed() {
            *self.deadline.lock() = Instant::now() + self.interval;
        }
    }

    /// The connection closed through another path; expiry must not fire
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the deadline stops moving, then report expiry
    ///
    /// Returns `true` if the monitor expired while still armed. Each wakeup
    /// re-reads the deadline, so signals received during the sleep simply
    /// extend it.
    pub async fn expired(&self) -> bool {
        loop {
            if !self.is_armed() {
                return false;
            }
            let deadline = *self.deadline.lock();
            if Instant::now() >= deadline {
                debug!("keep-alive deadline passed without a liveness signal");
                return self.is_armed();
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}
