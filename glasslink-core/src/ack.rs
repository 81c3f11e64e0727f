//! Acknowledgment tracking for chunked delivery.
//!
//! Only one chunk is ever in flight, so a single level-triggered flag is
//! enough: the notification path sets it, the send path clears it before each
//! chunk and polls it until it is set or the deadline passes. Several acks
//! arriving before a wait collapse into one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Default time to wait for a chunk acknowledgment.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Default interval between flag checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared acknowledgment flag.
///
/// Clones share the same flag.
#[derive(Debug, Clone)]
pub struct AckTracker {
    received: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl AckTracker {
    /// Create a tracker with the default poll interval.
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    /// Create a tracker with a custom poll interval.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            received: Arc::new(AtomicBool::new(false)),
            poll_interval,
        }
    }

    /// Record an acknowledgment.
    pub fn signal(&self) {
        self.received.store(true, Ordering::Release);
    }

    /// Forget any acknowledgment seen so far.
    pub fn reset(&self) {
        self.received.store(false, Ordering::Release);
    }

    /// Whether an acknowledgment is pending.
    #[inline]
    pub fn is_signalled(&self) -> bool {
        self.received.load(Ordering::Acquire)
    }

    /// Poll interval used by [`AckTracker::wait`].
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait for an acknowledgment.
    ///
    /// Returns `true` as soon as the flag is seen set, `false` once `timeout`
    /// has elapsed without it.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_signalled() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

impl Default for AckTracker {
    fn default() -> Self {
        Self::new()
    }
}
