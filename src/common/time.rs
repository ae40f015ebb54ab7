use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Server-wide idle timeout. Clones share the same value; the waiter reads it
/// on every wake, so a `set` takes effect within one wake cycle.
#[derive(Debug, Clone)]
pub struct IdleTimeout {
    millis: Arc<AtomicU64>,
}

impl IdleTimeout {
    pub fn new(timeout: Duration) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(timeout.as_millis() as u64)),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }

    pub fn set(&self, timeout: Duration) {
        self.millis.store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// Handles idle since this instant or earlier have expired.
    ///
    /// `None` when `now - timeout` predates the monotonic clock's origin, in
    /// which case nothing can have expired yet.
    pub fn expiry_cutoff(&self, now: Instant) -> Option<Instant> {
        now.checked_sub(self.get())
    }
}
