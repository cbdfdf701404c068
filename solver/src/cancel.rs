use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often a worker is allowed to look at its cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A cooperative, one-way cancellation token shared between the
/// orchestrator and its workers. Cancelling is idempotent; a cancelled
/// token never becomes live again.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Rate-limits cancellation polling against a monotonic clock so tight
/// solver loops pay for an atomic load at most every 100 ms.
#[derive(Debug)]
pub struct StopCheck {
    last_check: Instant,
}

impl StopCheck {
    pub fn new() -> StopCheck {
        StopCheck {
            last_check: Instant::now(),
        }
    }

    /// True once a cancellation request has been observed. Only consults
    /// the token when the polling interval has elapsed.
    pub fn stop_requested(&mut self, token: &CancelToken) -> bool {
        if self.last_check.elapsed() < POLL_INTERVAL {
            return false;
        }
        self.last_check = Instant::now();
        token.is_cancelled()
    }
}

impl Default for StopCheck {
    fn default() -> StopCheck {
        StopCheck::new()
    }
}
