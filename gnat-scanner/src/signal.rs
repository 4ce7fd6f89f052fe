use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Shared stop switches for one crawl.
///
/// `disarm` is the soft stop: fetches already running finish, nothing new
/// starts. `cancel` is the hard stop: it disarms and also wakes every pending
/// fetch so it can abandon its result.
#[derive(Debug, Clone)]
pub struct CrawlSignal {
    armed: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl CrawlSignal {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Use an existing token (often a child of a caller-wide one) as the
    /// hard stop.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(true)),
            cancel,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn cancel(&self) {
        self.disarm();
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

impl Default for CrawlSignal {
    fn default() -> Self {
        Self::new()
    }
}
