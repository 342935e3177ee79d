//! Strictly increasing ID hand-out for the prober pool

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::models::VocabId;

/// Lock-free source of unique, strictly increasing vocabulary IDs.
///
/// Concurrent callers never receive the same ID twice. There is no upper
/// bound; the source only stops issuing once [`IdSource::stop`] is called.
#[derive(Debug)]
pub struct IdSource {
    next: AtomicU64,
    stopped: AtomicBool,
}

impl IdSource {
    /// Create a source starting at `start`
    pub fn new(start: VocabId) -> Self {
        Self {
            next: AtomicU64::new(start),
            stopped: AtomicBool::new(false),
        }
    }

    /// Draw the next ID, or `None` once the source is stopped
    pub fn next(&self) -> Option<VocabId> {
        if self.stopped.load(Ordering::Acquire) {
            return None;
        }
        Some(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Stop issuing IDs
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Next ID that would be issued; for progress logging only
    pub fn current(&self) -> VocabId {
        self.next.load(Ordering::Relaxed)
    }
}
