use std::sync::atomic::{AtomicUsize, Ordering};

/// Observer notified as the rewriter advances through the input.
///
/// Reports are advisory: they neither block the run nor synchronise with it.
pub trait ProgressSink {
    /// Records that `current` of `total` lines have been processed.
    fn report(&self, current: usize, total: usize);
}

impl ProgressSink for () {
    fn report(&self, _current: usize, _total: usize) {}
}

/// Progress counter that a host can poll from another thread.
#[derive(Debug, Default)]
pub struct Progress {
    current: AtomicUsize,
    total: AtomicUsize,
}

impl Progress {
    /// Creates a counter that has not observed any work yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest `(current, total)` pair.
    #[must_use]
    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.current.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }

    /// Completed share of the work in `[0, 1]`; `0` until a total is known.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        let (current, total) = self.snapshot();
        if total == 0 {
            return 0.0;
        }
        (current as f64 / total as f64).min(1.0)
    }

    /// Returns whether the run reported its final line.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let (current, total) = self.snapshot();
        total > 0 && current >= total
    }
}

impl ProgressSink for Progress {
    fn report(&self, current: usize, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        let _ = self.current.fetch_max(current, Ordering::Relaxed);
    }
}
