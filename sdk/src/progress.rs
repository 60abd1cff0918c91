use {
    std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    tokio::sync::watch,
};

/// Completion counter of one transfer job.
///
/// Clones share the same counter. The reported value never decreases.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    total: u64,
    completed: AtomicU64,
    sender: watch::Sender<u64>,
}

impl ProgressTracker {
    #[must_use]
    #[inline]
    pub fn new(total: u64) -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                total,
                completed: AtomicU64::new(0),
                sender,
            }),
        }
    }

    #[must_use]
    #[inline]
    pub fn total(&self) -> u64 {
        self.inner.total
    }

    #[must_use]
    #[inline]
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Records one completed unit and returns the new count.
    #[inline]
    pub fn increment(&self) -> u64 {
        let completed = self
            .inner
            .completed
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1)
            .min(self.inner.total);
        // Concurrent increments may publish out of order; keep the maximum.
        self.inner.sender.send_modify(|value| {
            if *value < completed {
                *value = completed;
            }
        });
        completed
    }

    /// Completion in percent. A job without units is complete from the start.
    #[must_use]
    #[inline]
    pub fn percent(&self) -> f64 {
        percent(self.completed(), self.inner.total)
    }

    #[must_use]
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.completed() >= self.inner.total
    }

    /// Receives the number of completed units after every change.
    #[must_use]
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.sender.subscribe()
    }
}

#[must_use]
#[inline]
pub fn percent(completed: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        completed.min(total) as f64 / total as f64 * 100.0
    }
}
