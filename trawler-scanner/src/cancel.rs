use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One-shot broadcast telling every worker to stop taking new work.
///
/// Fires at most once and is never reset. Clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    fired: Arc<AtomicBool>,
    token: CancellationToken,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the caller that actually fired it;
    /// later calls are no-ops and return `false`.
    pub fn signal(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.token.cancel();
            true
        } else {
            false
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Resolves once the signal has fired.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Running count of collected images shared by the worker pool.
///
/// Fires the attached [`CancellationSignal`] once the total exceeds the threshold.
/// Without a threshold it only counts.
#[derive(Debug, Clone)]
pub struct ImageBudget {
    collected: Arc<AtomicUsize>,
    threshold: Option<usize>,
    signal: CancellationSignal,
}

impl ImageBudget {
    pub fn new(threshold: Option<usize>, signal: CancellationSignal) -> Self {
        Self {
            collected: Arc::new(AtomicUsize::new(0)),
            threshold,
            signal,
        }
    }

    /// Add `count` images to the running total and fire the signal if the
    /// budget is now exceeded. Returns the new total.
    pub fn record(&self, count: usize) -> usize {
        let total = self.collected.fetch_add(count, Ordering::AcqRel) + count;
        if let Some(threshold) = self.threshold
            && total > threshold
            && self.signal.signal()
        {
            info!(
                "Image budget exceeded ({} > {}), cancelling crawl",
                total, threshold
            );
        }
        total
    }

    pub fn collected(&self) -> usize {
        self.collected.load(Ordering::Acquire)
    }
}
