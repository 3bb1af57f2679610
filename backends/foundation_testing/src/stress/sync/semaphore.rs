//! Occupancy bound for [`Semaphore`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use foundation_sync::{Semaphore, SyncResult};

use crate::stress::{StressConfig, StressHarness, StressResult};

#[derive(Debug, Clone)]
pub struct OccupancyReport {
    pub result: StressResult,
    pub permits: usize,
    /// Most holders ever observed inside the guarded section at once.
    pub peak: usize,
}

impl OccupancyReport {
    #[must_use]
    pub fn within_bound(&self) -> bool {
        self.peak <= self.permits && self.result.failures == 0
    }
}

/// Holders bump a live counter on entry and drop it on exit; an operation
/// fails if it ever sees more than `permits` holders.
///
/// # Errors
///
/// [`foundation_sync::SyncError::InvalidArgument`] for zero permits or an
/// invalid configuration.
pub fn run_semaphore_occupancy_stress(
    config: StressConfig,
    permits: usize,
) -> SyncResult<OccupancyReport> {
    let semaphore = Arc::new(Semaphore::new(permits)?);
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let result = {
        let live = Arc::clone(&live);
        let peak = Arc::clone(&peak);
        StressHarness::new(config).run(move |_thread_id, _iteration| {
            let _permit = semaphore.permit();
            let now = live.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::yield_now();
            live.fetch_sub(1, Ordering::SeqCst);
            now <= permits
        })?
    };

    let report = OccupancyReport {
        result,
        permits,
        peak: peak.load(Ordering::SeqCst),
    };
    if !report.within_bound() {
        tracing::warn!(peak = report.peak, permits, "semaphore occupancy exceeded its bound");
    }
    Ok(report)
}
