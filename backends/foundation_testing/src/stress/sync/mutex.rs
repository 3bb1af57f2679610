//! Lost-update detection for [`Mutex`].

use std::sync::Arc;
use std::thread;

use foundation_sync::{Mutex, SyncResult};

use crate::stress::{StressConfig, StressHarness, StressResult};

#[derive(Debug, Clone)]
pub struct MutexCounterReport {
    pub result: StressResult,
    /// Counter value after the run; equals `result.successes` unless an
    /// update was lost.
    pub counter: usize,
}

impl MutexCounterReport {
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.counter == self.result.successes
    }
}

/// Every operation reads the shared counter, yields inside the critical
/// section to invite interleaving, then writes it back incremented.
///
/// ```
/// use foundation_testing::stress::{sync::run_mutex_counter_stress, StressConfig};
///
/// let report = run_mutex_counter_stress(StressConfig::new().threads(8).iterations(100)).unwrap();
/// assert_eq!(report.counter, 800);
/// assert!(report.is_exact());
/// ```
///
/// # Errors
///
/// Propagates configuration errors from the harness.
pub fn run_mutex_counter_stress(config: StressConfig) -> SyncResult<MutexCounterReport> {
    let counter = Arc::new(Mutex::new(0usize));

    let shared = Arc::clone(&counter);
    let result = StressHarness::new(config).run(move |_thread_id, _iteration| {
        let mut guard = shared.lock();
        let seen = *guard;
        thread::yield_now();
        *guard = seen + 1;
        true
    })?;

    let counter = *counter.lock();
    Ok(MutexCounterReport { result, counter })
}
