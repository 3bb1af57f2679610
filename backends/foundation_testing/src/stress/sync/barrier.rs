//! Phase separation for [`Barrier`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use foundation_sync::{Barrier, SyncResult};

use crate::stress::{StressConfig, StressHarness, StressResult};

#[derive(Debug, Clone)]
pub struct BarrierPhaseReport {
    pub result: StressResult,
    /// Leaders observed; one per completed generation.
    pub leaders: usize,
    pub generations: u64,
}

/// Every worker is one party; each iteration is one phase. A logical
/// clock counts arrivals, and a party leaving phase `n` must see every
/// arrival of phases `0..=n` already counted.
///
/// Phases only line up when every worker runs the same number of them,
/// so the configured duration limit is ignored.
///
/// ```
/// use foundation_testing::stress::{sync::run_barrier_phase_stress, StressConfig};
///
/// let report = run_barrier_phase_stress(StressConfig::new().threads(4).iterations(20)).unwrap();
/// assert_eq!(report.leaders, 20);
/// assert_eq!(report.generations, 20);
/// assert_eq!(report.result.failures, 0);
/// ```
///
/// # Errors
///
/// Propagates configuration errors from the harness.
pub fn run_barrier_phase_stress(config: StressConfig) -> SyncResult<BarrierPhaseReport> {
    let config = StressConfig::new()
        .threads(config.get_thread_count())
        .iterations(config.get_iterations());
    config.validate()?;

    let parties = config.get_thread_count();
    let barrier = Arc::new(Barrier::new(parties)?);
    let clock = Arc::new(AtomicUsize::new(0));
    let leaders = Arc::new(AtomicUsize::new(0));

    let result = {
        let barrier = Arc::clone(&barrier);
        let leaders = Arc::clone(&leaders);
        StressHarness::new(config).run(move |_thread_id, phase| {
            clock.fetch_add(1, Ordering::SeqCst);
            let Ok(outcome) = barrier.wait() else {
                return false;
            };
            if outcome.is_leader {
                leaders.fetch_add(1, Ordering::SeqCst);
            }
            clock.load(Ordering::SeqCst) >= (phase + 1) * parties
        })?
    };

    Ok(BarrierPhaseReport {
        result,
        leaders: leaders.load(Ordering::SeqCst),
        generations: barrier.generation(),
    })
}
