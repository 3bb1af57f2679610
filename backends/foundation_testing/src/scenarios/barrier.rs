//! Workers advancing through phases in lockstep behind a [`Barrier`].

use std::sync::Arc;
use std::thread;

use foundation_sync::{Barrier, Mutex, SyncResult};

/// Order in which `(phase, worker)` completions were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseLog {
    pub entries: Vec<(usize, usize)>,
    /// Leader reported for each phase, in phase order.
    pub leaders: Vec<usize>,
}

impl PhaseLog {
    /// No entry of a later phase precedes an entry of an earlier one.
    #[must_use]
    pub fn is_phase_ordered(&self) -> bool {
        self.entries.windows(2).all(|pair| pair[0].0 <= pair[1].0)
    }
}

/// Runs `workers` threads through `phases` phases. Each worker records
/// its completion of a phase, then waits at the barrier before starting
/// the next one.
///
/// # Errors
///
/// [`foundation_sync::SyncError::InvalidArgument`] for zero workers.
///
/// # Panics
///
/// Re-raises a panic from any worker thread.
pub fn run_phased_workers(workers: usize, phases: usize) -> SyncResult<PhaseLog> {
    let barrier = Arc::new(Barrier::new(workers)?);
    let log = Arc::new(Mutex::new(PhaseLog::default()));

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let barrier = Arc::clone(&barrier);
            let log = Arc::clone(&log);
            thread::spawn(move || -> SyncResult<()> {
                for phase in 0..phases {
                    log.lock().entries.push((phase, worker));
                    if barrier.wait()?.is_leader {
                        log.lock().leaders.push(worker);
                        tracing::trace!(phase, worker, "phase complete");
                    }
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(outcome) => outcome?,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    let log = log.lock().clone();
    Ok(log)
}
