//! Exactly-once delivery for [`BoundedQueue`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use foundation_sync::{BoundedQueue, SyncError, SyncResult};

use crate::stress::{StressConfig, StressHarness, StressResult};

#[derive(Debug, Clone)]
pub struct QueueThroughputReport {
    pub result: StressResult,
    pub produced_sum: u64,
    pub consumed_sum: u64,
    /// Items left in the buffer afterwards; zero when nothing was lost.
    pub leftover: usize,
}

impl QueueThroughputReport {
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.produced_sum == self.consumed_sum && self.leftover == 0
    }
}

/// Even-numbered workers produce, odd-numbered ones consume, through a
/// queue of `capacity`. Produced and consumed values are summed so loss
/// or duplication shows up as a mismatch.
///
/// Producers and consumers must pair up, so the thread count has to be
/// even and the configured duration limit is ignored.
///
/// # Errors
///
/// [`SyncError::InvalidArgument`] for an odd thread count or zero
/// capacity.
pub fn run_queue_throughput_stress(
    config: StressConfig,
    capacity: usize,
) -> SyncResult<QueueThroughputReport> {
    if config.get_thread_count() % 2 != 0 {
        return Err(SyncError::InvalidArgument(
            "queue stress needs an even number of threads",
        ));
    }
    let config = StressConfig::new()
        .threads(config.get_thread_count())
        .iterations(config.get_iterations());

    let queue = Arc::new(BoundedQueue::new(capacity)?);
    let produced = Arc::new(AtomicU64::new(0));
    let consumed = Arc::new(AtomicU64::new(0));
    let iterations = config.get_iterations() as u64;

    let result = {
        let queue = Arc::clone(&queue);
        let produced = Arc::clone(&produced);
        let consumed = Arc::clone(&consumed);
        StressHarness::new(config).run(move |thread_id, iteration| {
            if thread_id % 2 == 0 {
                let value = thread_id as u64 * iterations + iteration as u64 + 1;
                queue.put(value);
                produced.fetch_add(value, Ordering::Relaxed);
            } else {
                consumed.fetch_add(queue.get(), Ordering::Relaxed);
            }
            true
        })?
    };

    Ok(QueueThroughputReport {
        result,
        produced_sum: produced.load(Ordering::Relaxed),
        consumed_sum: consumed.load(Ordering::Relaxed),
        leftover: queue.len(),
    })
}
