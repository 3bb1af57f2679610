//! Multi-producer, multi-consumer pipeline over a [`BoundedQueue`].

use std::sync::Arc;
use std::thread;

use foundation_sync::{BoundedQueue, Message, SyncResult};

/// What every consumer received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub produced: usize,
    /// Items per consumer, in the order each consumer received them.
    pub received: Vec<Vec<usize>>,
}

impl PipelineReport {
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.received.iter().map(Vec::len).sum()
    }

    /// True when every produced value was received exactly once.
    #[must_use]
    pub fn is_exactly_once(&self) -> bool {
        let mut all: Vec<usize> = self.received.iter().flatten().copied().collect();
        all.sort_unstable();
        all.len() == self.produced && all.iter().enumerate().all(|(i, &v)| i == v)
    }
}

/// Producer `p` puts `p * items_per_producer + i` for each `i`. Once all
/// producers finished, one stop message per consumer ends the run.
///
/// ```
/// use foundation_testing::scenarios::run_pipeline;
///
/// let report = run_pipeline(4, 4, 25, 8).unwrap();
/// assert_eq!(report.produced, 100);
/// assert!(report.is_exactly_once());
/// ```
///
/// # Errors
///
/// [`foundation_sync::SyncError::InvalidArgument`] for zero capacity.
///
/// # Panics
///
/// Re-raises a panic from any producer or consumer thread.
pub fn run_pipeline(
    producers: usize,
    consumers: usize,
    items_per_producer: usize,
    capacity: usize,
) -> SyncResult<PipelineReport> {
    let queue: Arc<BoundedQueue<Message<usize>>> = Arc::new(BoundedQueue::new(capacity)?);

    let consumer_handles: Vec<_> = (0..consumers)
        .map(|consumer_id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut received = Vec::new();
                let handled = queue.consume(|item| received.push(item));
                tracing::debug!(consumer_id, handled, "consumer stopped");
                received
            })
        })
        .collect();

    let producer_handles: Vec<_> = (0..producers)
        .map(|producer_id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..items_per_producer {
                    queue.put_item(producer_id * items_per_producer + i);
                }
            })
        })
        .collect();

    for handle in producer_handles {
        if let Err(panic) = handle.join() {
            std::panic::resume_unwind(panic);
        }
    }
    for _ in 0..consumers {
        queue.put_stop();
    }

    let mut received = Vec::with_capacity(consumers);
    for handle in consumer_handles {
        match handle.join() {
            Ok(items) => received.push(items),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    Ok(PipelineReport {
        produced: producers * items_per_producer,
        received,
    })
}
