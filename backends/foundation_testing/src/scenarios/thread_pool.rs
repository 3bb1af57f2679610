//! Fixed-size thread pool fed through a [`BoundedQueue`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use foundation_sync::{BoundedQueue, Message, SyncResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Jobs wait in a bounded queue, so `execute` applies backpressure once
/// `capacity` jobs are pending. Dropping the pool stops the workers after
/// the queued jobs ran.
///
/// ```
/// use foundation_testing::scenarios::ThreadPool;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = ThreadPool::new(4, 8).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..10 {
///     let counter = Arc::clone(&counter);
///     pool.execute(move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///     });
/// }
///
/// pool.wait_idle();
/// assert_eq!(counter.load(Ordering::Relaxed), 10);
/// ```
pub struct ThreadPool {
    queue: Arc<BoundedQueue<Message<Job>>>,
    workers: Vec<thread::JoinHandle<usize>>,
}

impl ThreadPool {
    /// # Errors
    ///
    /// [`foundation_sync::SyncError::InvalidArgument`] for zero capacity.
    pub fn new(size: usize, capacity: usize) -> SyncResult<Self> {
        let queue: Arc<BoundedQueue<Message<Job>>> = Arc::new(BoundedQueue::new(capacity)?);
        let workers = (0..size)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    queue.consume(|job| {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::warn!(worker_id, "job panicked");
                        }
                    })
                })
            })
            .collect();

        Ok(Self { queue, workers })
    }

    /// Queues `job`, blocking while the queue is full.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.put_item(Box::new(job));
    }

    /// Blocks until every job queued so far has run.
    pub fn wait_idle(&self) {
        self.queue.join();
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stops the workers once the queue drains and returns how many jobs
    /// they ran in total.
    #[must_use]
    pub fn shutdown(mut self) -> usize {
        self.stop_workers()
    }

    fn stop_workers(&mut self) -> usize {
        for _ in 0..self.workers.len() {
            self.queue.put_stop();
        }

        let mut executed = 0;
        for worker in self.workers.drain(..) {
            match worker.join() {
                Ok(count) => executed += count,
                Err(_) => tracing::warn!("pool worker terminated abnormally"),
            }
        }
        executed
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop_workers();
    }
}
