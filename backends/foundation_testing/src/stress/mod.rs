//! Stress harness for the coordination primitives.
//!
//! Workers are released together through a [`foundation_sync::Barrier`]
//! start gate so that contention begins at the same instant for all of
//! them, then run the operation until they exhaust their iterations or
//! the configured duration passes.

use core::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use foundation_sync::{Barrier, SyncResult};

use crate::metrics::Metrics;

pub mod config;
pub mod sync;

pub use config::StressConfig;

/// Outcome counts of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    pub successes: usize,
    pub failures: usize,
    /// Time from the start gate opening until the last worker finished.
    pub duration: Duration,
    pub thread_count: usize,
}

impl StressResult {
    #[must_use]
    pub const fn new(
        successes: usize,
        failures: usize,
        duration: Duration,
        thread_count: usize,
    ) -> Self {
        Self {
            successes,
            failures,
            duration,
            thread_count,
        }
    }

    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.successes + self.failures
    }

    /// Between 0.0 and 1.0; zero for an empty run.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_operations() == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_operations() as f64
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn operations_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_operations() as f64 / secs
        }
    }
}

pub struct StressHarness {
    config: StressConfig,
}

impl StressHarness {
    #[must_use]
    pub const fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Runs `operation(thread_id, iteration)` on every worker; `true`
    /// counts as a success.
    ///
    /// # Examples
    ///
    /// ```
    /// use foundation_sync::Mutex;
    /// use foundation_testing::stress::{StressConfig, StressHarness};
    /// use std::sync::Arc;
    ///
    /// let total = Arc::new(Mutex::new(0usize));
    /// let harness = StressHarness::new(StressConfig::new().threads(4).iterations(100));
    ///
    /// let shared = Arc::clone(&total);
    /// let result = harness
    ///     .run(move |_thread_id, _iteration| {
    ///         *shared.lock() += 1;
    ///         true
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(*total.lock(), 400);
    /// assert_eq!(result.successes, 400);
    /// ```
    ///
    /// # Errors
    ///
    /// [`foundation_sync::SyncError::InvalidArgument`] for a configuration
    /// without threads.
    ///
    /// # Panics
    ///
    /// Re-raises the panic of any worker, so assertions inside the
    /// operation fail the caller.
    pub fn run<F>(self, operation: F) -> SyncResult<StressResult>
    where
        F: Fn(usize, usize) -> bool + Send + Sync + 'static,
    {
        let (result, _) = self.execute(operation, false)?;
        Ok(result)
    }

    /// Like [`StressHarness::run`], additionally timing every operation.
    ///
    /// # Errors
    ///
    /// As [`StressHarness::run`].
    ///
    /// # Panics
    ///
    /// As [`StressHarness::run`].
    pub fn run_measured<F>(self, operation: F) -> SyncResult<(StressResult, Metrics)>
    where
        F: Fn(usize, usize) -> bool + Send + Sync + 'static,
    {
        let (result, latencies) = self.execute(operation, true)?;
        let metrics = Metrics::new(result.total_operations(), result.duration)
            .with_throughput()
            .with_latencies(latencies);
        Ok((result, metrics))
    }

    fn execute<F>(&self, operation: F, measure: bool) -> SyncResult<(StressResult, Vec<u64>)>
    where
        F: Fn(usize, usize) -> bool + Send + Sync + 'static,
    {
        self.config.validate()?;
        let thread_count = self.config.get_thread_count();
        let iterations = self.config.get_iterations();
        let time_limit = self.config.get_duration();

        let operation = Arc::new(operation);
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let start_gate = Arc::new(Barrier::new(thread_count + 1)?);

        tracing::debug!(thread_count, iterations, ?time_limit, "stress run starting");

        let mut handles = Vec::with_capacity(thread_count);
        for thread_id in 0..thread_count {
            let operation = Arc::clone(&operation);
            let successes = Arc::clone(&successes);
            let failures = Arc::clone(&failures);
            let start_gate = Arc::clone(&start_gate);

            handles.push(thread::spawn(move || {
                let mut latencies = Vec::new();
                if let Err(err) = start_gate.wait() {
                    tracing::warn!(%err, thread_id, "start gate broken, worker exits");
                    return latencies;
                }

                let deadline = time_limit.map(|limit| Instant::now() + limit);
                for iteration in 0..iterations {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        break;
                    }

                    let started = measure.then(Instant::now);
                    let succeeded = operation(thread_id, iteration);
                    if let Some(started) = started {
                        latencies.push(
                            u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX),
                        );
                    }

                    if succeeded {
                        successes.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
                latencies
            }));
        }

        start_gate.wait()?;
        let start = Instant::now();

        let mut latencies = Vec::new();
        for handle in handles {
            match handle.join() {
                Ok(mut worker_latencies) => latencies.append(&mut worker_latencies),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }

        let result = StressResult::new(
            successes.load(Ordering::Relaxed),
            failures.load(Ordering::Relaxed),
            start.elapsed(),
            thread_count,
        );
        tracing::debug!(
            successes = result.successes,
            failures = result.failures,
            elapsed = ?result.duration,
            "stress run finished"
        );
        Ok((result, latencies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: Every planned iteration must run when there is no time limit
    /// WHAT: successes and failures add up to threads x iterations
    #[test]
    #[ntest::timeout(10000)]
    fn test_run_counts_every_iteration() {
        let harness = StressHarness::new(StressConfig::new().threads(3).iterations(50));
        let result = harness
            .run(|thread_id, iteration| (thread_id + iteration) % 5 != 0)
            .expect("valid config");

        assert_eq!(result.total_operations(), 150);
        assert_eq!(result.failures, 30);
        assert_eq!(result.thread_count, 3);
    }

    /// WHY: Duration-capped runs must stop between iterations
    /// WHAT: a 30ms cap ends a run long before its planned iterations
    #[test]
    #[ntest::timeout(10000)]
    fn test_duration_limit_stops_early() {
        let config = StressConfig::new()
            .threads(2)
            .iterations(100_000)
            .duration(Duration::from_millis(30));
        let result = StressHarness::new(config)
            .run(|_, _| {
                thread::sleep(Duration::from_millis(1));
                true
            })
            .expect("valid config");

        assert!(result.total_operations() > 0);
        assert!(result.total_operations() < config.planned_operations());
    }

    /// WHY: Latency collection feeds the metrics report
    /// WHAT: run_measured records one latency per operation
    #[test]
    #[ntest::timeout(10000)]
    fn test_run_measured_records_latencies() {
        let harness = StressHarness::new(StressConfig::new().threads(2).iterations(25));
        let (result, metrics) = harness.run_measured(|_, _| true).expect("valid config");

        assert_eq!(result.successes, 50);
        assert_eq!(metrics.latencies.len(), 50);
        assert_eq!(metrics.operations, 50);
        assert!(metrics.p99_latency().is_some());
    }

    /// WHY: Configuration errors must not spawn anything
    /// WHAT: zero threads is rejected up front
    #[test]
    fn test_zero_threads_rejected() {
        let harness = StressHarness::new(StressConfig::new().threads(0));
        assert!(harness.run(|_, _| true).is_err());
    }
}
