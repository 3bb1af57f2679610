//! Latency and throughput figures collected by
//! [`StressHarness::run_measured`](crate::stress::StressHarness::run_measured).

use core::fmt;
use core::time::Duration;

/// Operation count, elapsed time and per-operation latencies of one run.
///
/// Latencies are kept sorted so percentile queries need no copying.
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Per-operation latencies in nanoseconds, ascending.
    pub latencies: Vec<u64>,
    /// Operations per second.
    pub throughput: f64,
    pub operations: usize,
    pub duration: Duration,
}

impl Metrics {
    #[must_use]
    pub const fn new(operations: usize, duration: Duration) -> Self {
        Self {
            latencies: Vec::new(),
            throughput: 0.0,
            operations,
            duration,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn with_throughput(mut self) -> Self {
        let secs = self.duration.as_secs_f64();
        self.throughput = if secs > 0.0 {
            self.operations as f64 / secs
        } else {
            0.0
        };
        self
    }

    #[must_use]
    pub fn with_latencies(mut self, mut latencies: Vec<u64>) -> Self {
        latencies.sort_unstable();
        self.latencies = latencies;
        self
    }

    #[must_use]
    pub fn min_latency(&self) -> Option<u64> {
        self.latencies.first().copied()
    }

    #[must_use]
    pub fn max_latency(&self) -> Option<u64> {
        self.latencies.last().copied()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_latency(&self) -> Option<f64> {
        if self.latencies.is_empty() {
            return None;
        }
        let sum: u128 = self.latencies.iter().map(|&l| u128::from(l)).sum();
        Some(sum as f64 / self.latencies.len() as f64)
    }

    #[must_use]
    pub fn median_latency(&self) -> Option<u64> {
        let len = self.latencies.len();
        if len == 0 {
            return None;
        }
        let mid = len / 2;
        if len % 2 == 0 {
            Some(self.latencies[mid - 1] / 2 + self.latencies[mid] / 2)
        } else {
            Some(self.latencies[mid])
        }
    }

    #[must_use]
    pub fn p95_latency(&self) -> Option<u64> {
        self.percentile_latency(0.95)
    }

    #[must_use]
    pub fn p99_latency(&self) -> Option<u64> {
        self.percentile_latency(0.99)
    }

    /// Nearest-rank percentile; `percentile` is in `0.0..=1.0`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn percentile_latency(&self, percentile: f64) -> Option<u64> {
        if self.latencies.is_empty() || !(0.0..=1.0).contains(&percentile) {
            return None;
        }
        let rank = ((self.latencies.len() as f64) * percentile).ceil() as usize;
        Some(self.latencies[rank.saturating_sub(1).min(self.latencies.len() - 1)])
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ops in {:?} ({:.0} ops/s)",
            self.operations, self.duration, self.throughput
        )?;
        if let (Some(median), Some(p99), Some(max)) =
            (self.median_latency(), self.p99_latency(), self.max_latency())
        {
            write!(f, ", latency median {median}ns p99 {p99}ns max {max}ns")?;
        }
        Ok(())
    }
}
