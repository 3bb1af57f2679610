//! Stress run parameters.

use core::time::Duration;

use foundation_sync::{SyncError, SyncResult};

/// How many workers run, how often each runs the operation, and an
/// optional wall-clock cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    thread_count: usize,
    iterations: usize,
    duration: Option<Duration>,
}

impl StressConfig {
    /// Defaults to 4 threads of 1000 iterations with no time limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            thread_count: 4,
            iterations: 1000,
            duration: None,
        }
    }

    #[must_use]
    pub const fn threads(mut self, count: usize) -> Self {
        self.thread_count = count;
        self
    }

    #[must_use]
    pub const fn iterations(mut self, count: usize) -> Self {
        self.iterations = count;
        self
    }

    /// Workers stop early, between iterations, once `duration` has passed.
    #[must_use]
    pub const fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub const fn get_thread_count(&self) -> usize {
        self.thread_count
    }

    #[must_use]
    pub const fn get_iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub const fn get_duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Upper bound on operations the run can perform.
    #[must_use]
    pub const fn planned_operations(&self) -> usize {
        self.thread_count * self.iterations
    }

    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] for zero threads: the start gate
    /// needs at least one party.
    pub fn validate(&self) -> SyncResult<()> {
        if self.thread_count == 0 {
            return Err(SyncError::InvalidArgument("stress run needs at least one thread"));
        }
        Ok(())
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: Builders must compose without losing earlier settings
    /// WHAT: chained setters land in the getters and planned_operations
    #[test]
    fn test_builder_settings() {
        let config = StressConfig::new()
            .threads(3)
            .iterations(7)
            .duration(Duration::from_millis(5));
        assert_eq!(config.get_thread_count(), 3);
        assert_eq!(config.get_iterations(), 7);
        assert_eq!(config.get_duration(), Some(Duration::from_millis(5)));
        assert_eq!(config.planned_operations(), 21);
    }

    /// WHY: A run without workers cannot build its start gate
    /// WHAT: zero threads fails validation
    #[test]
    fn test_zero_threads_is_invalid() {
        assert!(StressConfig::new().threads(0).validate().is_err());
        assert!(StressConfig::default().validate().is_ok());
    }
}
