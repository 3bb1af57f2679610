//! Bounded exponential backoff used before a thread parks.
//!
//! A waiter that is granted its resource within a few hundred cycles never
//! has to go through the condition variable at all. Once the budget is
//! spent the caller is expected to park.

use core::hint;

// Rounds of exponential spinning before `snooze` reports exhaustion.
const DEFAULT_SPIN_ROUNDS: u32 = 6;

// Rounds after which each snooze also yields the OS thread.
const YIELD_AFTER: u32 = 4;

/// Spin-then-park budget for a single wait.
///
/// Round `n` issues `2^n` spin hints; past a few rounds the
/// thread also yields its time slice.
#[derive(Debug)]
pub struct Backoff {
    round: u32,
    limit: u32,
}

impl Backoff {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::with_limit(DEFAULT_SPIN_ROUNDS)
    }

    /// Creates a backoff that allows `limit` rounds before exhaustion.
    #[inline]
    #[must_use]
    pub const fn with_limit(limit: u32) -> Self {
        Self { round: 0, limit }
    }

    /// Spins for the current round and advances to the next one.
    ///
    /// Returns `false` without spinning once the budget is exhausted; the
    /// caller should park instead of calling again.
    #[inline]
    pub fn snooze(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }

        for _ in 0..(1u32 << self.round.min(16)) {
            hint::spin_loop();
        }

        if self.round >= YIELD_AFTER {
            std::thread::yield_now();
        }

        self.round += 1;
        true
    }

    /// Number of completed rounds.
    #[inline]
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.round
    }

    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.round >= self.limit
    }

    #[inline]
    pub fn reset(&mut self) {
        self.round = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: The park decision depends on the budget running out
    /// WHAT: snooze succeeds exactly `limit` times, then reports exhaustion
    #[test]
    fn test_snooze_exhausts_after_limit() {
        let mut backoff = Backoff::with_limit(3);
        assert!(backoff.snooze());
        assert!(backoff.snooze());
        assert!(backoff.snooze());
        assert!(!backoff.snooze());
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.rounds(), 3);
    }

    /// WHY: A zero budget means park immediately
    /// WHAT: with_limit(0) is exhausted before any spin
    #[test]
    fn test_zero_limit_parks_immediately() {
        let mut backoff = Backoff::with_limit(0);
        assert!(backoff.is_exhausted());
        assert!(!backoff.snooze());
    }

    /// WHY: Backoff is reused across retries
    /// WHAT: reset restores the full budget
    #[test]
    fn test_reset_restores_budget() {
        let mut backoff = Backoff::new();
        while backoff.snooze() {}
        backoff.reset();
        assert_eq!(backoff.rounds(), 0);
        assert!(backoff.snooze());
    }
}
