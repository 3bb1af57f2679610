//! Resume token handed to a suspended caller.
//!
//! A [`Slot`] is what a primitive stores in its [`WaitQueue`](super::WaitQueue).
//! The primitive resumes the waiter by calling [`Slot::grant`] with the
//! resource being handed over (`()` for a lock or permit, the item for a
//! queue consumer). The waiter observes the grant through whichever
//! backend it is suspended on:
//!
//! - **preemptive**: [`Slot::park`] spins briefly, then blocks on a
//!   condition variable, re-checking the grant after every wakeup so
//!   spurious wakeups are harmless;
//! - **cooperative**: [`Slot::poll_take`] registers the task's waker and is
//!   re-polled once the grant lands.
//!
//! # Lock ordering
//!
//! Primitives call `grant` while holding their own state lock, so that a
//! waiter withdrawing its ticket under the same lock sees either "still
//! queued" or "already granted", never something in between. A waiter
//! never takes the primitive's lock while holding the slot's lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Instant;

use crate::errors::{SyncError, SyncResult};

use super::Backoff;

/// Locks an internal state mutex, recovering the guard if a previous
/// holder panicked. No user code runs while these locks are held, so the
/// protected state is consistent even after a panic elsewhere.
pub(crate) fn lock_state<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SlotState<G> {
    grant: Option<G>,
    task: Option<Waker>,
}

/// One-shot cell through which a waiter receives its grant.
pub struct Slot<G> {
    ready: AtomicBool,
    state: Mutex<SlotState<G>>,
    event: Condvar,
}

impl<G> Default for Slot<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> std::fmt::Debug for Slot<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("granted", &self.is_granted())
            .finish()
    }
}

impl<G> Slot<G> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            state: Mutex::new(SlotState {
                grant: None,
                task: None,
            }),
            event: Condvar::new(),
        }
    }

    /// Stores the grant and resumes the waiter on either backend.
    pub fn grant(&self, value: G) {
        let mut state = lock_state(&self.state);
        state.grant = Some(value);
        self.ready.store(true, Ordering::Release);
        let task = state.task.take();
        drop(state);

        self.event.notify_one();
        if let Some(waker) = task {
            waker.wake();
        }
    }

    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Takes the grant if it has landed.
    pub fn take(&self) -> Option<G> {
        if !self.is_granted() {
            return None;
        }
        let mut state = lock_state(&self.state);
        self.ready.store(false, Ordering::Relaxed);
        state.grant.take()
    }

    /// Cooperative backend: returns the grant or registers the task waker.
    pub fn poll_take(&self, cx: &mut Context<'_>) -> Poll<G> {
        let mut state = lock_state(&self.state);
        if let Some(value) = state.grant.take() {
            self.ready.store(false, Ordering::Relaxed);
            return Poll::Ready(value);
        }

        match state.task {
            Some(ref existing) if existing.will_wake(cx.waker()) => {}
            _ => state.task = Some(cx.waker().clone()),
        }
        Poll::Pending
    }

    /// Preemptive backend: blocks the current thread until the grant lands
    /// or `deadline` passes, returning `None` on expiry.
    pub fn park(&self, deadline: Option<Instant>) -> Option<G> {
        let mut backoff = Backoff::new();
        while !self.is_granted() && backoff.snooze() {}

        let mut state = lock_state(&self.state);
        loop {
            if let Some(value) = state.grant.take() {
                self.ready.store(false, Ordering::Relaxed);
                return Some(value);
            }

            state = match deadline {
                None => self
                    .event
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.event
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Parks until granted; on deadline expiry runs `withdraw`, which must
    /// remove the caller's ticket under the owning primitive's state lock
    /// and report whether it was still queued.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Timeout`] when the ticket was withdrawn before
    /// any grant. If the grant raced the deadline the grant wins.
    pub fn park_or_withdraw<F>(&self, deadline: Option<Instant>, withdraw: F) -> SyncResult<G>
    where
        F: FnOnce() -> bool,
    {
        if let Some(value) = self.park(deadline) {
            return Ok(value);
        }

        if withdraw() {
            tracing::debug!("waiter withdrawn after deadline");
            return Err(SyncError::Timeout);
        }

        // Not queued any more, so the grant was stored under the lock
        // `withdraw` just took.
        Ok(self.wait())
    }

    /// Preemptive backend without a deadline.
    pub fn wait(&self) -> G {
        loop {
            if let Some(value) = self.park(None) {
                return value;
            }
        }
    }
}
