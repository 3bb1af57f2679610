//! Counting semaphore with FIFO permit handoff.
//!
//! A released permit goes straight to the oldest queued waiter instead of
//! back into the pool, so a caller arriving in between can never steal it.
//! The count is therefore only ever positive while the queue is empty,
//! which is what keeps the lock-free [`Semaphore::try_acquire`] fair.

use core::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StateLock};
use std::time::{Duration, Instant};

use crate::errors::{SyncError, SyncResult};
use crate::synca::{block, lock_state, Begin, Operation, Slot, Suspended, Ticket, WaitQueue};

pub struct Semaphore {
    permits: AtomicUsize,
    max_permits: usize,
    waiters: StateLock<WaitQueue<Arc<Slot<()>>>>,
}

impl Semaphore {
    /// Creates a semaphore holding all `max_permits` permits.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] when `max_permits` is zero.
    pub fn new(max_permits: usize) -> SyncResult<Self> {
        Self::with_available(max_permits, max_permits)
    }

    /// Creates a semaphore with only `available` of its `max_permits`
    /// permits in the pool; the rest are considered held.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] when `max_permits` is zero or
    /// `available` exceeds it.
    pub fn with_available(available: usize, max_permits: usize) -> SyncResult<Self> {
        if max_permits == 0 {
            return Err(SyncError::InvalidArgument("max_permits must be at least 1"));
        }
        if available > max_permits {
            return Err(SyncError::InvalidArgument(
                "available permits exceed max_permits",
            ));
        }
        Ok(Self {
            permits: AtomicUsize::new(available),
            max_permits,
            waiters: StateLock::new(WaitQueue::new()),
        })
    }

    /// Takes a permit if one is in the pool.
    pub fn try_acquire(&self) -> bool {
        self.permits
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Takes a permit, blocking the current thread behind earlier waiters.
    pub fn acquire(&self) {
        if self.try_acquire() {
            return;
        }
        if let Begin::Queued(_, slot) = self.take_or_enqueue() {
            slot.wait();
        }
    }

    /// Takes a permit unless `timeout` elapses first.
    ///
    /// # Errors
    ///
    /// [`SyncError::Timeout`] when no permit was handed over in time. The
    /// caller's place in the queue is removed and no permit is held.
    pub fn acquire_timeout(&self, timeout: Duration) -> SyncResult<()> {
        if self.try_acquire() {
            return Ok(());
        }
        block(&mut AcquirePermit(self), Some(Instant::now() + timeout))
    }

    /// Takes a permit from an async task; dropping the future cancels.
    pub fn acquire_async(&self) -> impl Future<Output = ()> + '_ {
        Suspended::new(AcquirePermit(self))
    }

    /// Returns a permit, handing it to the oldest waiter if there is one.
    ///
    /// # Errors
    ///
    /// [`SyncError::PermitOverflow`] when the pool is already full. The
    /// count is left unchanged rather than clamped.
    pub fn release(&self) -> SyncResult<()> {
        let mut waiters = lock_state(&self.waiters);
        if let Some(next) = waiters.dequeue_one() {
            tracing::trace!(remaining = waiters.len(), "permit handed off");
            next.grant(());
            return Ok(());
        }

        let max = self.max_permits;
        self.permits
            .fetch_update(Ordering::Release, Ordering::Relaxed, |n| {
                (n < max).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| SyncError::PermitOverflow)
    }

    /// Takes a permit returned to the pool when the guard drops.
    pub fn permit(&self) -> SemaphorePermit<'_> {
        self.acquire();
        SemaphorePermit { semaphore: self }
    }

    pub fn try_permit(&self) -> Option<SemaphorePermit<'_>> {
        self.try_acquire()
            .then(|| SemaphorePermit { semaphore: self })
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] when no permit was handed over in time.
    pub fn permit_timeout(&self, timeout: Duration) -> SyncResult<SemaphorePermit<'_>> {
        self.acquire_timeout(timeout)?;
        Ok(SemaphorePermit { semaphore: self })
    }

    pub async fn permit_async(&self) -> SemaphorePermit<'_> {
        self.acquire_async().await;
        SemaphorePermit { semaphore: self }
    }

    /// Permits currently in the pool.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    #[must_use]
    pub fn waiting(&self) -> usize {
        lock_state(&self.waiters).len()
    }

    fn take_or_enqueue(&self) -> Begin<(), ()> {
        let mut waiters = lock_state(&self.waiters);
        if self.try_acquire() {
            return Begin::Ready(());
        }
        let slot = Arc::new(Slot::new());
        let ticket = waiters.enqueue(Arc::clone(&slot));
        Begin::Queued(ticket, slot)
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("available", &self.available())
            .field("max_permits", &self.max_permits)
            .field("waiting", &self.waiting())
            .finish()
    }
}

struct AcquirePermit<'a>(&'a Semaphore);

impl Operation for AcquirePermit<'_> {
    type Output = ();
    type Grant = ();

    fn begin(&mut self) -> Begin<(), ()> {
        self.0.take_or_enqueue()
    }

    fn withdraw(&mut self, ticket: Ticket) -> bool {
        lock_state(&self.0.waiters).remove(ticket).is_some()
    }

    fn finish(&mut self, (): ()) {}

    fn abandon(&mut self, (): ()) {
        if let Err(err) = self.0.release() {
            tracing::warn!(%err, "returning abandoned permit failed");
        }
    }
}

/// RAII permit; returns itself to the [`Semaphore`] on drop.
#[must_use = "if unused the permit is released immediately"]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl SemaphorePermit<'_> {
    /// Keeps the permit out of the pool for good.
    pub fn forget(self) {
        core::mem::forget(self);
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.semaphore.release() {
            tracing::warn!(%err, "permit drop overflowed the semaphore");
        }
    }
}

impl fmt::Debug for SemaphorePermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemaphorePermit").finish_non_exhaustive()
    }
}
