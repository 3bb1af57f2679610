//! FIFO mutex with direct ownership handoff.
//!
//! [`RawMutex`] is the bare `acquire`/`release` pair; [`Mutex`] wraps data
//! and releases through an RAII guard so every exit path unlocks.
//!
//! `release()` never unlocks while somebody is queued: ownership moves
//! straight to the oldest waiter and the `locked` flag stays set, so a
//! caller arriving in between cannot barge ahead of the queue.
//!
//! # Examples
//!
//! ```
//! use foundation_sync::Mutex;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let balance = Arc::new(Mutex::new(100i64));
//! let handles: Vec<_> = [50, -20, 30]
//!     .into_iter()
//!     .map(|amount| {
//!         let balance = Arc::clone(&balance);
//!         thread::spawn(move || *balance.lock() += amount)
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(*balance.lock(), 160);
//! ```

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StateLock};
use std::time::{Duration, Instant};

use crate::errors::{SyncError, SyncResult};
use crate::synca::{block, lock_state, Begin, Operation, Slot, Suspended, Ticket, WaitQueue};

/// Exclusive lock without attached data.
pub struct RawMutex {
    locked: AtomicBool,
    waiters: StateLock<WaitQueue<Arc<Slot<()>>>>,
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMutex {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            waiters: StateLock::new(WaitQueue::new()),
        }
    }

    /// Takes the lock if it is free, without suspending.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Takes the lock, blocking the current thread behind earlier waiters.
    pub fn acquire(&self) {
        if self.try_acquire() {
            return;
        }
        if let Begin::Queued(_, slot) = self.lock_or_enqueue() {
            slot.wait();
        }
    }

    /// Takes the lock unless `timeout` elapses first.
    ///
    /// # Errors
    ///
    /// [`SyncError::Timeout`] if the lock was not handed over in time; the
    /// caller's place in the queue is given up and the lock is not held.
    pub fn acquire_timeout(&self, timeout: Duration) -> SyncResult<()> {
        if self.try_acquire() {
            return Ok(());
        }
        block(&mut AcquireLock(self), Some(Instant::now() + timeout))
    }

    /// Takes the lock from an async task.
    ///
    /// Dropping the future before it completes gives up the caller's place;
    /// if ownership had already been handed over it is passed on.
    pub fn acquire_async(&self) -> impl Future<Output = ()> + '_ {
        Suspended::new(AcquireLock(self))
    }

    /// Releases the lock, handing it to the oldest waiter if there is one.
    ///
    /// # Errors
    ///
    /// [`SyncError::IllegalState`] when the mutex is not locked. The call
    /// then has no effect.
    pub fn release(&self) -> SyncResult<()> {
        let mut waiters = lock_state(&self.waiters);
        if let Some(next) = waiters.dequeue_one() {
            tracing::trace!(remaining = waiters.len(), "mutex ownership handed off");
            next.grant(());
            return Ok(());
        }

        if self.locked.swap(false, Ordering::Release) {
            Ok(())
        } else {
            Err(SyncError::IllegalState("release of an unlocked mutex"))
        }
    }

    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Number of callers queued for the lock.
    #[must_use]
    pub fn waiting(&self) -> usize {
        lock_state(&self.waiters).len()
    }

    fn lock_or_enqueue(&self) -> Begin<(), ()> {
        let mut waiters = lock_state(&self.waiters);
        if self.try_acquire() {
            return Begin::Ready(());
        }
        let slot = Arc::new(Slot::new());
        let ticket = waiters.enqueue(Arc::clone(&slot));
        Begin::Queued(ticket, slot)
    }
}

impl fmt::Debug for RawMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMutex")
            .field("locked", &self.is_locked())
            .field("waiting", &self.waiting())
            .finish()
    }
}

struct AcquireLock<'a>(&'a RawMutex);

impl Operation for AcquireLock<'_> {
    type Output = ();
    type Grant = ();

    fn begin(&mut self) -> Begin<(), ()> {
        self.0.lock_or_enqueue()
    }

    fn withdraw(&mut self, ticket: Ticket) -> bool {
        lock_state(&self.0.waiters).remove(ticket).is_some()
    }

    fn finish(&mut self, (): ()) {}

    fn abandon(&mut self, (): ()) {
        if let Err(err) = self.0.release() {
            tracing::warn!(%err, "passing on abandoned mutex ownership failed");
        }
    }
}

/// A FIFO mutual exclusion lock protecting a value of type `T`.
pub struct Mutex<T: ?Sized> {
    raw: RawMutex,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

/// RAII guard for [`Mutex`]; releases the lock when dropped.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized + 'a> {
    mutex: &'a Mutex<T>,
}

unsafe impl<T: ?Sized + Sync> Sync for MutexGuard<'_, T> {}

impl<T> Mutex<T> {
    pub const fn new(data: T) -> Self {
        Self {
            raw: RawMutex::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Locks the mutex, blocking the current thread behind earlier waiters.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.raw.acquire();
        MutexGuard { mutex: self }
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        // Lazily: a guard built on failure would release on drop.
        self.raw.try_acquire().then(|| MutexGuard { mutex: self })
    }

    /// Locks the mutex unless `timeout` elapses first.
    ///
    /// # Errors
    ///
    /// [`SyncError::Timeout`] if the lock was not handed over in time.
    pub fn lock_timeout(&self, timeout: Duration) -> SyncResult<MutexGuard<'_, T>> {
        self.raw.acquire_timeout(timeout)?;
        Ok(MutexGuard { mutex: self })
    }

    /// Locks the mutex from an async task.
    pub async fn lock_async(&self) -> MutexGuard<'_, T> {
        self.raw.acquire_async().await;
        MutexGuard { mutex: self }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    #[must_use]
    pub fn waiting(&self) -> usize {
        self.raw.waiting()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.field("waiting", &self.waiting());
        d.finish_non_exhaustive()
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.mutex.raw.release() {
            tracing::warn!(%err, "mutex guard released an unlocked mutex");
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tracing_test::traced_test;

    /// WHY: The uncontended path must not suspend
    /// WHAT: acquire on a free mutex locks it immediately and release unlocks it
    #[test]
    fn test_acquire_release_fast_path() {
        let mutex = RawMutex::new();
        mutex.acquire();
        assert!(mutex.is_locked());
        assert_eq!(mutex.release(), Ok(()));
        assert!(!mutex.is_locked());
    }

    /// WHY: Releasing without holding is a caller bug
    /// WHAT: release on an unlocked mutex fails with IllegalState and changes nothing
    #[test]
    fn test_release_unlocked_is_illegal_state() {
        let mutex = RawMutex::new();
        assert!(matches!(mutex.release(), Err(SyncError::IllegalState(_))));
        assert!(!mutex.is_locked());
        assert!(mutex.try_acquire());
    }

    /// WHY: Double release must be reported, not absorbed
    /// WHAT: the second release of a single acquisition fails
    #[test]
    fn test_double_release_is_illegal_state() {
        let mutex = RawMutex::new();
        mutex.acquire();
        assert_eq!(mutex.release(), Ok(()));
        assert!(matches!(mutex.release(), Err(SyncError::IllegalState(_))));
    }

    /// WHY: try_acquire never suspends
    /// WHAT: try_acquire fails while the mutex is held
    #[test]
    fn test_try_acquire_fails_when_locked() {
        let mutex = RawMutex::new();
        assert!(mutex.try_acquire());
        assert!(!mutex.try_acquire());
    }

    /// WHY: Timed acquisition must give up cleanly
    /// WHAT: acquire_timeout on a held mutex fails and leaves no queued token
    #[test]
    #[traced_test]
    #[ntest::timeout(5000)]
    fn test_acquire_timeout_leaves_no_waiter() {
        let mutex = RawMutex::new();
        mutex.acquire();

        let result = mutex.acquire_timeout(Duration::from_millis(20));
        assert_eq!(result, Err(SyncError::Timeout));
        assert_eq!(mutex.waiting(), 0);
        assert!(mutex.is_locked());
        assert!(logs_contain("waiter withdrawn after deadline"));
    }

    /// WHY: Release must hand ownership over rather than unlock
    /// WHAT: with a queued waiter, the flag stays locked across release and no one can barge
    #[test]
    #[ntest::timeout(5000)]
    fn test_release_hands_off_without_unlocking() {
        let mutex = Arc::new(RawMutex::new());
        mutex.acquire();

        let waiter = {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || {
                mutex.acquire();
                mutex.release().expect("waiter holds the lock");
            })
        };

        while mutex.waiting() == 0 {
            thread::yield_now();
        }

        mutex.release().expect("main holds the lock");
        assert!(
            !mutex.try_acquire() || mutex.waiting() == 0,
            "a barging caller must not take a lock that was handed off"
        );
        waiter.join().expect("waiter finished");
    }

    /// WHY: The guard is the release discipline
    /// WHAT: dropping a guard unlocks, even when unwinding out of a panic
    #[test]
    fn test_guard_releases_on_panic() {
        let mutex = Arc::new(Mutex::new(0u32));
        let cloned = Arc::clone(&mutex);
        let outcome = thread::spawn(move || {
            let mut guard = cloned.lock();
            *guard += 1;
            panic!("critical section failed");
        })
        .join();

        assert!(outcome.is_err());
        assert!(!mutex.is_locked());
        assert_eq!(*mutex.lock(), 1);
    }

    /// WHY: Data access goes through the guard
    /// WHAT: try_lock, get_mut and into_inner expose the protected value
    #[test]
    fn test_mutex_data_access() {
        let mut mutex = Mutex::new(vec![1, 2]);
        mutex.try_lock().expect("free").push(3);
        mutex.get_mut().push(4);
        assert_eq!(mutex.into_inner(), vec![1, 2, 3, 4]);
    }

    /// WHY: Debug output is used in diagnostics
    /// WHAT: Debug shows the data when free and a marker when locked
    #[test]
    fn test_debug_output() {
        let mutex = Mutex::new(5);
        assert!(format!("{mutex:?}").contains("data: 5"));
        let _guard = mutex.lock();
        assert!(format!("{mutex:?}").contains("<locked>"));
    }
}
