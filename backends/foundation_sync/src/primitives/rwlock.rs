//! FIFO reader-writer lock.
//!
//! Any number of readers, or a single writer, may hold the lock. Callers
//! are admitted strictly in arrival order: once anybody is queued, new
//! arrivals queue behind them, so a writer waiting for readers to leave
//! is never starved by readers that came after it. When the lock frees
//! up, the head of the queue is admitted together with every reader
//! directly behind it, up to the next writer.
//!
//! # Examples
//!
//! ```
//! use foundation_sync::RwLock;
//!
//! let config = RwLock::new(vec![String::from("alpha")]);
//! {
//!     let first = config.read();
//!     let second = config.read();
//!     assert_eq!(first.len(), second.len());
//!     assert!(config.try_write().is_none());
//! }
//! config.write().push(String::from("beta"));
//! assert_eq!(config.readers(), 0);
//! assert_eq!(config.read().len(), 2);
//! ```

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use std::future::Future;
use std::sync::{Arc, Mutex as StateLock};
use std::time::{Duration, Instant};

use crate::errors::{SyncError, SyncResult};
use crate::synca::{block, lock_state, Begin, Operation, Slot, Suspended, Ticket, WaitQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

struct Waiter {
    access: Access,
    slot: Arc<Slot<()>>,
}

struct LockState {
    readers: usize,
    writer: bool,
    waiters: WaitQueue<Waiter>,
}

impl LockState {
    fn is_free_for(&self, access: Access) -> bool {
        match access {
            Access::Read => !self.writer,
            Access::Write => !self.writer && self.readers == 0,
        }
    }

    fn hold(&mut self, access: Access) {
        match access {
            Access::Read => self.readers += 1,
            Access::Write => self.writer = true,
        }
    }

    /// Admits queued callers from the head while the lock allows it.
    fn admit_waiters(&mut self) {
        while let Some(access) = self.waiters.front().map(|waiter| waiter.access) {
            if !self.is_free_for(access) {
                break;
            }
            let Some(waiter) = self.waiters.dequeue_one() else {
                break;
            };
            self.hold(access);
            tracing::trace!(?access, readers = self.readers, "rwlock handed to waiter");
            waiter.slot.grant(());
        }
    }
}

/// Reader-writer lock without attached data.
pub struct RawRwLock {
    state: StateLock<LockState>,
}

impl Default for RawRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawRwLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: StateLock::new(LockState {
                readers: 0,
                writer: false,
                waiters: WaitQueue::new(),
            }),
        }
    }

    /// Takes shared access if no writer holds the lock and nobody is queued.
    pub fn try_read(&self) -> bool {
        self.try_hold(Access::Read)
    }

    /// Takes exclusive access if the lock is idle and nobody is queued.
    pub fn try_write(&self) -> bool {
        self.try_hold(Access::Write)
    }

    /// Takes shared access, blocking behind earlier waiters.
    pub fn read(&self) {
        self.hold_blocking(Access::Read);
    }

    /// Takes exclusive access, blocking behind earlier waiters.
    pub fn write(&self) {
        self.hold_blocking(Access::Write);
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] if shared access was not granted in time.
    pub fn read_timeout(&self, timeout: Duration) -> SyncResult<()> {
        block(
            &mut AcquireAccess::new(self, Access::Read),
            Some(Instant::now() + timeout),
        )
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] if exclusive access was not granted in time;
    /// readers queued behind the caller may be admitted as a result.
    pub fn write_timeout(&self, timeout: Duration) -> SyncResult<()> {
        block(
            &mut AcquireAccess::new(self, Access::Write),
            Some(Instant::now() + timeout),
        )
    }

    pub fn read_async(&self) -> impl Future<Output = ()> + '_ {
        Suspended::new(AcquireAccess::new(self, Access::Read))
    }

    /// Takes exclusive access from an async task. Dropping the future
    /// gives up its place; access that was already granted is passed on.
    pub fn write_async(&self) -> impl Future<Output = ()> + '_ {
        Suspended::new(AcquireAccess::new(self, Access::Write))
    }

    /// Gives up one shared hold.
    ///
    /// # Errors
    ///
    /// [`SyncError::IllegalState`] when no reader holds the lock.
    pub fn release_read(&self) -> SyncResult<()> {
        let mut state = lock_state(&self.state);
        if state.readers == 0 {
            return Err(SyncError::IllegalState("release_read without a reader"));
        }
        state.readers -= 1;
        if state.readers == 0 {
            state.admit_waiters();
        }
        Ok(())
    }

    /// Gives up the exclusive hold.
    ///
    /// # Errors
    ///
    /// [`SyncError::IllegalState`] when no writer holds the lock.
    pub fn release_write(&self) -> SyncResult<()> {
        let mut state = lock_state(&self.state);
        if !state.writer {
            return Err(SyncError::IllegalState("release_write without a writer"));
        }
        state.writer = false;
        state.admit_waiters();
        Ok(())
    }

    /// Number of readers currently holding the lock.
    #[must_use]
    pub fn readers(&self) -> usize {
        lock_state(&self.state).readers
    }

    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        lock_state(&self.state).writer
    }

    #[must_use]
    pub fn waiting(&self) -> usize {
        lock_state(&self.state).waiters.len()
    }

    fn try_hold(&self, access: Access) -> bool {
        let mut state = lock_state(&self.state);
        let admitted = state.waiters.is_empty() && state.is_free_for(access);
        if admitted {
            state.hold(access);
        }
        admitted
    }

    fn hold_blocking(&self, access: Access) {
        if let Begin::Queued(_, slot) = self.hold_or_enqueue(access) {
            slot.wait();
        }
    }

    fn hold_or_enqueue(&self, access: Access) -> Begin<(), ()> {
        let mut state = lock_state(&self.state);
        if state.waiters.is_empty() && state.is_free_for(access) {
            state.hold(access);
            return Begin::Ready(());
        }

        let slot = Arc::new(Slot::new());
        let ticket = state.waiters.enqueue(Waiter {
            access,
            slot: Arc::clone(&slot),
        });
        tracing::trace!(?ticket, ?access, "rwlock busy, caller queued");
        Begin::Queued(ticket, slot)
    }

    fn release(&self, access: Access) -> SyncResult<()> {
        match access {
            Access::Read => self.release_read(),
            Access::Write => self.release_write(),
        }
    }
}

impl fmt::Debug for RawRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.state);
        f.debug_struct("RawRwLock")
            .field("readers", &state.readers)
            .field("writer", &state.writer)
            .field("waiting", &state.waiters.len())
            .finish()
    }
}

struct AcquireAccess<'a> {
    lock: &'a RawRwLock,
    access: Access,
}

impl<'a> AcquireAccess<'a> {
    fn new(lock: &'a RawRwLock, access: Access) -> Self {
        Self { lock, access }
    }
}

impl Operation for AcquireAccess<'_> {
    type Output = ();
    type Grant = ();

    fn begin(&mut self) -> Begin<(), ()> {
        self.lock.hold_or_enqueue(self.access)
    }

    // A withdrawn head writer may have been the only thing holding back
    // the readers behind it.
    fn withdraw(&mut self, ticket: Ticket) -> bool {
        let mut state = lock_state(&self.lock.state);
        let removed = state.waiters.remove(ticket).is_some();
        if removed {
            state.admit_waiters();
        }
        removed
    }

    fn finish(&mut self, (): ()) {}

    fn abandon(&mut self, (): ()) {
        if let Err(err) = self.lock.release(self.access) {
            tracing::warn!(%err, access = ?self.access, "passing on abandoned rwlock access failed");
        }
    }
}

/// A FIFO reader-writer lock protecting a value of type `T`.
pub struct RwLock<T: ?Sized> {
    raw: RawRwLock,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for RwLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwLock<T> {}

/// Shared access to an [`RwLock`]; released on drop.
#[must_use = "if unused the RwLock will immediately release the read hold"]
pub struct RwLockReadGuard<'a, T: ?Sized + 'a> {
    lock: &'a RwLock<T>,
}

unsafe impl<T: ?Sized + Sync> Sync for RwLockReadGuard<'_, T> {}

/// Exclusive access to an [`RwLock`]; released on drop.
#[must_use = "if unused the RwLock will immediately release the write hold"]
pub struct RwLockWriteGuard<'a, T: ?Sized + 'a> {
    lock: &'a RwLock<T>,
}

unsafe impl<T: ?Sized + Sync> Sync for RwLockWriteGuard<'_, T> {}

impl<T> RwLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            raw: RawRwLock::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> RwLock<T> {
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.raw.read();
        RwLockReadGuard { lock: self }
    }

    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.raw.try_read().then(|| RwLockReadGuard { lock: self })
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] if shared access was not granted in time.
    pub fn read_timeout(&self, timeout: Duration) -> SyncResult<RwLockReadGuard<'_, T>> {
        self.raw.read_timeout(timeout)?;
        Ok(RwLockReadGuard { lock: self })
    }

    pub async fn read_async(&self) -> RwLockReadGuard<'_, T> {
        self.raw.read_async().await;
        RwLockReadGuard { lock: self }
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.raw.write();
        RwLockWriteGuard { lock: self }
    }

    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        self.raw.try_write().then(|| RwLockWriteGuard { lock: self })
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] if exclusive access was not granted in time.
    pub fn write_timeout(&self, timeout: Duration) -> SyncResult<RwLockWriteGuard<'_, T>> {
        self.raw.write_timeout(timeout)?;
        Ok(RwLockWriteGuard { lock: self })
    }

    pub async fn write_async(&self) -> RwLockWriteGuard<'_, T> {
        self.raw.write_async().await;
        RwLockWriteGuard { lock: self }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    #[must_use]
    pub fn readers(&self) -> usize {
        self.raw.readers()
    }

    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        self.raw.is_write_locked()
    }

    #[must_use]
    pub fn waiting(&self) -> usize {
        self.raw.waiting()
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("RwLock");
        match self.try_read() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.field("waiting", &self.waiting());
        d.finish_non_exhaustive()
    }
}

impl<T: ?Sized> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: no writer can hold the lock while a read guard exists.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.raw.release_read() {
            tracing::warn!(%err, "read guard released an idle rwlock");
        }
    }
}

impl<T: ?Sized> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves exclusive access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves exclusive access.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.raw.release_write() {
            tracing::warn!(%err, "write guard released an idle rwlock");
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwLockReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwLockWriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
