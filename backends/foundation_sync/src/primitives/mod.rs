//! Coordination primitives built on [`crate::synca`].

pub mod barrier;
pub mod bounded_queue;
pub mod message;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;

pub use barrier::{Barrier, BarrierWaitResult};
pub use bounded_queue::BoundedQueue;
pub use message::Message;
pub use mutex::{Mutex, MutexGuard, RawMutex};
pub use rwlock::{RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use semaphore::{Semaphore, SemaphorePermit};
