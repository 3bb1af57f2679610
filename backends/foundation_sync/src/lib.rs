//! FIFO-fair coordination primitives for threads and async tasks.
//!
//! This crate provides one canonical implementation of the classic
//! coordination primitives:
//! - **[`Mutex`] / [`RawMutex`]**: exclusive lock with direct ownership handoff
//! - **[`RwLock`] / [`RawRwLock`]**: many readers or one writer, admitted in arrival order
//! - **[`Semaphore`]**: counting permits with direct permit handoff
//! - **[`Barrier`]**: cyclic rendezvous for a fixed number of parties
//! - **[`BoundedQueue`]**: producer/consumer channel with direct item handoff
//!
//! All of them share the same suspension machinery ([`synca::WaitQueue`]):
//! suspended callers wait in arrival order and are resumed explicitly by
//! the operation that grants them the resource, never by polling.
//!
//! Every suspending operation comes in three shapes that can be mixed on a
//! single instance:
//! - blocking (`acquire`, `wait`, `put`, `get`) for OS threads
//! - deadline (`*_timeout`) failing with [`SyncError::Timeout`]
//! - cooperative (`*_async`) futures for single-threaded executors
//!
//! # Examples
//!
//! ```rust
//! use foundation_sync::{BoundedQueue, Mutex};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let counter = Arc::new(Mutex::new(0usize));
//! let queue = Arc::new(BoundedQueue::new(4).expect("capacity is valid"));
//!
//! let producer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         for item in 0..10 {
//!             queue.put(item);
//!         }
//!     })
//! };
//!
//! for _ in 0..10 {
//!     let item = queue.get();
//!     *counter.lock() += item;
//! }
//!
//! producer.join().expect("producer finished");
//! assert_eq!(*counter.lock(), 45);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod errors;
pub mod primitives;
pub mod synca;

pub use config::{BarrierConfig, ConfigError, QueueConfig, SemaphoreConfig, SyncConfig};
pub use errors::{Rejected, SyncError, SyncResult};
pub use primitives::{
    Barrier, BarrierWaitResult, BoundedQueue, Message, Mutex, MutexGuard, RawMutex, RawRwLock,
    RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit,
};
