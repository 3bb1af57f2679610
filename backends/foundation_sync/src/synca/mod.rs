//! Suspension machinery shared by every primitive.
//!
//! - [`WaitQueue`]: FIFO of suspended callers, addressed by [`Ticket`]
//! - [`Slot`]: the resume token a suspended caller waits on, resumable
//!   from either scheduler backend (parked thread or pending future)
//! - [`Backoff`]: bounded spinning before a thread parks
//! - [`Operation`], [`block`], [`Suspended`]: one operation contract run
//!   by either the blocking or the cooperative driver

mod backoff;
mod slot;
mod suspend;
mod wait_queue;

pub use backoff::*;
pub use slot::*;
pub use suspend::*;
pub use wait_queue::*;

pub(crate) use slot::lock_state;
