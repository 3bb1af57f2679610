//! Cyclic rendezvous for a fixed number of parties.
//!
//! The last party to arrive trips the barrier: it resets the arrival count,
//! advances the generation and releases everybody queued, all under one
//! lock so no waiter can observe a half-released round. Waiters are
//! released with the generation they arrived in, so a round can never be
//! released by a different round's completion.
//!
//! A party that gives up (deadline or dropped future) withdraws its
//! arrival; the others keep waiting for a replacement. Only [`Barrier::abort`]
//! and [`Barrier::reset`] break the barrier.
//!
//! # Examples
//!
//! ```
//! use foundation_sync::Barrier;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let barrier = Arc::new(Barrier::new(3).unwrap());
//! let handles: Vec<_> = (0..3)
//!     .map(|_| {
//!         let barrier = Arc::clone(&barrier);
//!         thread::spawn(move || barrier.wait().unwrap().is_leader)
//!     })
//!     .collect();
//!
//! let leaders = handles
//!     .into_iter()
//!     .map(|h| h.join().unwrap())
//!     .filter(|is_leader| *is_leader)
//!     .count();
//! assert_eq!(leaders, 1);
//! assert_eq!(barrier.generation(), 1);
//! ```

use core::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex as StateLock};
use std::time::{Duration, Instant};

use crate::errors::{SyncError, SyncResult};
use crate::synca::{block, lock_state, Begin, Operation, Slot, Suspended, Ticket, WaitQueue};

/// Returned by every successful [`Barrier::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    /// Set for exactly one party per generation: the one whose arrival
    /// tripped the barrier.
    pub is_leader: bool,
    /// Generation the party arrived in, counting from zero.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy)]
enum Trip {
    Released { generation: u64 },
    Broken,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: bool,
    waiters: WaitQueue<Arc<Slot<Trip>>>,
}

impl BarrierState {
    fn release_all(&mut self, trip: Trip) -> usize {
        let waiters = self.waiters.dequeue_all();
        let released = waiters.len();
        for slot in waiters {
            slot.grant(trip);
        }
        released
    }
}

pub struct Barrier {
    parties: usize,
    state: StateLock<BarrierState>,
}

impl Barrier {
    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] when `parties` is zero.
    pub fn new(parties: usize) -> SyncResult<Self> {
        if parties == 0 {
            return Err(SyncError::InvalidArgument("parties must be at least 1"));
        }
        Ok(Self {
            parties,
            state: StateLock::new(BarrierState {
                arrived: 0,
                generation: 0,
                broken: false,
                waiters: WaitQueue::new(),
            }),
        })
    }

    /// Arrives and blocks the current thread until every party has arrived.
    ///
    /// # Errors
    ///
    /// [`SyncError::BrokenBarrier`] if the barrier is, or becomes, broken
    /// by [`Barrier::abort`] or [`Barrier::reset`] while waiting.
    pub fn wait(&self) -> SyncResult<BarrierWaitResult> {
        block(&mut Arrive(self), None)?
    }

    /// Like [`Barrier::wait`], but withdraws the arrival after `timeout`.
    ///
    /// # Errors
    ///
    /// [`SyncError::Timeout`] when the round did not complete in time; the
    /// other parties are unaffected. [`SyncError::BrokenBarrier`] as for
    /// [`Barrier::wait`].
    pub fn wait_timeout(&self, timeout: Duration) -> SyncResult<BarrierWaitResult> {
        block(&mut Arrive(self), Some(Instant::now() + timeout))?
    }

    /// Arrives from an async task. Dropping the future before the round
    /// completes withdraws the arrival.
    pub fn wait_async(&self) -> impl Future<Output = SyncResult<BarrierWaitResult>> + '_ {
        Suspended::new(Arrive(self))
    }

    /// Breaks the barrier for good: current and future waiters fail with
    /// [`SyncError::BrokenBarrier`] until [`Barrier::reset`].
    pub fn abort(&self) {
        let mut state = lock_state(&self.state);
        state.broken = true;
        state.arrived = 0;
        let released = state.release_all(Trip::Broken);
        tracing::debug!(released, "barrier aborted");
    }

    /// Fails current waiters with [`SyncError::BrokenBarrier`] and starts
    /// a fresh generation with nobody arrived.
    pub fn reset(&self) {
        let mut state = lock_state(&self.state);
        let released = state.release_all(Trip::Broken);
        state.broken = false;
        state.arrived = 0;
        state.generation += 1;
        tracing::debug!(released, generation = state.generation, "barrier reset");
    }

    #[must_use]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Parties currently waiting for the round to complete.
    #[must_use]
    pub fn n_waiting(&self) -> usize {
        lock_state(&self.state).arrived
    }

    /// Number of completed (or reset) rounds.
    #[must_use]
    pub fn generation(&self) -> u64 {
        lock_state(&self.state).generation
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        lock_state(&self.state).broken
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.state);
        f.debug_struct("Barrier")
            .field("parties", &self.parties)
            .field("arrived", &state.arrived)
            .field("generation", &state.generation)
            .field("broken", &state.broken)
            .finish()
    }
}

struct Arrive<'a>(&'a Barrier);

impl Operation for Arrive<'_> {
    type Output = SyncResult<BarrierWaitResult>;
    type Grant = Trip;

    fn begin(&mut self) -> Begin<Self::Output, Trip> {
        let barrier = self.0;
        let mut state = lock_state(&barrier.state);
        if state.broken {
            return Begin::Ready(Err(SyncError::BrokenBarrier));
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived < barrier.parties {
            let slot = Arc::new(Slot::new());
            let ticket = state.waiters.enqueue(Arc::clone(&slot));
            return Begin::Queued(ticket, slot);
        }

        state.arrived = 0;
        state.generation += 1;
        let released = state.release_all(Trip::Released { generation });
        tracing::debug!(generation, released, "barrier tripped");
        Begin::Ready(Ok(BarrierWaitResult {
            is_leader: true,
            generation,
        }))
    }

    fn withdraw(&mut self, ticket: Ticket) -> bool {
        let mut state = lock_state(&self.0.state);
        if state.waiters.remove(ticket).is_some() {
            state.arrived -= 1;
            true
        } else {
            false
        }
    }

    fn finish(&mut self, trip: Trip) -> Self::Output {
        match trip {
            Trip::Released { generation } => Ok(BarrierWaitResult {
                is_leader: false,
                generation,
            }),
            Trip::Broken => Err(SyncError::BrokenBarrier),
        }
    }

    // The round already completed without needing this party's
    // observation, so there is nothing to pass on.
    fn abandon(&mut self, _trip: Trip) {}
}
