//! Producer/consumer channel with optional capacity.
//!
//! A `put` with a consumer already waiting hands the item straight to the
//! oldest one; the item never sits in the buffer where another consumer
//! could see it. Handed-over items count against capacity until the
//! consumer observes them ("in flight"), which guarantees that an item
//! whose consumer went away can go back to the head of the queue without
//! overfilling it.
//!
//! Every accepted item also opens a task. Consumers close it with
//! [`BoundedQueue::task_done`], and [`BoundedQueue::join`] waits until all
//! tasks are closed.

use core::fmt;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex as StateLock};
use std::time::{Duration, Instant};

use crate::errors::{Rejected, SyncError, SyncResult};
use crate::synca::{block, lock_state, Begin, Operation, Slot, Suspended, Ticket, WaitQueue};

struct Parked<T> {
    item: T,
    slot: Arc<Slot<()>>,
}

struct QueueState<T> {
    items: VecDeque<T>,
    in_flight: usize,
    consumers: WaitQueue<Arc<Slot<T>>>,
    producers: WaitQueue<Parked<T>>,
    unfinished: usize,
    joiners: WaitQueue<Arc<Slot<()>>>,
}

impl<T> QueueState<T> {
    fn has_room(&self, capacity: Option<usize>) -> bool {
        capacity.is_none_or(|capacity| self.items.len() + self.in_flight < capacity)
    }

    /// Accepts an item, handing it to the oldest waiting consumer if any.
    fn deliver(&mut self, item: T) {
        self.unfinished += 1;
        self.hand_over(item);
    }

    fn hand_over(&mut self, item: T) {
        match self.consumers.dequeue_one() {
            Some(consumer) => {
                self.in_flight += 1;
                tracing::trace!(in_flight = self.in_flight, "item handed to waiting consumer");
                consumer.grant(item);
            }
            None => self.items.push_back(item),
        }
    }

    /// Moves parked producers' items in while there is room.
    fn admit_producers(&mut self, capacity: Option<usize>) {
        while self.has_room(capacity) {
            let Some(parked) = self.producers.dequeue_one() else {
                break;
            };
            self.deliver(parked.item);
            parked.slot.grant(());
        }
    }
}

pub struct BoundedQueue<T> {
    capacity: Option<usize>,
    state: StateLock<QueueState<T>>,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidArgument`] when `capacity` is zero.
    pub fn new(capacity: usize) -> SyncResult<Self> {
        if capacity == 0 {
            return Err(SyncError::InvalidArgument("capacity must be at least 1"));
        }
        Ok(Self::with_capacity(Some(capacity)))
    }

    /// Creates a queue on which `put` never suspends.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Accepts `item` if there is room, otherwise parks it with a new
    /// producer ticket.
    fn offer(&self, item: T) -> Begin<(), ()> {
        let mut state = lock_state(&self.state);
        if state.has_room(self.capacity) {
            state.deliver(item);
            return Begin::Ready(());
        }

        let slot = Arc::new(Slot::new());
        let ticket = state.producers.enqueue(Parked {
            item,
            slot: Arc::clone(&slot),
        });
        tracing::trace!(?ticket, "queue full, producer waiting");
        Begin::Queued(ticket, slot)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            state: StateLock::new(QueueState {
                items: VecDeque::new(),
                in_flight: 0,
                consumers: WaitQueue::new(),
                producers: WaitQueue::new(),
                unfinished: 0,
                joiners: WaitQueue::new(),
            }),
        }
    }

    /// Adds `item`, blocking the current thread while the queue is full.
    pub fn put(&self, item: T) {
        if let Begin::Queued(_, slot) = self.offer(item) {
            slot.wait();
        }
    }

    /// Adds `item` if there is room right now.
    ///
    /// # Errors
    ///
    /// Gives the item back with [`SyncError::WouldBlock`] when full.
    pub fn try_put(&self, item: T) -> Result<(), Rejected<T>> {
        let mut state = lock_state(&self.state);
        if state.has_room(self.capacity) {
            state.deliver(item);
            Ok(())
        } else {
            Err(Rejected::new(item, SyncError::WouldBlock))
        }
    }

    /// Adds `item`, waiting at most `timeout` for room.
    ///
    /// # Errors
    ///
    /// Gives the item back with [`SyncError::Timeout`] if no room opened
    /// up in time; the producer's place in line is removed.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), Rejected<T>> {
        let deadline = Instant::now() + timeout;
        let (ticket, slot) = match self.offer(item) {
            Begin::Ready(()) => return Ok(()),
            Begin::Queued(ticket, slot) => (ticket, slot),
        };
        if slot.park(Some(deadline)).is_some() {
            return Ok(());
        }

        let withdrawn = lock_state(&self.state).producers.remove(ticket);
        match withdrawn {
            Some(parked) => {
                tracing::debug!(?ticket, "producer withdrawn after deadline");
                Err(Rejected::new(parked.item, SyncError::Timeout))
            }
            // Admitted between the deadline and the withdrawal.
            None => {
                slot.wait();
                Ok(())
            }
        }
    }

    /// Adds `item` from an async task. Dropping the future while it waits
    /// for room withdraws the producer and drops the item with it.
    pub fn put_async(&self, item: T) -> impl Future<Output = ()> + '_ {
        Suspended::new(PutItem::new(self, item))
    }

    /// Removes the oldest item, blocking the current thread while empty.
    pub fn get(&self) -> T {
        match TakeItem(self).begin() {
            Begin::Ready(item) => item,
            Begin::Queued(_, slot) => TakeItem(self).finish(slot.wait()),
        }
    }

    pub fn try_get(&self) -> Option<T> {
        let mut state = lock_state(&self.state);
        let item = state.items.pop_front()?;
        state.admit_producers(self.capacity);
        Some(item)
    }

    /// Removes the oldest item, waiting at most `timeout` for one.
    ///
    /// # Errors
    ///
    /// [`SyncError::Timeout`] when nothing arrived in time.
    pub fn get_timeout(&self, timeout: Duration) -> SyncResult<T> {
        block(&mut TakeItem(self), Some(Instant::now() + timeout))
    }

    /// Removes the oldest item from an async task. An item handed to a
    /// future that is dropped before observing it goes back to the head
    /// of the queue.
    pub fn get_async(&self) -> impl Future<Output = T> + '_ {
        Suspended::new(TakeItem(self))
    }

    /// Closes one task opened by an accepted item.
    ///
    /// # Errors
    ///
    /// [`SyncError::IllegalState`] when every task is already closed.
    pub fn task_done(&self) -> SyncResult<()> {
        let mut state = lock_state(&self.state);
        if state.unfinished == 0 {
            return Err(SyncError::IllegalState(
                "task_done called more times than items were put",
            ));
        }

        state.unfinished -= 1;
        if state.unfinished == 0 {
            for joiner in state.joiners.dequeue_all() {
                joiner.grant(());
            }
        }
        Ok(())
    }

    /// Blocks until every accepted item has been marked done.
    pub fn join(&self) {
        if let Begin::Queued(_, slot) = JoinTasks(self).begin() {
            slot.wait();
        }
    }

    /// # Errors
    ///
    /// [`SyncError::Timeout`] if tasks remain open after `timeout`.
    pub fn join_timeout(&self, timeout: Duration) -> SyncResult<()> {
        block(&mut JoinTasks(self), Some(Instant::now() + timeout))
    }

    pub fn join_async(&self) -> impl Future<Output = ()> + '_ {
        Suspended::new(JoinTasks(self))
    }

    /// Items buffered, excluding those in flight to a consumer.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_state(&self.state).items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock_state(&self.state).items.is_empty()
    }

    /// `None` for an unbounded queue.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    #[must_use]
    pub fn waiting_consumers(&self) -> usize {
        lock_state(&self.state).consumers.len()
    }

    #[must_use]
    pub fn waiting_producers(&self) -> usize {
        lock_state(&self.state).producers.len()
    }

    #[must_use]
    pub fn unfinished_tasks(&self) -> usize {
        lock_state(&self.state).unfinished
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.state);
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.items.len())
            .field("in_flight", &state.in_flight)
            .field("waiting_consumers", &state.consumers.len())
            .field("waiting_producers", &state.producers.len())
            .field("unfinished", &state.unfinished)
            .finish()
    }
}

struct PutItem<'a, T> {
    queue: &'a BoundedQueue<T>,
    item: Option<T>,
}

impl<'a, T> PutItem<'a, T> {
    fn new(queue: &'a BoundedQueue<T>, item: T) -> Self {
        Self {
            queue,
            item: Some(item),
        }
    }
}

impl<T> Operation for PutItem<'_, T> {
    type Output = ();
    type Grant = ();

    fn begin(&mut self) -> Begin<(), ()> {
        match self.item.take() {
            Some(item) => self.queue.offer(item),
            // invariant: a put begins once, so the item is still here.
            None => Begin::Ready(()),
        }
    }

    // The withdrawn item is dropped here, after the state lock is released.
    fn withdraw(&mut self, ticket: Ticket) -> bool {
        let parked = lock_state(&self.queue.state).producers.remove(ticket);
        parked.is_some()
    }

    fn finish(&mut self, (): ()) {}

    // The item was accepted before the grant; nothing to return.
    fn abandon(&mut self, (): ()) {}
}

struct TakeItem<'a, T>(&'a BoundedQueue<T>);

impl<T> Operation for TakeItem<'_, T> {
    type Output = T;
    type Grant = T;

    fn begin(&mut self) -> Begin<T, T> {
        let queue = self.0;
        let mut state = lock_state(&queue.state);
        if let Some(item) = state.items.pop_front() {
            state.admit_producers(queue.capacity);
            return Begin::Ready(item);
        }

        let slot = Arc::new(Slot::new());
        let ticket = state.consumers.enqueue(Arc::clone(&slot));
        Begin::Queued(ticket, slot)
    }

    fn withdraw(&mut self, ticket: Ticket) -> bool {
        lock_state(&self.0.state).consumers.remove(ticket).is_some()
    }

    fn finish(&mut self, item: T) -> T {
        let queue = self.0;
        let mut state = lock_state(&queue.state);
        state.in_flight -= 1;
        state.admit_producers(queue.capacity);
        item
    }

    fn abandon(&mut self, item: T) {
        let mut state = lock_state(&self.0.state);
        state.in_flight -= 1;
        match state.consumers.dequeue_one() {
            Some(consumer) => {
                state.in_flight += 1;
                consumer.grant(item);
            }
            None => state.items.push_front(item),
        }
        tracing::debug!("unobserved item returned to the queue head");
    }
}

struct JoinTasks<'a, T>(&'a BoundedQueue<T>);

impl<T> Operation for JoinTasks<'_, T> {
    type Output = ();
    type Grant = ();

    fn begin(&mut self) -> Begin<(), ()> {
        let mut state = lock_state(&self.0.state);
        if state.unfinished == 0 {
            return Begin::Ready(());
        }
        let slot = Arc::new(Slot::new());
        let ticket = state.joiners.enqueue(Arc::clone(&slot));
        Begin::Queued(ticket, slot)
    }

    fn withdraw(&mut self, ticket: Ticket) -> bool {
        lock_state(&self.0.state).joiners.remove(ticket).is_some()
    }

    fn finish(&mut self, (): ()) {}

    fn abandon(&mut self, (): ()) {}
}
