//! FIFO queue of suspended callers.

use std::collections::VecDeque;

/// Handle to a queued waiter, used to withdraw exactly that waiter.
///
/// Tickets are issued from a monotonically increasing counter, so a ticket
/// is never reused within one queue and cannot match a later waiter.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Ordered sequence of resume handles; insertion order is wake order.
///
/// The queue never resumes anybody itself: the primitive owning it takes
/// handles out and resumes them.
#[derive(Debug)]
pub struct WaitQueue<T> {
    entries: VecDeque<(Ticket, T)>,
    next_ticket: u64,
}

impl<T> Default for WaitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WaitQueue<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_ticket: 0,
        }
    }

    /// Appends a resume handle behind every waiter already queued.
    pub fn enqueue(&mut self, handle: T) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.entries.push_back((ticket, handle));
        ticket
    }

    /// Removes and returns the oldest handle.
    pub fn dequeue_one(&mut self) -> Option<T> {
        self.entries.pop_front().map(|(_, handle)| handle)
    }

    /// Removes and returns every handle, oldest first.
    pub fn dequeue_all(&mut self) -> Vec<T> {
        self.entries.drain(..).map(|(_, handle)| handle).collect()
    }

    /// Withdraws the waiter behind `ticket`.
    ///
    /// Returns `None` when the waiter already left the queue, i.e. it was
    /// dequeued for waking before it could cancel.
    pub fn remove(&mut self, ticket: Ticket) -> Option<T> {
        let index = self
            .entries
            .iter()
            .position(|(queued, _)| *queued == ticket)?;
        self.entries.remove(index).map(|(_, handle)| handle)
    }

    #[must_use]
    pub fn contains(&self, ticket: Ticket) -> bool {
        self.entries.iter().any(|(queued, _)| *queued == ticket)
    }

    /// Oldest handle, without removing it.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.entries.front().map(|(_, handle)| handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
