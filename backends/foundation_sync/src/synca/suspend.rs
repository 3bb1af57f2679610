//! One contract, two scheduler backends.
//!
//! Every suspending primitive operation (`acquire`, `wait`, `put`, `get`,
//! `join`) is written once as an [`Operation`]: a fast path that either
//! completes or queues the caller, plus the bookkeeping needed when a
//! queued caller gives up. Two drivers run it:
//!
//! - [`block`] for preemptive OS threads, with an optional deadline;
//! - [`Suspended`], a `Future` for cooperative executors, where dropping
//!   the future is the cancellation path.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::errors::SyncResult;

use super::{Slot, Ticket};

/// Outcome of an operation's fast path.
pub enum Begin<O, G> {
    /// Completed without suspending.
    Ready(O),
    /// Queued; the caller must wait on the slot.
    Queued(Ticket, Arc<Slot<G>>),
}

/// A primitive operation that may have to suspend its caller.
pub trait Operation {
    type Output;

    /// What the releasing side hands a queued caller.
    type Grant;

    /// Completes the operation or enqueues the caller. Runs once.
    fn begin(&mut self) -> Begin<Self::Output, Self::Grant>;

    /// Removes the caller's ticket under the primitive's state lock,
    /// returning `false` when it had already been dequeued and granted.
    fn withdraw(&mut self, ticket: Ticket) -> bool;

    /// Turns an observed grant into the operation's output.
    fn finish(&mut self, grant: Self::Grant) -> Self::Output;

    /// Passes on a grant that landed but will never be observed because
    /// the caller went away.
    fn abandon(&mut self, grant: Self::Grant);
}

/// Runs `op` on the current thread, parking until it completes or until
/// `deadline` passes.
///
/// # Errors
///
/// Returns [`SyncError::Timeout`](crate::SyncError::Timeout) when the
/// deadline expired and the caller was withdrawn without being granted.
pub fn block<O: Operation>(op: &mut O, deadline: Option<Instant>) -> SyncResult<O::Output> {
    match op.begin() {
        Begin::Ready(output) => Ok(output),
        Begin::Queued(ticket, slot) => {
            tracing::trace!(?ticket, "suspending thread");
            let grant = slot.park_or_withdraw(deadline, || op.withdraw(ticket))?;
            Ok(op.finish(grant))
        }
    }
}

enum Stage<G> {
    Idle,
    Queued(Ticket, Arc<Slot<G>>),
    Done,
}

/// Future driving an [`Operation`] on a cooperative executor.
///
/// Dropping it while queued withdraws the caller; if the grant had
/// already landed, the operation's `abandon` passes it on so nothing is
/// leaked or lost.
#[must_use = "futures do nothing unless polled"]
pub struct Suspended<O: Operation> {
    op: O,
    stage: Stage<O::Grant>,
}

impl<O: Operation> Suspended<O> {
    pub fn new(op: O) -> Self {
        Self {
            op,
            stage: Stage::Idle,
        }
    }
}

// The operation is never pinned structurally.
impl<O: Operation> Unpin for Suspended<O> {}

impl<O: Operation> Future for Suspended<O> {
    type Output = O::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if matches!(this.stage, Stage::Idle) {
            match this.op.begin() {
                Begin::Ready(output) => {
                    this.stage = Stage::Done;
                    return Poll::Ready(output);
                }
                Begin::Queued(ticket, slot) => {
                    tracing::trace!(?ticket, "suspending task");
                    this.stage = Stage::Queued(ticket, slot);
                }
            }
        }

        let polled = match &this.stage {
            Stage::Queued(_, slot) => slot.poll_take(cx),
            Stage::Idle | Stage::Done => panic!("`Suspended` polled after completion"),
        };

        match polled {
            Poll::Ready(grant) => {
                this.stage = Stage::Done;
                Poll::Ready(this.op.finish(grant))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<O: Operation> Drop for Suspended<O> {
    fn drop(&mut self) {
        if let Stage::Queued(ticket, slot) = std::mem::replace(&mut self.stage, Stage::Done) {
            if self.op.withdraw(ticket) {
                tracing::debug!(?ticket, "pending task cancelled");
            } else if let Some(grant) = slot.take() {
                tracing::debug!(?ticket, "cancelled task returns unobserved grant");
                self.op.abandon(grant);
            }
        }
    }
}
