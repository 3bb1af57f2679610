//! Failure taxonomy shared by every primitive in this crate.

use core::fmt;

pub type SyncResult<T> = core::result::Result<T, SyncError>;

/// Errors raised by the coordination primitives.
///
/// All of them are local to the failing call: the primitive's internal
/// counters and wait queues are left consistent whichever variant is
/// returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncError {
    /// Bad construction parameters; the instance must not be used.
    InvalidArgument(&'static str),

    /// Operation called in a state that makes it meaningless, for example
    /// releasing a mutex nobody holds.
    IllegalState(&'static str),

    /// The caller's deadline expired before the resource was granted.
    Timeout,

    /// The barrier was aborted or reset while the caller was waiting.
    BrokenBarrier,

    /// `release()` would push a semaphore beyond its `max_permits`.
    PermitOverflow,

    /// A non-suspending `try_*` operation could not complete immediately.
    WouldBlock,
}

impl std::error::Error for SyncError {}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Self::IllegalState(what) => write!(f, "illegal state: {what}"),
            Self::Timeout => write!(f, "deadline expired before the resource was granted"),
            Self::BrokenBarrier => write!(f, "barrier is broken"),
            Self::PermitOverflow => write!(f, "release would exceed max_permits"),
            Self::WouldBlock => write!(f, "operation would block"),
        }
    }
}

/// An item the queue refused, handed back to the caller together with
/// the reason it was refused.
pub struct Rejected<T> {
    item: T,
    reason: SyncError,
}

impl<T> Rejected<T> {
    pub(crate) fn new(item: T, reason: SyncError) -> Self {
        Self { item, reason }
    }

    /// Why the item was refused.
    #[must_use]
    pub fn reason(&self) -> SyncError {
        self.reason
    }

    /// Returns the refused item.
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item rejected: {}", self.reason)
    }
}

impl<T> std::error::Error for Rejected<T> {}

impl<T> From<Rejected<T>> for SyncError {
    fn from(value: Rejected<T>) -> Self {
        value.reason
    }
}
