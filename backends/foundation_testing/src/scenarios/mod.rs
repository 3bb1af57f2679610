//! Classic concurrency patterns assembled from the `foundation_sync`
//! primitives:
//! - producer/consumer pipeline stopped with poison pills
//! - workers advancing in lockstep phases behind a barrier
//! - a thread pool fed through a bounded queue
//! - a bank ledger guarded by a mutex

pub mod bank;
pub mod barrier;
pub mod producer_consumer;
pub mod thread_pool;

pub use bank::{Ledger, LedgerError};
pub use barrier::{run_phased_workers, PhaseLog};
pub use producer_consumer::{run_pipeline, PipelineReport};
pub use thread_pool::ThreadPool;
