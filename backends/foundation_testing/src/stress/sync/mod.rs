//! Stress drivers, one per primitive.
//!
//! Each driver owns a fresh primitive, hammers it through a
//! [`StressHarness`](crate::stress::StressHarness) and returns the run
//! result together with the figure that proves the primitive's guarantee.

pub mod barrier;
pub mod mutex;
pub mod queue;
pub mod semaphore;

pub use barrier::{run_barrier_phase_stress, BarrierPhaseReport};
pub use mutex::{run_mutex_counter_stress, MutexCounterReport};
pub use queue::{run_queue_throughput_stress, QueueThroughputReport};
pub use semaphore::{run_semaphore_occupancy_stress, OccupancyReport};
