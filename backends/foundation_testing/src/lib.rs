//! Stress harness and concurrency scenarios for `foundation_sync`.
//!
//! This crate provides:
//! - **Stress harness**: workers released together through a barrier start
//!   gate, with optional per-operation latency metrics
//! - **Stress drivers**: one per primitive, each reporting the figure that
//!   proves the primitive's guarantee
//! - **Scenarios**: producer/consumer pipeline, phased workers, thread
//!   pool and bank ledger built from the primitives
//!
//! # Examples
//!
//! ```rust
//! use foundation_testing::stress::{sync::run_semaphore_occupancy_stress, StressConfig};
//!
//! let config = StressConfig::new().threads(8).iterations(200);
//! let report = run_semaphore_occupancy_stress(config, 3).unwrap();
//!
//! assert!(report.peak <= 3);
//! assert_eq!(report.result.successes, 1600);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod metrics;
pub mod scenarios;
pub mod stress;

pub use metrics::Metrics;
pub use stress::{StressConfig, StressHarness, StressResult};
