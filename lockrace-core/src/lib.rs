//! # Lockrace Core
//!
//! A small concurrency testbed: one keyed cache, two locking disciplines,
//! and a stress harness that makes the difference between them observable.
//!
//! The naive cache checks whether a key exists and reads its value in two
//! separate read sections. A remove that lands between them turns the read
//! into a [`CacheError::MissingKey`] fault. The reentrant cache nests the
//! existence check inside the read section of the value read, which closes
//! the window at the cost of needing a lock that tolerates nested reads.
//!
//! ## Features
//!
//! - **Keyed cache contract**: [`KeyedCache`] with `exists`, `add`, `get`,
//!   `remove` and `count`
//! - **Two disciplines**: [`NaiveLockedCache`] and [`ReentrantLockedCache`]
//! - **Reentrant lock**: [`ReentrantRwLock`] reports discipline violations
//!   instead of deadlocking
//! - **Stress harness**: many readers, one mutator, cooperative shutdown
//! - **Statistics**: per-run operation counters (`stats` feature, on by default)
//!
//! ## Module Organization
//!
//! - [`entry`] - the immutable cached value
//! - [`keyed_cache`] - the cache trait and variant names
//! - [`naive_cache`] / [`reentrant_cache`] - the two implementations
//! - [`reentrant_lock`] - nested-read reader-writer lock
//! - [`shutdown`] - the one-way run/stop signal
//! - [`harness`] / [`driver`] - running and comparing the stress workload
//! - [`report`] / [`observer`] - run outcomes and progress callbacks
//!
//! ## Example
//!
//! ```
//! use lockrace_core::{CacheVariant, Driver, StressConfig};
//!
//! let config = StressConfig::default().with_population(500).with_readers(4);
//! let report = Driver::new(config).run(CacheVariant::Reentrant).unwrap();
//! assert_eq!(report.missing_key_faults(), 0);
//! ```
pub mod config;
pub mod driver;
pub mod entry;
pub mod error;
pub mod harness;
pub mod keyed_cache;
pub mod naive_cache;
pub mod observer;
pub mod reentrant_cache;
pub mod reentrant_lock;
pub mod report;
pub mod shutdown;

#[cfg(feature = "stats")]
mod stats;

pub use config::StressConfig;
pub use driver::Driver;
pub use entry::{Entry, Key};
pub use error::{CacheError, HarnessError, ReentrancyViolation};
pub use harness::StressHarness;
pub use keyed_cache::{CacheVariant, KeyedCache};
pub use naive_cache::NaiveLockedCache;
pub use observer::{HarnessPhase, NoopObserver, RunObserver, TracingObserver};
pub use reentrant_cache::ReentrantLockedCache;
pub use reentrant_lock::{ReentrantReadGuard, ReentrantRwLock, ReentrantWriteGuard};
pub use report::{Comparison, MutatorExit, ReaderExit, RunReport, TrialSummary};
pub use shutdown::ShutdownSignal;

#[cfg(feature = "stats")]
pub use stats::ReadStats;
