//! # Lockrace
//!
//! Reproduces a check-then-act race in a reader-writer locked cache and
//! shows that nesting the existence check inside the read section fixes it.
//!
//! ## Quick Start
//!
//! ```rust
//! use lockrace::{Driver, StressConfig};
//!
//! let config = StressConfig::default().with_population(1_000).with_readers(4);
//! let comparison = Driver::new(config).compare().unwrap();
//!
//! // The reentrant cache never produces the missing-key fault.
//! assert!(comparison.fix_held());
//! println!("{}", comparison.naive.summary());
//! ```
//!
//! ## Reproducing the Race on Demand
//!
//! Under real scheduling the naive cache only faults some of the time. A
//! race window hook pins the schedule down: the reader parks between its two
//! critical sections, the key is removed, then the reader is let go.
//!
//! ```rust
//! use lockrace::{CacheError, Entry, Key, KeyedCache, NaiveLockedCache};
//! use parking_lot::Mutex;
//! use std::sync::{mpsc, Arc};
//! use std::thread;
//!
//! let (in_window_tx, in_window_rx) = mpsc::channel::<Key>();
//! let (resume_tx, resume_rx) = mpsc::channel::<()>();
//! let in_window_tx = Mutex::new(in_window_tx);
//! let resume_rx = Mutex::new(resume_rx);
//!
//! let cache = Arc::new(NaiveLockedCache::with_race_window(move |key| {
//!     in_window_tx.lock().send(key).unwrap();
//!     resume_rx.lock().recv().unwrap();
//! }));
//! cache.add(10, Entry::numbered(10)).unwrap();
//!
//! let reader = {
//!     let cache = Arc::clone(&cache);
//!     thread::spawn(move || cache.get(10))
//! };
//!
//! assert_eq!(in_window_rx.recv().unwrap(), 10);
//! cache.remove(10).unwrap();
//! resume_tx.send(()).unwrap();
//!
//! assert_eq!(reader.join().unwrap(), Err(CacheError::MissingKey(10)));
//! ```
//!
//! ## Command Line
//!
//! The `lockrace` binary runs both variants and prints a summary of each:
//!
//! ```text
//! lockrace --population 10000 --readers 20 --target-key 10 --trials 5
//! ```

pub mod cli;

pub use lockrace_core::*;
