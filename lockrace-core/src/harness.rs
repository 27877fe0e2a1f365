use std::thread;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::StressConfig;
use crate::entry::{Entry, Key};
use crate::error::{CacheError, HarnessError};
use crate::keyed_cache::{CacheVariant, KeyedCache};
use crate::observer::{HarnessPhase, NoopObserver, RunObserver};
use crate::report::{MutatorExit, ReaderExit, RunReport};
use crate::shutdown::ShutdownSignal;
#[cfg(feature = "stats")]
use crate::ReadStats;

/// Drives one cache with many readers and a single mutator until the race
/// shows up or the mutator runs out of keys.
///
/// A run goes through [`HarnessPhase`]s in order:
///
/// 1. **Populating** - the calling thread inserts keys `0..population`.
/// 2. **Running** - `readers` threads poll `get(target_key)` while one mutator
///    thread removes keys `0..=population` in ascending order, publishing
///    `count()` after each removal. The last key is one past the populated
///    range; removing it is a no-op.
/// 3. **Draining** - the harness has observed the shutdown signal and joins
///    every task.
/// 4. **Stopped** - the [`RunReport`] is returned.
///
/// # Shutdown
///
/// A reader that hits [`CacheError::MissingKey`] and a mutator that exhausts
/// its range both set the run's [`ShutdownSignal`]. Readers that observe the
/// key gone, or that hit a lock reentrancy violation, end quietly. Every task
/// checks the signal once per loop iteration, between cache calls, so no
/// task ever holds a lock when it decides to exit. Threads are scoped to the
/// run; `run` does not return while any of them is alive.
///
/// # Examples
///
/// ```
/// use lockrace_core::{KeyedCache, ReentrantLockedCache, StressConfig, StressHarness};
///
/// let config = StressConfig::default().with_population(200).with_readers(4);
/// let cache = ReentrantLockedCache::new();
/// let report = StressHarness::new(config).run(&cache).unwrap();
///
/// assert_eq!(report.missing_key_faults(), 0);
/// assert_eq!(cache.count().unwrap(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct StressHarness<O = NoopObserver> {
    config: StressConfig,
    observer: O,
}

impl StressHarness<NoopObserver> {
    pub fn new(config: StressConfig) -> Self {
        Self::with_observer(config, NoopObserver)
    }
}

impl<O: RunObserver> StressHarness<O> {
    /// Creates a harness that reports progress to `observer`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockrace_core::{NaiveLockedCache, StressConfig, StressHarness, TracingObserver};
    ///
    /// let config = StressConfig::default().with_population(100).with_readers(2);
    /// let harness = StressHarness::with_observer(config, TracingObserver::new(50));
    /// let report = harness.run(&NaiveLockedCache::new()).unwrap();
    /// assert_eq!(report.readers.len(), 2);
    /// ```
    pub fn with_observer(config: StressConfig, observer: O) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &StressConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Populates `cache` and runs the stress phase against it.
    ///
    /// `cache` is expected to be empty. A key that is already present makes
    /// population fail with [`HarnessError::Populate`] before any thread is
    /// started.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockrace_core::{
    ///     CacheError, Entry, HarnessError, KeyedCache, NaiveLockedCache, StressConfig,
    ///     StressHarness,
    /// };
    ///
    /// let harness = StressHarness::new(StressConfig::default().with_population(10));
    ///
    /// let used = NaiveLockedCache::new();
    /// used.add(0, Entry::numbered(0)).unwrap();
    /// assert!(matches!(
    ///     harness.run(&used),
    ///     Err(HarnessError::Populate(CacheError::DuplicateKey(0)))
    /// ));
    /// ```
    pub fn run<C>(&self, cache: &C) -> Result<RunReport, HarnessError>
    where
        C: KeyedCache + ?Sized,
    {
        self.config.validate()?;
        let variant = cache.variant();
        let _span = tracing::info_span!("stress_run", %variant).entered();
        let started = Instant::now();

        self.enter(variant, HarnessPhase::Populating);
        populate(cache, self.config.population)?;

        let signal = ShutdownSignal::new();
        #[cfg(feature = "stats")]
        let stats = ReadStats::new();

        let ctx = TaskContext {
            cache,
            config: &self.config,
            signal: &signal,
            observer: &self.observer,
            #[cfg(feature = "stats")]
            stats: &stats,
        };

        self.enter(variant, HarnessPhase::Running);
        let (readers, mutator) = thread::scope(|scope| -> Result<_, HarnessError> {
            let mut reader_handles = Vec::with_capacity(self.config.readers);
            for id in 0..self.config.readers {
                let spawned = thread::Builder::new()
                    .name(format!("reader-{id}"))
                    .spawn_scoped(scope, move || ctx.read_until_exit(id));
                match spawned {
                    Ok(handle) => reader_handles.push(handle),
                    Err(source) => {
                        signal.stop();
                        return Err(HarnessError::Spawn {
                            role: "reader",
                            source,
                        });
                    }
                }
            }

            let mutator_handle = thread::Builder::new()
                .name("mutator".to_string())
                .spawn_scoped(scope, move || ctx.remove_in_order())
                .map_err(|source| {
                    signal.stop();
                    HarnessError::Spawn {
                        role: "mutator",
                        source,
                    }
                })?;

            signal.wait();
            self.enter(variant, HarnessPhase::Draining);

            let readers: Vec<ReaderExit> = reader_handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(ReaderExit::Panicked))
                .collect();
            let mutator = mutator_handle.join().unwrap_or(MutatorExit::Panicked);
            Ok((readers, mutator))
        })?;

        let final_count = match cache.count() {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(error = %err, "count failed after drain");
                None
            }
        };

        self.enter(variant, HarnessPhase::Stopped);
        let report = RunReport {
            variant,
            readers,
            mutator,
            final_count,
            elapsed: started.elapsed(),
            #[cfg(feature = "stats")]
            stats,
        };
        info!("{}", report.summary());
        Ok(report)
    }

    fn enter(&self, variant: CacheVariant, phase: HarnessPhase) {
        debug!(%phase, "harness phase");
        self.observer.on_phase(variant, phase);
    }
}

fn populate<C>(cache: &C, population: u32) -> Result<(), HarnessError>
where
    C: KeyedCache + ?Sized,
{
    for key in 0..population {
        cache
            .add(key, Entry::numbered(key))
            .map_err(HarnessError::Populate)?;
    }
    debug!(population, "cache populated");
    Ok(())
}

/// What every task of a run borrows from the harness.
struct TaskContext<'a, C: ?Sized, O> {
    cache: &'a C,
    config: &'a StressConfig,
    signal: &'a ShutdownSignal,
    observer: &'a O,
    #[cfg(feature = "stats")]
    stats: &'a ReadStats,
}

impl<C: ?Sized, O> Clone for TaskContext<'_, C, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized, O> Copy for TaskContext<'_, C, O> {}

impl<C, O> TaskContext<'_, C, O>
where
    C: KeyedCache + ?Sized,
    O: RunObserver,
{
    fn read_until_exit(self, id: usize) -> ReaderExit {
        let _span = tracing::debug_span!("reader", id).entered();
        let exit = self.poll_target();
        debug!(%exit, "reader exiting");
        self.observer.on_reader_exit(id, &exit);
        exit
    }

    fn poll_target(&self) -> ReaderExit {
        let key = self.config.target_key;
        loop {
            if self.signal.is_stopped() {
                return ReaderExit::Cancelled;
            }
            match self.cache.get(key) {
                Ok(Some(_)) => {
                    #[cfg(feature = "stats")]
                    self.stats.record_hit();
                }
                Ok(None) => {
                    #[cfg(feature = "stats")]
                    self.stats.record_miss();
                    if self.config.stop_on_absence {
                        self.signal.stop();
                    }
                    return ReaderExit::Absent;
                }
                Err(CacheError::MissingKey(missing)) => {
                    #[cfg(feature = "stats")]
                    self.stats.record_fault();
                    warn!(key = missing, "missing-key fault");
                    self.signal.stop();
                    return ReaderExit::MissingKey;
                }
                Err(CacheError::LockReentrancy(violation)) => {
                    #[cfg(feature = "stats")]
                    self.stats.record_violation();
                    return ReaderExit::LockReentrancy(violation);
                }
                Err(err) => {
                    warn!(error = %err, "unexpected reader fault");
                    self.signal.stop();
                    return ReaderExit::Faulted(err);
                }
            }
        }
    }

    fn remove_in_order(self) -> MutatorExit {
        let _span = tracing::debug_span!("mutator").entered();
        // Stops the run even if this thread unwinds.
        let _stop = StopOnDrop(self.signal);

        let last = self.config.population;
        let mut removed = 0u64;
        for key in 0..=last {
            if self.signal.is_stopped() {
                debug!(next_key = key, "mutator cancelled");
                return MutatorExit::Cancelled { next_key: key };
            }
            if let Err(error) = self.cache.remove(key) {
                return self.mutator_fault(key, error);
            }
            removed += 1;
            #[cfg(feature = "stats")]
            self.stats.record_removal();

            match self.cache.count() {
                Ok(remaining) => {
                    trace!(key, remaining, "removed");
                    self.observer.on_removed(key, remaining);
                }
                Err(error) => return self.mutator_fault(key, error),
            }
        }

        debug!(removed, "mutator exhausted its range");
        MutatorExit::Exhausted { removed }
    }

    fn mutator_fault(&self, key: Key, error: CacheError) -> MutatorExit {
        warn!(key, error = %error, "mutator fault");
        MutatorExit::Faulted { key, error }
    }
}

struct StopOnDrop<'a>(&'a ShutdownSignal);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReentrancyViolation;
    use crate::{NaiveLockedCache, ReentrantLockedCache};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recording {
        phases: Mutex<Vec<HarnessPhase>>,
        counts: Mutex<Vec<(Key, usize)>>,
        exits: Mutex<Vec<(usize, ReaderExit)>>,
    }

    impl RunObserver for Recording {
        fn on_phase(&self, _variant: CacheVariant, phase: HarnessPhase) {
            self.phases.lock().push(phase);
        }

        fn on_removed(&self, key: Key, remaining: usize) {
            self.counts.lock().push((key, remaining));
        }

        fn on_reader_exit(&self, reader: usize, exit: &ReaderExit) {
            self.exits.lock().push((reader, exit.clone()));
        }
    }

    fn small() -> StressConfig {
        StressConfig::default()
            .with_population(300)
            .with_readers(4)
            .with_target_key(10)
    }

    #[test]
    fn test_phases_in_order() {
        let harness = StressHarness::with_observer(small(), Recording::default());
        harness.run(&ReentrantLockedCache::new()).unwrap();
        assert_eq!(
            *harness.observer().phases.lock(),
            vec![
                HarnessPhase::Populating,
                HarnessPhase::Running,
                HarnessPhase::Draining,
                HarnessPhase::Stopped,
            ]
        );
    }

    #[test]
    fn test_reentrant_run_drains_cache() {
        let harness = StressHarness::with_observer(small(), Recording::default());
        let report = harness.run(&ReentrantLockedCache::new()).unwrap();

        assert_eq!(report.variant, CacheVariant::Reentrant);
        assert_eq!(report.readers.len(), 4);
        assert_eq!(report.missing_key_faults(), 0);
        assert!(!report.faulted());
        assert_eq!(report.mutator, MutatorExit::Exhausted { removed: 301 });
        assert_eq!(report.final_count, Some(0));
        assert_eq!(harness.observer().exits.lock().len(), 4);
    }

    #[test]
    fn test_published_counts_are_monotonic() {
        let harness = StressHarness::with_observer(small(), Recording::default());
        harness.run(&ReentrantLockedCache::new()).unwrap();

        let counts = harness.observer().counts.lock();
        assert_eq!(counts.len(), 301);
        for (i, (key, remaining)) in counts.iter().enumerate() {
            assert_eq!(*key as usize, i);
            assert_eq!(*remaining, 300usize.saturating_sub(i + 1));
        }
        // Removing the key past the populated range leaves the count at zero.
        assert_eq!(counts[299], (299, 0));
        assert_eq!(counts[300], (300, 0));
    }

    #[test]
    fn test_stop_on_absence_cancels_mutator() {
        let config = small().with_target_key(0).with_stop_on_absence(true);
        let report = StressHarness::new(config)
            .run(&ReentrantLockedCache::new())
            .unwrap();

        assert!(report.absent_exits() >= 1);
        assert!(matches!(
            report.mutator,
            MutatorExit::Cancelled { .. } | MutatorExit::Exhausted { .. }
        ));
        assert!(!report.faulted());
    }

    #[test]
    fn test_target_outside_population_exits_absent() {
        let config = small().with_target_key(5_000);
        let report = StressHarness::new(config)
            .run(&NaiveLockedCache::new())
            .unwrap();
        assert_eq!(report.absent_exits() + report.cancelled_exits(), 4);
        assert_eq!(report.missing_key_faults(), 0);
    }

    /// Parks the mutator after key `target - 1` until a reader sits in the
    /// race window, then parks that reader until `target` has been removed.
    struct Gate {
        target: Key,
        in_window: Arc<AtomicBool>,
        removed: Arc<AtomicBool>,
    }

    impl RunObserver for Gate {
        fn on_removed(&self, key: Key, _remaining: usize) {
            if key + 1 == self.target {
                while !self.in_window.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
            } else if key == self.target {
                self.removed.store(true, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_gated_race_window_records_fault() {
        let in_window = Arc::new(AtomicBool::new(false));
        let removed = Arc::new(AtomicBool::new(false));
        let cache = {
            let in_window = Arc::clone(&in_window);
            let removed = Arc::clone(&removed);
            NaiveLockedCache::with_race_window(move |_| {
                in_window.store(true, Ordering::SeqCst);
                while !removed.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
            })
        };
        let gate = Gate {
            target: 10,
            in_window,
            removed,
        };

        let report = StressHarness::with_observer(small(), gate)
            .run(&cache)
            .unwrap();

        assert_eq!(report.variant, CacheVariant::Naive);
        assert!(report.missing_key_faults() >= 1);
        assert!(report.faulted());
        assert!(matches!(
            report.mutator,
            MutatorExit::Cancelled { .. } | MutatorExit::Exhausted { .. }
        ));
        assert_eq!(
            report.absent_exits() + report.missing_key_faults() + report.cancelled_exits(),
            4
        );
    }

    #[test]
    fn test_prepopulated_cache_fails_population() {
        let cache = NaiveLockedCache::new();
        cache.add(0, Entry::numbered(0)).unwrap();
        let err = StressHarness::new(small()).run(&cache).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Populate(CacheError::DuplicateKey(0))
        ));
    }

    #[test]
    fn test_invalid_config_starts_nothing() {
        let harness = StressHarness::with_observer(small().with_readers(0), Recording::default());
        assert!(matches!(
            harness.run(&NaiveLockedCache::new()),
            Err(HarnessError::InvalidConfig(_))
        ));
        assert!(harness.observer().phases.lock().is_empty());
    }

    /// Naive cache whose `get` always fails with `error`.
    struct FailingGets {
        error: CacheError,
        inner: NaiveLockedCache,
    }

    impl FailingGets {
        fn new(error: CacheError) -> Self {
            Self {
                error,
                inner: NaiveLockedCache::new(),
            }
        }
    }

    impl KeyedCache for FailingGets {
        fn exists(&self, key: Key) -> Result<bool, CacheError> {
            self.inner.exists(key)
        }

        fn add(&self, key: Key, entry: Entry) -> Result<(), CacheError> {
            self.inner.add(key, entry)
        }

        fn get(&self, _key: Key) -> Result<Option<Arc<Entry>>, CacheError> {
            Err(self.error.clone())
        }

        fn remove(&self, key: Key) -> Result<(), CacheError> {
            self.inner.remove(key)
        }

        fn count(&self) -> Result<usize, CacheError> {
            self.inner.count()
        }

        fn variant(&self) -> CacheVariant {
            self.inner.variant()
        }
    }

    /// Holds the mutator after its first removal until every reader has
    /// exited.
    struct AwaitReaders {
        readers: usize,
        exited: AtomicUsize,
    }

    impl AwaitReaders {
        fn new(readers: usize) -> Self {
            Self {
                readers,
                exited: AtomicUsize::new(0),
            }
        }
    }

    impl RunObserver for AwaitReaders {
        fn on_removed(&self, key: Key, _remaining: usize) {
            if key == 0 {
                while self.exited.load(Ordering::SeqCst) < self.readers {
                    thread::yield_now();
                }
            }
        }

        fn on_reader_exit(&self, _reader: usize, _exit: &ReaderExit) {
            self.exited.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_reentrancy_violation_ends_reader_quietly() {
        let config = small().with_population(100);
        let cache = FailingGets::new(CacheError::LockReentrancy(
            ReentrancyViolation::ReadWhileWriting,
        ));
        let report = StressHarness::with_observer(config, AwaitReaders::new(4))
            .run(&cache)
            .unwrap();

        assert_eq!(
            report.readers,
            vec![ReaderExit::LockReentrancy(ReentrancyViolation::ReadWhileWriting); 4]
        );
        // No reader set the signal, so the mutator ran to the end.
        assert_eq!(report.mutator, MutatorExit::Exhausted { removed: 101 });
        assert_eq!(report.final_count, Some(0));
        assert_eq!(report.reentrancy_exits(), 4);
        assert!(!report.faulted());
        #[cfg(feature = "stats")]
        assert_eq!(report.stats.violations(), 4);
    }

    #[test]
    fn test_unexpected_reader_error_stops_run() {
        let config = small().with_population(100);
        let cache = FailingGets::new(CacheError::DuplicateKey(10));
        let report = StressHarness::with_observer(config, AwaitReaders::new(4))
            .run(&cache)
            .unwrap();

        let faulted = report
            .readers
            .iter()
            .filter(|exit| **exit == ReaderExit::Faulted(CacheError::DuplicateKey(10)))
            .count();
        assert!(faulted >= 1);
        assert_eq!(faulted + report.cancelled_exits(), 4);
        assert!(report.faulted());
        assert!(report.summary().contains("unexpected fault"));
        // The mutator is held after key 0 until the readers are gone.
        assert_eq!(report.mutator, MutatorExit::Cancelled { next_key: 1 });
        assert_eq!(report.final_count, Some(99));
    }

    #[cfg(feature = "stats")]
    #[test]
    fn test_stats_attached() {
        let report = StressHarness::new(small())
            .run(&ReentrantLockedCache::new())
            .unwrap();
        assert_eq!(report.stats.removals(), 301);
        assert!(report.stats.misses() >= 1);
        assert_eq!(report.stats.faults(), 0);
    }
}
