use tracing::info;

use crate::config::StressConfig;
use crate::error::HarnessError;
use crate::harness::StressHarness;
use crate::keyed_cache::CacheVariant;
use crate::naive_cache::NaiveLockedCache;
use crate::observer::{NoopObserver, RunObserver};
use crate::reentrant_cache::ReentrantLockedCache;
use crate::report::{Comparison, RunReport, TrialSummary};

/// Runs the stress harness against each cache variant for comparison.
///
/// Every run gets a fresh, empty cache instance; nothing carries over from
/// one run to the next.
///
/// # Examples
///
/// ```
/// use lockrace_core::{Driver, StressConfig};
///
/// let driver = Driver::new(StressConfig::default().with_population(100).with_readers(2));
/// let comparison = driver.compare().unwrap();
/// assert!(comparison.fix_held());
/// ```
#[derive(Clone, Debug)]
pub struct Driver<O = NoopObserver> {
    harness: StressHarness<O>,
}

impl Driver<NoopObserver> {
    pub fn new(config: StressConfig) -> Self {
        Self {
            harness: StressHarness::new(config),
        }
    }
}

impl<O: RunObserver> Driver<O> {
    pub fn with_observer(config: StressConfig, observer: O) -> Self {
        Self {
            harness: StressHarness::with_observer(config, observer),
        }
    }

    pub fn harness(&self) -> &StressHarness<O> {
        &self.harness
    }

    /// Runs the harness once against a new cache of the given variant.
    pub fn run(&self, variant: CacheVariant) -> Result<RunReport, HarnessError> {
        info!(%variant, "running stress test");
        match variant {
            CacheVariant::Naive => self.harness.run(&NaiveLockedCache::new()),
            CacheVariant::Reentrant => self.harness.run(&ReentrantLockedCache::new()),
        }
    }

    /// Runs the naive variant, then the reentrant one.
    pub fn compare(&self) -> Result<Comparison, HarnessError> {
        let naive = self.run(CacheVariant::Naive)?;
        let reentrant = self.run(CacheVariant::Reentrant)?;
        let comparison = Comparison { naive, reentrant };
        info!(
            race_reproduced = comparison.race_reproduced(),
            fix_held = comparison.fix_held(),
            "comparison finished"
        );
        Ok(comparison)
    }

    /// Runs `trials` independent runs against one variant.
    pub fn trials(&self, variant: CacheVariant, trials: usize) -> Result<TrialSummary, HarnessError> {
        let runs = (0..trials)
            .map(|_| self.run(variant))
            .collect::<Result<Vec<_>, _>>()?;
        let summary = TrialSummary { variant, runs };
        info!("{summary}");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> StressConfig {
        StressConfig::default().with_population(200).with_readers(3)
    }

    #[test]
    fn test_run_uses_requested_variant() {
        let driver = Driver::new(small());
        assert_eq!(
            driver.run(CacheVariant::Naive).unwrap().variant,
            CacheVariant::Naive
        );
        assert_eq!(
            driver.run(CacheVariant::Reentrant).unwrap().variant,
            CacheVariant::Reentrant
        );
    }

    #[test]
    fn test_compare_runs_both() {
        let comparison = Driver::new(small()).compare().unwrap();
        assert_eq!(comparison.naive.variant, CacheVariant::Naive);
        assert_eq!(comparison.reentrant.variant, CacheVariant::Reentrant);
        assert!(comparison.fix_held());
        assert_eq!(comparison.reentrant.final_count, Some(0));
    }

    #[test]
    fn test_trials_collects_every_run() {
        let summary = Driver::new(small())
            .trials(CacheVariant::Reentrant, 3)
            .unwrap();
        assert_eq!(summary.runs.len(), 3);
        assert_eq!(summary.reproduced(), 0);
    }

    #[test]
    fn test_invalid_config_propagates() {
        let driver = Driver::new(small().with_readers(0));
        assert!(matches!(
            driver.compare(),
            Err(HarnessError::InvalidConfig(_))
        ));
    }
}
