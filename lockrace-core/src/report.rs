use std::fmt;
use std::time::Duration;

use crate::entry::Key;
use crate::error::{CacheError, ReentrancyViolation};
use crate::keyed_cache::CacheVariant;
#[cfg(feature = "stats")]
use crate::ReadStats;

/// Why a reader thread stopped polling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderExit {
    /// `get` returned absent: the target key has been removed.
    Absent,
    /// `get` raised the missing-key fault.
    MissingKey,
    /// The lock refused a request; a quiet, expected exit.
    LockReentrancy(ReentrancyViolation),
    /// The shutdown signal was observed before any other outcome.
    Cancelled,
    /// `get` failed with an error no reader expects.
    Faulted(CacheError),
    /// The reader thread panicked.
    Panicked,
}

impl ReaderExit {
    /// Exits that do not point at a defect in the cache.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            ReaderExit::Absent | ReaderExit::LockReentrancy(_) | ReaderExit::Cancelled
        )
    }
}

impl fmt::Display for ReaderExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderExit::Absent => f.write_str("observed absence"),
            ReaderExit::MissingKey => f.write_str("missing-key fault"),
            ReaderExit::LockReentrancy(v) => write!(f, "lock reentrancy violation ({v})"),
            ReaderExit::Cancelled => f.write_str("cancelled"),
            ReaderExit::Faulted(err) => write!(f, "unexpected fault ({err})"),
            ReaderExit::Panicked => f.write_str("panicked"),
        }
    }
}

/// Why the mutator thread stopped removing keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutatorExit {
    /// Every key in `0..=population` was removed.
    Exhausted { removed: u64 },
    /// The shutdown signal was observed before `next_key` was removed.
    Cancelled { next_key: Key },
    /// `remove` or `count` failed; always a defect.
    Faulted { key: Key, error: CacheError },
    Panicked,
}

impl fmt::Display for MutatorExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutatorExit::Exhausted { removed } => write!(f, "exhausted after {removed} removals"),
            MutatorExit::Cancelled { next_key } => write!(f, "cancelled before key {next_key}"),
            MutatorExit::Faulted { key, error } => write!(f, "faulted at key {key} ({error})"),
            MutatorExit::Panicked => f.write_str("panicked"),
        }
    }
}

/// Outcome of one [`StressHarness`](crate::StressHarness) run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub variant: CacheVariant,
    /// One exit per reader, indexed by reader id.
    pub readers: Vec<ReaderExit>,
    pub mutator: MutatorExit,
    /// `count()` after every task was joined, if it could be read.
    pub final_count: Option<usize>,
    pub elapsed: Duration,
    #[cfg(feature = "stats")]
    pub stats: ReadStats,
}

impl RunReport {
    /// Readers that hit the missing-key fault.
    pub fn missing_key_faults(&self) -> usize {
        self.count_readers(|exit| matches!(exit, ReaderExit::MissingKey))
    }

    pub fn reentrancy_exits(&self) -> usize {
        self.count_readers(|exit| matches!(exit, ReaderExit::LockReentrancy(_)))
    }

    pub fn absent_exits(&self) -> usize {
        self.count_readers(|exit| matches!(exit, ReaderExit::Absent))
    }

    pub fn cancelled_exits(&self) -> usize {
        self.count_readers(|exit| matches!(exit, ReaderExit::Cancelled))
    }

    /// True if any task ended with something other than a benign exit.
    pub fn faulted(&self) -> bool {
        self.readers.iter().any(|exit| !exit.is_benign())
            || matches!(
                self.mutator,
                MutatorExit::Faulted { .. } | MutatorExit::Panicked
            )
    }

    /// One line of narration for this run, followed by the operation
    /// counters when the `stats` feature is enabled.
    pub fn summary(&self) -> String {
        let verdict = if self.missing_key_faults() > 0 {
            "missing-key fault reproduced"
        } else if self.faulted() {
            "unexpected fault"
        } else {
            "no fault"
        };
        let line = format!(
            "{}: {} (readers: {} absent, {} missing-key, {} reentrancy, {} cancelled; mutator {}; {} entries left; {:?})",
            self.variant,
            verdict,
            self.absent_exits(),
            self.missing_key_faults(),
            self.reentrancy_exits(),
            self.cancelled_exits(),
            self.mutator,
            self.final_count
                .map_or_else(|| "?".to_string(), |count| count.to_string()),
            self.elapsed,
        );
        #[cfg(feature = "stats")]
        let line = format!("{line}; {}", self.stats);
        line
    }

    fn count_readers(&self, pred: impl Fn(&ReaderExit) -> bool) -> usize {
        self.readers.iter().filter(|exit| pred(exit)).count()
    }
}

/// Reports of both variants run against the same configuration.
#[derive(Clone, Debug)]
pub struct Comparison {
    pub naive: RunReport,
    pub reentrant: RunReport,
}

impl Comparison {
    /// The naive cache surfaced the missing-key fault.
    pub fn race_reproduced(&self) -> bool {
        self.naive.missing_key_faults() > 0
    }

    /// The reentrant cache finished without any fault.
    pub fn fix_held(&self) -> bool {
        !self.reentrant.faulted()
    }
}

/// Reports of repeated runs against one variant.
#[derive(Clone, Debug)]
pub struct TrialSummary {
    pub variant: CacheVariant,
    pub runs: Vec<RunReport>,
}

impl TrialSummary {
    /// Runs in which at least one reader hit the missing-key fault.
    pub fn reproduced(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| run.missing_key_faults() > 0)
            .count()
    }

    /// Runs in which any task ended on a non-benign exit.
    pub fn faulted(&self) -> usize {
        self.runs.iter().filter(|run| run.faulted()).count()
    }
}

impl fmt::Display for TrialSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: missing-key fault in {}/{} trials",
            self.variant,
            self.reproduced(),
            self.runs.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(readers: Vec<ReaderExit>, mutator: MutatorExit) -> RunReport {
        RunReport {
            variant: CacheVariant::Naive,
            readers,
            mutator,
            final_count: Some(0),
            elapsed: Duration::from_millis(1),
            #[cfg(feature = "stats")]
            stats: ReadStats::new(),
        }
    }

    #[test]
    fn test_benign_exits() {
        assert!(ReaderExit::Absent.is_benign());
        assert!(ReaderExit::Cancelled.is_benign());
        assert!(ReaderExit::LockReentrancy(ReentrancyViolation::ReadWhileWriting).is_benign());
        assert!(!ReaderExit::MissingKey.is_benign());
        assert!(!ReaderExit::Panicked.is_benign());
    }

    #[test]
    fn test_counts_and_fault() {
        let run = report(
            vec![
                ReaderExit::MissingKey,
                ReaderExit::Cancelled,
                ReaderExit::Absent,
            ],
            MutatorExit::Cancelled { next_key: 12 },
        );
        assert_eq!(run.missing_key_faults(), 1);
        assert_eq!(run.cancelled_exits(), 1);
        assert_eq!(run.absent_exits(), 1);
        assert!(run.faulted());
        assert!(run.summary().contains("missing-key fault reproduced"));
    }

    #[test]
    fn test_clean_run() {
        let run = report(
            vec![ReaderExit::Absent, ReaderExit::Absent],
            MutatorExit::Exhausted { removed: 11 },
        );
        assert!(!run.faulted());
        assert!(run.summary().starts_with("naive: no fault"));
    }

    #[test]
    fn test_mutator_fault_counts_as_fault() {
        let run = report(
            vec![ReaderExit::Absent],
            MutatorExit::Faulted {
                key: 3,
                error: CacheError::LockReentrancy(ReentrancyViolation::WriteWhileWriting),
            },
        );
        assert!(run.faulted());
        assert!(run.summary().contains("unexpected fault"));
    }

    #[cfg(feature = "stats")]
    #[test]
    fn test_summary_includes_stats() {
        let run = report(vec![ReaderExit::MissingKey], MutatorExit::Cancelled { next_key: 11 });
        run.stats.record_hit();
        run.stats.record_fault();
        run.stats.record_removal();
        let summary = run.summary();
        assert!(summary.contains("2 reads (50.0% hits"));
        assert!(summary.ends_with("1 removals"));
    }

    #[cfg(not(feature = "stats"))]
    #[test]
    fn test_summary_without_stats() {
        let run = report(vec![ReaderExit::Absent], MutatorExit::Exhausted { removed: 11 });
        assert!(!run.summary().contains("reads"));
    }

    #[test]
    fn test_trial_summary() {
        let trials = TrialSummary {
            variant: CacheVariant::Naive,
            runs: vec![
                report(vec![ReaderExit::MissingKey], MutatorExit::Cancelled { next_key: 11 }),
                report(vec![ReaderExit::Absent], MutatorExit::Exhausted { removed: 11 }),
            ],
        };
        assert_eq!(trials.reproduced(), 1);
        assert_eq!(trials.faulted(), 1);
        assert_eq!(trials.to_string(), "naive: missing-key fault in 1/2 trials");
    }
}
