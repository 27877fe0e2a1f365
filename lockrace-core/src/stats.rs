use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for one stress run.
///
/// Readers and the mutator bump these with `Relaxed` atomics as they go; the
/// harness snapshots them into the [`RunReport`](crate::RunReport) once every
/// task has been joined.
///
/// # Examples
///
/// ```
/// use lockrace_core::ReadStats;
///
/// let stats = ReadStats::new();
/// stats.record_hit();
/// stats.record_hit();
/// stats.record_miss();
///
/// assert_eq!(stats.hits(), 2);
/// assert_eq!(stats.reads(), 3);
/// assert!((stats.hit_rate() - 0.6666).abs() < 0.001);
/// ```
#[derive(Debug)]
pub struct ReadStats {
    hits: AtomicU64,
    misses: AtomicU64,
    faults: AtomicU64,
    violations: AtomicU64,
    removals: AtomicU64,
}

impl ReadStats {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            violations: AtomicU64::new(0),
            removals: AtomicU64::new(0),
        }
    }

    /// Records a `get` that returned the entry.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a `get` that returned absent.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a missing-key fault.
    #[inline]
    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lock reentrancy violation.
    #[inline]
    pub fn record_violation(&self) {
        self.violations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    /// Total `get` calls that completed, whatever their outcome.
    #[inline]
    pub fn reads(&self) -> u64 {
        self.hits() + self.misses() + self.faults() + self.violations()
    }

    /// Fraction of reads that returned the entry. 0.0 before any read.
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.reads();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

impl fmt::Display for ReadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reads ({:.1}% hits, {} misses, {} faults, {} violations), {} removals",
            self.reads(),
            self.hit_rate() * 100.0,
            self.misses(),
            self.faults(),
            self.violations(),
            self.removals(),
        )
    }
}

impl Default for ReadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ReadStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            faults: AtomicU64::new(self.faults()),
            violations: AtomicU64::new(self.violations()),
            removals: AtomicU64::new(self.removals()),
        }
    }
}
