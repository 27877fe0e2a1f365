use crate::entry::Key;

/// The ways a thread can break the nesting discipline of a
/// [`ReentrantRwLock`](crate::ReentrantRwLock).
///
/// Each variant describes a request that would deadlock (or silently corrupt
/// the hold count) on a plain reader-writer lock. The reentrant lock refuses
/// the request and reports it instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReentrancyViolation {
    #[error("exclusive access requested while holding {depth} read guard(s)")]
    WriteWhileReading { depth: usize },

    #[error("read access requested while holding exclusive access")]
    ReadWhileWriting,

    #[error("exclusive access requested twice by the same thread")]
    WriteWhileWriting,

    #[error("nested read depth would exceed the limit of {max}")]
    DepthExceeded { max: usize },
}

/// Errors raised by [`KeyedCache`](crate::KeyedCache) operations.
///
/// # Variants
///
/// * `DuplicateKey` - `add` was called for a key that is already present.
///   Only expected during population, where it aborts the run.
/// * `MissingKey` - a lookup indexed a key that was removed after its
///   existence check passed. Only `NaiveLockedCache::get` produces it.
/// * `LockReentrancy` - the reentrant lock refused a request that breaks its
///   nesting discipline. Readers treat it as a quiet exit.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("key {0} is already present")]
    DuplicateKey(Key),

    #[error("key {0} was not found after its existence check passed")]
    MissingKey(Key),

    #[error("lock reentrancy violation: {0}")]
    LockReentrancy(#[from] ReentrancyViolation),
}

impl CacheError {
    /// Returns true for the fault the stress harness is built to surface.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, CacheError::MissingKey(_))
    }

    /// Returns true for lock discipline violations, which readers treat as a
    /// benign termination signal.
    pub fn is_reentrancy_violation(&self) -> bool {
        matches!(self, CacheError::LockReentrancy(_))
    }
}

/// Errors that prevent the stress harness from completing a run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid stress configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to populate cache: {0}")]
    Populate(#[source] CacheError),

    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },
}
