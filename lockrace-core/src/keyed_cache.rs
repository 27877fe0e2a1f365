use std::fmt;
use std::sync::Arc;

use crate::entry::{Entry, Key};
use crate::error::CacheError;

/// Identifies which synchronization discipline a cache uses.
///
/// # Variants
///
/// * `Naive` - existence check and value read in two separate read sections
/// * `Reentrant` - existence check nested inside the read section of the value read
///
/// # Examples
///
/// ```
/// use lockrace_core::CacheVariant;
///
/// assert_eq!(CacheVariant::Naive.as_str(), "naive");
/// assert_eq!(CacheVariant::ALL.len(), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheVariant {
    Naive,
    Reentrant,
}

impl CacheVariant {
    /// Both variants, in the order the driver runs them.
    pub const ALL: [CacheVariant; 2] = [CacheVariant::Naive, CacheVariant::Reentrant];

    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheVariant::Naive => "naive",
            CacheVariant::Reentrant => "reentrant",
        }
    }
}

impl fmt::Display for CacheVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared keyed cache of immutable [`Entry`] values.
///
/// This is the capability the stress harness drives. Implementations must be
/// safe to share between threads; the harness hands one instance to every
/// reader and to the mutator through an `Arc`.
///
/// # Contract
///
/// * `exists` - true iff `key` is present at the moment of the check
/// * `add` - inserts, or fails with [`CacheError::DuplicateKey`] leaving the
///   cache unchanged
/// * `get` - `Ok(Some(entry))` or `Ok(None)`; a well-formed implementation
///   never faults on an ordinary miss
/// * `remove` - deletes `key` if present, no-op otherwise (idempotent)
/// * `count` - snapshot of the number of keys
///
/// `exists`, `add`, `remove` and `count` are each a single critical section
/// and must not fail under concurrent use. Any error from them is a defect.
pub trait KeyedCache: Send + Sync {
    fn exists(&self, key: Key) -> Result<bool, CacheError>;

    /// Inserts `entry` under `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockrace_core::{CacheError, Entry, KeyedCache, NaiveLockedCache};
    ///
    /// let cache = NaiveLockedCache::new();
    /// cache.add(3, Entry::new(3, "first")).unwrap();
    /// assert_eq!(
    ///     cache.add(3, Entry::new(3, "second")),
    ///     Err(CacheError::DuplicateKey(3))
    /// );
    /// assert_eq!(cache.get(3).unwrap().unwrap().name(), "first");
    /// ```
    fn add(&self, key: Key, entry: Entry) -> Result<(), CacheError>;

    fn get(&self, key: Key) -> Result<Option<Arc<Entry>>, CacheError>;

    /// Removes `key` if present.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockrace_core::{Entry, KeyedCache, NaiveLockedCache};
    ///
    /// let cache = NaiveLockedCache::new();
    /// cache.add(1, Entry::numbered(1)).unwrap();
    ///
    /// cache.remove(1).unwrap();
    /// cache.remove(1).unwrap();
    /// assert_eq!(cache.count().unwrap(), 0);
    /// ```
    fn remove(&self, key: Key) -> Result<(), CacheError>;

    fn count(&self) -> Result<usize, CacheError>;

    /// Names the implementation for logs and reports.
    fn variant(&self) -> CacheVariant;
}

impl<C: KeyedCache + ?Sized> KeyedCache for Arc<C> {
    fn exists(&self, key: Key) -> Result<bool, CacheError> {
        (**self).exists(key)
    }

    fn add(&self, key: Key, entry: Entry) -> Result<(), CacheError> {
        (**self).add(key, entry)
    }

    fn get(&self, key: Key) -> Result<Option<Arc<Entry>>, CacheError> {
        (**self).get(key)
    }

    fn remove(&self, key: Key) -> Result<(), CacheError> {
        (**self).remove(key)
    }

    fn count(&self) -> Result<usize, CacheError> {
        (**self).count()
    }

    fn variant(&self) -> CacheVariant {
        (**self).variant()
    }
}
