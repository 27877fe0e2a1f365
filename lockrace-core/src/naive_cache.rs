use parking_lot::RwLock;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::entry::{Entry, Key};
use crate::error::CacheError;
use crate::keyed_cache::{CacheVariant, KeyedCache};

type RaceWindowHook = Box<dyn Fn(Key) + Send + Sync>;

/// A keyed cache whose `get` checks existence and reads the value in two
/// separate critical sections.
///
/// Every other operation takes the lock exactly once and is race-free on its
/// own. `get` is not: it calls [`exists`](KeyedCache::exists), releases the
/// read guard, then takes a fresh read guard to index the map. A `remove`
/// that completes between the two sections leaves the second section
/// indexing a key that is gone, which surfaces as
/// [`CacheError::MissingKey`] rather than a silent `None`.
///
/// # Thread Safety
///
/// The map is guarded by a `parking_lot::RwLock`: many readers or one writer,
/// no poisoning.
///
/// # Race Window Hook
///
/// [`with_race_window`](Self::with_race_window) installs a callback that runs
/// between the two critical sections with the key being read. It holds no
/// lock while it runs, so a test can park the reader there, remove the key
/// from another thread, and release the reader to reproduce the fault on
/// demand.
///
/// # Examples
///
/// ```
/// use lockrace_core::{Entry, KeyedCache, NaiveLockedCache};
///
/// let cache = NaiveLockedCache::new();
/// cache.add(1, Entry::new(1, "one")).unwrap();
/// assert_eq!(cache.get(1).unwrap().unwrap().name(), "one");
/// assert_eq!(cache.get(2).unwrap(), None);
/// ```
pub struct NaiveLockedCache {
    map: RwLock<HashMap<Key, Arc<Entry>>>,
    race_window: Option<RaceWindowHook>,
}

impl NaiveLockedCache {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            race_window: None,
        }
    }

    /// Creates a cache whose `get` calls `hook(key)` after the existence
    /// check passes and before the value is read.
    ///
    /// The hook is never called for a key that fails the existence check.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockrace_core::{Entry, KeyedCache, NaiveLockedCache};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let calls = Arc::new(AtomicUsize::new(0));
    /// let cache = {
    ///     let calls = Arc::clone(&calls);
    ///     NaiveLockedCache::with_race_window(move |_key| {
    ///         calls.fetch_add(1, Ordering::SeqCst);
    ///     })
    /// };
    /// cache.add(1, Entry::numbered(1)).unwrap();
    ///
    /// cache.get(1).unwrap();
    /// cache.get(2).unwrap();
    /// assert_eq!(calls.load(Ordering::SeqCst), 1);
    /// ```
    pub fn with_race_window<F>(hook: F) -> Self
    where
        F: Fn(Key) + Send + Sync + 'static,
    {
        Self {
            map: RwLock::new(HashMap::new()),
            race_window: Some(Box::new(hook)),
        }
    }
}

impl Default for NaiveLockedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NaiveLockedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NaiveLockedCache")
            .field("len", &self.map.read().len())
            .field("race_window", &self.race_window.is_some())
            .finish()
    }
}

impl KeyedCache for NaiveLockedCache {
    fn exists(&self, key: Key) -> Result<bool, CacheError> {
        Ok(self.map.read().contains_key(&key))
    }

    fn add(&self, key: Key, entry: Entry) -> Result<(), CacheError> {
        match self.map.write().entry(key) {
            MapEntry::Occupied(_) => Err(CacheError::DuplicateKey(key)),
            MapEntry::Vacant(slot) => {
                slot.insert(Arc::new(entry));
                Ok(())
            }
        }
    }

    fn get(&self, key: Key) -> Result<Option<Arc<Entry>>, CacheError> {
        if !self.exists(key)? {
            return Ok(None);
        }

        // Nothing is locked here; `remove` may run to completion.
        if let Some(hook) = &self.race_window {
            hook(key);
        }

        let map = self.map.read();
        match map.get(&key) {
            Some(entry) => Ok(Some(Arc::clone(entry))),
            None => Err(CacheError::MissingKey(key)),
        }
    }

    fn remove(&self, key: Key) -> Result<(), CacheError> {
        self.map.write().remove(&key);
        Ok(())
    }

    fn count(&self) -> Result<usize, CacheError> {
        Ok(self.map.read().len())
    }

    fn variant(&self) -> CacheVariant {
        CacheVariant::Naive
    }
}
