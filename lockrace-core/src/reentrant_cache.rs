use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::entry::{Entry, Key};
use crate::error::CacheError;
use crate::keyed_cache::{CacheVariant, KeyedCache};
use crate::reentrant_lock::ReentrantRwLock;

/// A keyed cache whose `get` performs the existence check inside the read
/// section of the value read.
///
/// `get` takes one read guard and keeps it for the whole lookup. While it is
/// held it calls [`exists`](KeyedCache::exists), which nests a second read
/// guard on the same [`ReentrantRwLock`], and then reads the value through the
/// outer guard. No writer can run while any read guard is outstanding, so a
/// key that passed the existence check is still there when it is read. This
/// variant never produces [`CacheError::MissingKey`].
///
/// The price is the lock's nesting discipline: a request that would block on
/// the caller's own guards fails with [`CacheError::LockReentrancy`].
///
/// # Examples
///
/// ```
/// use lockrace_core::{Entry, KeyedCache, ReentrantLockedCache};
///
/// let cache = ReentrantLockedCache::new();
/// cache.add(1, Entry::new(1, "one")).unwrap();
/// assert_eq!(cache.get(1).unwrap().unwrap().name(), "one");
///
/// cache.remove(1).unwrap();
/// assert_eq!(cache.get(1).unwrap(), None);
/// ```
#[derive(Debug, Default)]
pub struct ReentrantLockedCache {
    map: ReentrantRwLock<HashMap<Key, Arc<Entry>>>,
}

impl ReentrantLockedCache {
    pub fn new() -> Self {
        Self {
            map: ReentrantRwLock::new(HashMap::new()),
        }
    }

    /// Exposes the lock so callers can compose their own nested sections.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockrace_core::{CacheError, Entry, KeyedCache, ReentrantLockedCache};
    ///
    /// let cache = ReentrantLockedCache::new();
    /// cache.add(1, Entry::numbered(1)).unwrap();
    ///
    /// let map = cache.lock().read().unwrap();
    /// assert!(cache.exists(1).unwrap());
    /// assert!(matches!(cache.remove(1), Err(CacheError::LockReentrancy(_))));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn lock(&self) -> &ReentrantRwLock<HashMap<Key, Arc<Entry>>> {
        &self.map
    }
}

impl KeyedCache for ReentrantLockedCache {
    fn exists(&self, key: Key) -> Result<bool, CacheError> {
        Ok(self.map.read()?.contains_key(&key))
    }

    fn add(&self, key: Key, entry: Entry) -> Result<(), CacheError> {
        let mut map = self.map.write()?;
        match map.entry(key) {
            MapEntry::Occupied(_) => Err(CacheError::DuplicateKey(key)),
            MapEntry::Vacant(slot) => {
                slot.insert(Arc::new(entry));
                Ok(())
            }
        }
    }

    fn get(&self, key: Key) -> Result<Option<Arc<Entry>>, CacheError> {
        let map = self.map.read()?;
        if !self.exists(key)? {
            return Ok(None);
        }
        match map.get(&key) {
            Some(entry) => Ok(Some(Arc::clone(entry))),
            None => Err(CacheError::MissingKey(key)),
        }
    }

    fn remove(&self, key: Key) -> Result<(), CacheError> {
        self.map.write()?.remove(&key);
        Ok(())
    }

    fn count(&self) -> Result<usize, CacheError> {
        Ok(self.map.read()?.len())
    }

    fn variant(&self) -> CacheVariant {
        CacheVariant::Reentrant
    }
}
