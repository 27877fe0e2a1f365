use std::fmt;

/// Key type used by every cache in this crate.
pub type Key = u32;

/// An immutable cache value keyed by an integer identifier.
///
/// Entries are created once at population time and handed out as
/// `Arc<Entry>`, so every reader shares the same read-only view. Nothing in
/// the crate mutates an entry after it has been inserted.
///
/// # Fields
///
/// * `key` - The identifier the entry is stored under
/// * `name` - Display name used in narration and reports
///
/// # Examples
///
/// ```
/// use lockrace_core::Entry;
///
/// let entry = Entry::new(10, "ten");
/// assert_eq!(entry.key(), 10);
/// assert_eq!(entry.name(), "ten");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    key: Key,
    name: String,
}

impl Entry {
    pub fn new(key: Key, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
        }
    }

    /// Creates the entry the stress harness populates for `key`: its name is
    /// the decimal rendering of the key, so names are distinct per key.
    pub fn numbered(key: Key) -> Self {
        Self::new(key, key.to_string())
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.key, self.name)
    }
}
