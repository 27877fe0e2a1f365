use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::thread::{self, ThreadId};

use crate::error::ReentrancyViolation;

/// Default bound on how deeply one thread may nest read guards.
pub const DEFAULT_MAX_READ_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hold {
    Read(usize),
    Write,
}

/// A reader-writer lock that lets a thread nest read access on itself.
///
/// A plain `RwLock` deadlocks when a thread that already holds a read guard
/// asks for another one while a writer is queued, and always deadlocks when a
/// thread asks for exclusive access it cannot get because of its own read
/// guard. This lock records what each thread holds and:
///
/// - grants nested read access through `parking_lot`'s `read_recursive`, which
///   does not queue behind waiting writers
/// - refuses every request that would block on the calling thread's own
///   guards, returning a [`ReentrancyViolation`] instead of deadlocking
///
/// Release is tied to guard drop, so acquire and release counts always match.
/// Guards are `!Send`; a hold is always released on the thread that took it.
///
/// # Hold Table
///
/// Per-thread hold state lives in a `DashMap<ThreadId, _>`. Only the owning
/// thread ever writes its own slot, so the check-then-register sequence in
/// `read`/`write` cannot race with another thread.
///
/// # Examples
///
/// ```
/// use lockrace_core::{ReentrancyViolation, ReentrantRwLock};
///
/// let lock = ReentrantRwLock::new(5);
/// let outer = lock.read().unwrap();
/// let inner = lock.read().unwrap();
/// assert_eq!(*outer + *inner, 10);
/// assert_eq!(lock.read_depth(), 2);
///
/// assert_eq!(
///     lock.write().unwrap_err(),
///     ReentrancyViolation::WriteWhileReading { depth: 2 }
/// );
/// ```
pub struct ReentrantRwLock<T> {
    inner: RwLock<T>,
    holders: DashMap<ThreadId, Hold>,
    max_read_depth: usize,
}

impl<T> ReentrantRwLock<T> {
    pub fn new(value: T) -> Self {
        Self::with_max_read_depth(value, DEFAULT_MAX_READ_DEPTH)
    }

    /// Creates a lock that refuses read nesting deeper than `max_read_depth`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockrace_core::{ReentrancyViolation, ReentrantRwLock};
    ///
    /// let lock = ReentrantRwLock::with_max_read_depth((), 1);
    /// let _outer = lock.read().unwrap();
    /// assert_eq!(
    ///     lock.read().unwrap_err(),
    ///     ReentrancyViolation::DepthExceeded { max: 1 }
    /// );
    /// ```
    pub fn with_max_read_depth(value: T, max_read_depth: usize) -> Self {
        Self {
            inner: RwLock::new(value),
            holders: DashMap::new(),
            max_read_depth,
        }
    }

    /// Acquires shared access, nesting on any read guard this thread holds.
    ///
    /// The first guard a thread takes queues fairly behind waiting writers.
    /// Nested guards do not, since the outer guard already keeps every writer
    /// out.
    ///
    /// # Errors
    ///
    /// - [`ReentrancyViolation::ReadWhileWriting`] if this thread holds the
    ///   write guard
    /// - [`ReentrancyViolation::DepthExceeded`] if this thread already holds
    ///   the maximum number of nested read guards
    ///
    /// # Examples
    ///
    /// ```
    /// use lockrace_core::ReentrantRwLock;
    ///
    /// let lock = ReentrantRwLock::new(vec![1, 2, 3]);
    /// {
    ///     let outer = lock.read().unwrap();
    ///     let inner = lock.read().unwrap();
    ///     assert_eq!(outer.len(), inner.len());
    ///     assert_eq!(lock.read_depth(), 2);
    /// }
    /// assert_eq!(lock.read_depth(), 0);
    /// ```
    pub fn read(&self) -> Result<ReentrantReadGuard<'_, T>, ReentrancyViolation> {
        let thread = thread::current().id();
        let depth = match self.hold_of(thread) {
            Some(Hold::Write) => return Err(ReentrancyViolation::ReadWhileWriting),
            Some(Hold::Read(depth)) => depth,
            None => 0,
        };
        if depth >= self.max_read_depth {
            return Err(ReentrancyViolation::DepthExceeded {
                max: self.max_read_depth,
            });
        }

        let guard = if depth == 0 {
            self.inner.read()
        } else {
            self.inner.read_recursive()
        };
        self.holders.insert(thread, Hold::Read(depth + 1));

        Ok(ReentrantReadGuard {
            lock: self,
            thread,
            guard,
        })
    }

    /// Acquires exclusive access.
    ///
    /// Fails if this thread already holds the lock in either mode.
    ///
    /// # Examples
    ///
    /// ```
    /// use lockrace_core::{ReentrancyViolation, ReentrantRwLock};
    ///
    /// let lock = ReentrantRwLock::new(0);
    /// *lock.write().unwrap() += 1;
    ///
    /// let reading = lock.read().unwrap();
    /// assert_eq!(*reading, 1);
    /// assert_eq!(
    ///     lock.write().unwrap_err(),
    ///     ReentrancyViolation::WriteWhileReading { depth: 1 }
    /// );
    /// ```
    pub fn write(&self) -> Result<ReentrantWriteGuard<'_, T>, ReentrancyViolation> {
        let thread = thread::current().id();
        match self.hold_of(thread) {
            Some(Hold::Read(depth)) => {
                return Err(ReentrancyViolation::WriteWhileReading { depth })
            }
            Some(Hold::Write) => return Err(ReentrancyViolation::WriteWhileWriting),
            None => {}
        }

        let guard = self.inner.write();
        self.holders.insert(thread, Hold::Write);

        Ok(ReentrantWriteGuard {
            lock: self,
            thread,
            guard,
        })
    }

    /// Number of read guards the calling thread currently holds.
    pub fn read_depth(&self) -> usize {
        match self.hold_of(thread::current().id()) {
            Some(Hold::Read(depth)) => depth,
            _ => 0,
        }
    }

    /// Returns true if the calling thread holds exclusive access.
    pub fn is_write_held_by_current(&self) -> bool {
        self.hold_of(thread::current().id()) == Some(Hold::Write)
    }

    /// Number of threads currently holding the lock in any mode.
    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    fn hold_of(&self, thread: ThreadId) -> Option<Hold> {
        // Copy out so the shard guard is released before any insert.
        self.holders.get(&thread).map(|hold| *hold)
    }

    fn release_read(&self, thread: ThreadId) {
        match self.hold_of(thread) {
            Some(Hold::Read(depth)) if depth > 1 => {
                self.holders.insert(thread, Hold::Read(depth - 1));
            }
            _ => {
                self.holders.remove(&thread);
            }
        }
    }

    fn release_write(&self, thread: ThreadId) {
        self.holders.remove(&thread);
    }
}

impl<T: Default> Default for ReentrantRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for ReentrantRwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantRwLock")
            .field("holders", &self.holders.len())
            .field("max_read_depth", &self.max_read_depth)
            .finish()
    }
}

/// Shared access to a [`ReentrantRwLock`]. Dropping it releases one level
/// of nesting.
pub struct ReentrantReadGuard<'a, T> {
    lock: &'a ReentrantRwLock<T>,
    thread: ThreadId,
    guard: RwLockReadGuard<'a, T>,
}

impl<T> Deref for ReentrantReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: fmt::Debug> fmt::Debug for ReentrantReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Drop for ReentrantReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read(self.thread);
    }
}

/// Exclusive access to a [`ReentrantRwLock`].
pub struct ReentrantWriteGuard<'a, T> {
    lock: &'a ReentrantRwLock<T>,
    thread: ThreadId,
    guard: RwLockWriteGuard<'a, T>,
}

impl<T> Deref for ReentrantWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for ReentrantWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: fmt::Debug> fmt::Debug for ReentrantWriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T> Drop for ReentrantWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write(self.thread);
    }
}
