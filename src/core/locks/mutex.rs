use crate::core::detector;
use crate::core::locks::NEXT_LOCK_ID;
use crate::core::types::{LockId, ThreadId, get_current_thread_id};
use parking_lot::{Mutex as ParkingLotMutex, MutexGuard as ParkingLotMutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;

/// A wrapper around a mutex that reports lock operations to the lock order checker
///
/// The Mutex provides the same interface as a standard mutex but reports every
/// acquisition and release to the global detector, which records the order in
/// which mutexes are taken and warns about orderings that could deadlock.
///
/// # Example
///
/// ```rust
/// use lockcheck::Mutex;
/// use std::sync::Arc;
/// use std::thread;
///
/// let mutex = Arc::new(Mutex::new(42));
/// let mutex_clone = Arc::clone(&mutex);
///
/// // Use it just like a regular mutex
/// let handle = thread::spawn(move || {
///     let mut data = mutex.lock();
///     *data += 1;
/// });
/// handle.join().unwrap();
///
/// let mut data = mutex_clone.lock();
/// *data += 10;
/// assert_eq!(*data, 53);
/// ```
pub struct Mutex<T> {
    /// Unique identifier for this mutex
    id: LockId,
    /// The wrapped mutex
    inner: ParkingLotMutex<T>,
}

/// Guard for a Mutex, reports lock release when dropped
///
/// Guards may be dropped in any order; releasing an outer mutex before an
/// inner one is tracked correctly.
pub struct MutexGuard<'a, T> {
    /// Thread that owns this guard
    thread_id: ThreadId,
    /// Lock that this guard is for
    lock_id: LockId,
    /// The inner MutexGuard
    guard: ParkingLotMutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    /// Create a new Mutex with an automatically assigned ID
    ///
    /// # Example
    ///
    /// ```rust
    /// use lockcheck::Mutex;
    ///
    /// let mutex = Mutex::new(42);
    /// ```
    pub fn new(value: T) -> Self {
        Mutex {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::SeqCst),
            inner: ParkingLotMutex::new(value),
        }
    }

    /// Get the ID of this mutex
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Acquire the lock, reporting the acquisition once it is held
    ///
    /// # Example
    ///
    /// ```rust
    /// use lockcheck::Mutex;
    ///
    /// let mutex = Mutex::new(42);
    /// {
    ///     let guard = mutex.lock();
    ///     assert_eq!(*guard, 42);
    /// } // lock is automatically released when guard goes out of scope
    /// ```
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let thread_id = get_current_thread_id();
        let guard = self.inner.lock();

        detector::on_lock_acquired(thread_id, self.id);
        MutexGuard {
            thread_id,
            lock_id: self.id,
            guard,
        }
    }

    /// Try to acquire the lock without blocking
    ///
    /// Only successful attempts are reported.
    ///
    /// # Returns
    /// Some(MutexGuard) if the lock was acquired, None if the lock was already held
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let thread_id = get_current_thread_id();

        let guard = self.inner.try_lock()?;
        detector::on_lock_acquired(thread_id, self.id);
        Some(MutexGuard {
            thread_id,
            lock_id: self.id,
            guard,
        })
    }

    /// Consumes this mutex, returning the underlying data
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Returns a mutable reference to the underlying data
    ///
    /// Since this call borrows the Mutex mutably, no actual locking needs to
    /// take place – the mutable borrow statically guarantees no locks exist.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.deref_mut()
    }
}

impl<T> MutexGuard<'_, T> {
    /// ID of the mutex this guard protects
    pub fn lock_id(&self) -> LockId {
        self.lock_id
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // Report before the inner guard is dropped and the mutex is released
        detector::on_lock_release(self.thread_id, self.lock_id);
    }
}

impl<T: Default> Default for Mutex<T> {
    /// Creates a `Mutex<T>`, with the Default value for T
    fn default() -> Mutex<T> {
        Mutex::new(Default::default())
    }
}

impl<T> From<T> for Mutex<T> {
    /// Creates a new mutex in an unlocked state ready for use
    /// This is equivalent to Mutex::new
    fn from(t: T) -> Self {
        Mutex::new(t)
    }
}
