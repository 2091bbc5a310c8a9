use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity of a mutex or a thread as seen by the checker
///
/// The checker never looks inside an identity: it only compares, orders and
/// hashes it. Memory addresses, numeric ids and thread ids all qualify.
pub trait Identity: Copy + Eq + Ord + Hash + Debug + Send + 'static {}

impl<X> Identity for X where X: Copy + Eq + Ord + Hash + Debug + Send + 'static {}

/// Thread identifier type
///
/// Uniquely identifies a thread in the application.
pub type ThreadId = usize;

// Global counter for assigning unique thread IDs
static THREAD_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

// Thread-local storage for each thread's assigned ID
thread_local! {
    static THREAD_ID: ThreadId = {
        // Each thread gets a unique ID once, when this is first accessed
        THREAD_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
    };
}

/// Get a unique identifier of the current thread
/// This will always return the same ID for the lifetime of the thread
pub fn get_current_thread_id() -> ThreadId {
    THREAD_ID.with(|&id| id)
}

/// Lock identifier type
///
/// Uniquely identifies a mutex in the application. Tracked mutexes get a
/// counter value, C callers pass the mutex address.
pub type LockId = usize;

/// Lock event delivered by an adapter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Events {
    /// Thread has physically acquired the lock
    Lock,
    /// Thread is about to physically release the lock
    Unlock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_thread_id_consistency() {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let id1 = get_current_thread_id();
            let id2 = get_current_thread_id();
            let id3 = get_current_thread_id();

            // All calls should return the same ID
            assert_eq!(id1, id2);
            assert_eq!(id2, id3);

            tx.send(id1).unwrap();
        });

        let thread_id = rx.recv().unwrap();
        handle.join().unwrap();

        assert_ne!(thread_id, 0);
    }

    #[test]
    fn test_thread_id_uniqueness() {
        let (tx, rx) = mpsc::channel();

        let mut handles = vec![];
        for _ in 0..10 {
            let tx = tx.clone();
            handles.push(thread::spawn(move || {
                let id = get_current_thread_id();
                tx.send(id).unwrap();
            }));
        }

        let mut ids = vec![];
        for _ in 0..10 {
            ids.push(rx.recv().unwrap());
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // Verify all IDs are unique
        let mut unique_ids = ids.clone();
        unique_ids.sort();
        unique_ids.dedup();
        assert_eq!(ids.len(), unique_ids.len());
    }

    #[test]
    fn test_events_serialize_by_name() {
        assert_eq!(serde_json::to_string(&Events::Lock).unwrap(), "\"Lock\"");
        assert_eq!(serde_json::to_string(&Events::Unlock).unwrap(), "\"Unlock\"");
    }
}
