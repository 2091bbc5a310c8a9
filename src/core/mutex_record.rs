//! Per-mutex ownership bookkeeping
//!
//! A [`MutexRecord`] follows one mutex identity through its lock/unlock
//! events and keeps the outgoing lock-order edges of that mutex. Records
//! never emit diagnostics themselves: every transition returns an outcome
//! and the checker turns the interesting ones into diagnostics.

use fxhash::FxHashSet;

/// Arena index of a mutex record inside the lock order graph
pub type MutexIndex = usize;

/// Result of reporting a lock event to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome<T> {
    /// The mutex was free and now belongs to the thread
    Acquired,
    /// The owner locked it again; `first` is set on the first reentry ever
    Reentered { first: bool },
    /// Another thread still owns the mutex, state is left untouched
    HeldByOther(T),
}

/// Result of reporting an unlock event to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome<T> {
    /// The mutex is now free
    Released,
    /// A recursive mutex dropped one level and is still held
    StillHeld { depth: u32 },
    /// The mutex was not locked
    NotLocked,
    /// The mutex is owned by another thread, state is left untouched
    NotOwner(T),
}

impl<T> UnlockOutcome<T> {
    /// Whether the record accepted the unlock as coming from the owner
    pub fn is_valid(&self) -> bool {
        matches!(self, UnlockOutcome::Released | UnlockOutcome::StillHeld { .. })
    }
}

/// State of one mutex identity
#[derive(Debug)]
pub struct MutexRecord<M, T> {
    id: M,
    locked: bool,
    owner: Option<T>,
    depth: u32,
    recursive: bool,
    /// Mutexes that were locked while this one was held. Only ever grows.
    pub(crate) edges: FxHashSet<MutexIndex>,
}

impl<M: Copy, T: Copy + Eq> MutexRecord<M, T> {
    pub fn new(id: M) -> Self {
        MutexRecord {
            id,
            locked: false,
            owner: None,
            depth: 0,
            recursive: false,
            edges: FxHashSet::default(),
        }
    }

    pub fn id(&self) -> M {
        self.id
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn owner(&self) -> Option<T> {
        self.owner
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Whether `thread` currently owns this mutex
    pub fn is_held_by(&self, thread: T) -> bool {
        self.locked && self.owner == Some(thread)
    }

    pub fn on_lock(&mut self, thread: T) -> LockOutcome<T> {
        if !self.locked {
            self.locked = true;
            self.owner = Some(thread);
            self.depth = 1;
            return LockOutcome::Acquired;
        }

        match self.owner {
            Some(owner) if owner == thread => {
                let first = !self.recursive;
                self.recursive = true;
                self.depth += 1;
                LockOutcome::Reentered { first }
            }
            Some(owner) => LockOutcome::HeldByOther(owner),
            // locked implies an owner; treat a missing one as a fresh acquisition
            None => {
                self.owner = Some(thread);
                self.depth = 1;
                LockOutcome::Acquired
            }
        }
    }

    pub fn on_unlock(&mut self, thread: T) -> UnlockOutcome<T> {
        if !self.locked {
            return UnlockOutcome::NotLocked;
        }
        if let Some(owner) = self.owner
            && owner != thread
        {
            return UnlockOutcome::NotOwner(owner);
        }

        if self.recursive {
            self.depth = self.depth.saturating_sub(1);
        } else {
            self.depth = 0;
        }

        if self.depth == 0 {
            self.locked = false;
            self.owner = None;
            UnlockOutcome::Released
        } else {
            UnlockOutcome::StillHeld { depth: self.depth }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_unlock_cycle() {
        let mut record: MutexRecord<usize, usize> = MutexRecord::new(10);
        assert_eq!(record.on_lock(1), LockOutcome::Acquired);
        assert!(record.is_held_by(1));
        assert_eq!(record.depth(), 1);

        assert_eq!(record.on_unlock(1), UnlockOutcome::Released);
        assert!(!record.is_locked());
        assert_eq!(record.owner(), None);
        assert_eq!(record.depth(), 0);
    }

    #[test]
    fn test_reentry_marks_recursive_once() {
        let mut record: MutexRecord<usize, usize> = MutexRecord::new(10);
        record.on_lock(1);
        assert_eq!(record.on_lock(1), LockOutcome::Reentered { first: true });
        assert_eq!(record.on_lock(1), LockOutcome::Reentered { first: false });
        assert!(record.is_recursive());
        assert_eq!(record.depth(), 3);

        assert_eq!(record.on_unlock(1), UnlockOutcome::StillHeld { depth: 2 });
        assert_eq!(record.on_unlock(1), UnlockOutcome::StillHeld { depth: 1 });
        assert_eq!(record.on_unlock(1), UnlockOutcome::Released);
        assert_eq!(record.on_unlock(1), UnlockOutcome::NotLocked);
    }

    #[test]
    fn test_other_thread_leaves_state_alone() {
        let mut record: MutexRecord<usize, usize> = MutexRecord::new(10);
        record.on_lock(1);

        assert_eq!(record.on_lock(2), LockOutcome::HeldByOther(1));
        assert_eq!(record.on_unlock(2), UnlockOutcome::NotOwner(1));
        assert!(record.is_held_by(1));
        assert_eq!(record.depth(), 1);
        assert!(!record.is_recursive());
    }

    #[test]
    fn test_unlocked_invariant_holds_after_errors() {
        let mut record: MutexRecord<usize, usize> = MutexRecord::new(10);
        assert_eq!(record.on_unlock(3), UnlockOutcome::NotLocked);
        assert!(!record.is_locked());
        assert_eq!(record.owner(), None);
        assert_eq!(record.depth(), 0);
    }
}
