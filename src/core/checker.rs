//! Lock order checker
//!
//! The [`Checker`] ties the lock order graph and the lock-stack trie
//! together. It is fed `(mutex, thread)` lock and unlock events in the order
//! they happened on each thread and reports its findings to a sink.
//!
//! # How it works
//!
//! 1. Each thread has a cursor into the shared lock-stack trie, pointing at
//!    the sequence of locks it currently holds.
//! 2. On lock, the innermost held mutex gets an edge to the new one in the
//!    lock order graph, which reports a possible deadlock if that edge closes
//!    a cycle. The cursor then moves to the child node for the new mutex.
//! 3. On unlock, the cursor moves to the node for the remaining locks, which
//!    may require re-branching when the released mutex is not the innermost.
//!
//! The checker itself is not synchronized; callers serialize events (see
//! the global detector).

use crate::core::diagnostic::{Diagnostic, DiagnosticKind};
use crate::core::graph::LockOrderGraph;
use crate::core::lock_stack::{LockStackTrie, NodeId};
use crate::core::mutex_record::{LockOutcome, MutexIndex, UnlockOutcome};
use crate::core::sink::DiagnosticSink;
use crate::core::types::Identity;
use fxhash::FxHashMap;

/// Lock order checker over mutex identities `M` and thread identities `T`
pub struct Checker<M, T> {
    /// Mutex records and the edges between them
    graph: LockOrderGraph<M, T>,
    /// Shared cache of held-lock sequences, keyed by record index
    trie: LockStackTrie<MutexIndex>,
    /// Current position of each thread in the trie
    cursors: FxHashMap<T, NodeId>,
    /// Where diagnostics go
    sink: Box<dyn DiagnosticSink<M, T>>,
}

impl<M: Identity, T: Identity> Checker<M, T> {
    /// Create a checker reporting to `sink`
    pub fn new<S>(sink: S) -> Self
    where
        S: DiagnosticSink<M, T> + 'static,
    {
        Checker {
            graph: LockOrderGraph::new(),
            trie: LockStackTrie::new(),
            cursors: FxHashMap::default(),
            sink: Box::new(sink),
        }
    }

    /// Replace the sink, keeping all recorded state
    pub fn set_sink<S>(&mut self, sink: S)
    where
        S: DiagnosticSink<M, T> + 'static,
    {
        self.sink = Box::new(sink);
    }

    /// Register that `thread` has acquired `mutex`
    ///
    /// # Arguments
    /// * `mutex` - Identity of the acquired mutex
    /// * `thread` - Identity of the acquiring thread
    pub fn on_lock(&mut self, mutex: M, thread: T) {
        let idx = self.graph.intern(mutex);
        let root = self.trie.root();
        let cursor = *self.cursors.entry(thread).or_insert(root);
        let previous = self.trie.lock_at(cursor);

        let outcome = self.graph.record_mut(idx).on_lock(thread);
        match outcome {
            LockOutcome::Acquired => {}
            LockOutcome::Reentered { first } => {
                if first {
                    self.emit(Diagnostic::new(DiagnosticKind::RecursiveLock, thread, mutex));
                }
            }
            LockOutcome::HeldByOther(owner) => {
                self.emit(
                    Diagnostic::new(DiagnosticKind::LockedByOtherThread, thread, mutex)
                        .with_owner(owner),
                );
            }
        }

        if let Some(prev) = previous
            && let Some(cycle) = self.graph.link(prev, idx)
        {
            self.emit(
                Diagnostic::new(DiagnosticKind::PossibleDeadlock, thread, mutex).with_cycle(cycle),
            );
        }

        let next = self.trie.push(cursor, idx);
        self.cursors.insert(thread, next);
    }

    /// Register that `thread` is about to release `mutex`
    ///
    /// # Panics
    /// Panics when the mutex accepted the unlock as coming from its owner but
    /// the thread's lock stack does not contain it. That means the checker's
    /// own bookkeeping is broken and further results would be meaningless.
    pub fn on_unlock(&mut self, mutex: M, thread: T) {
        let Some(idx) = self.graph.lookup(mutex) else {
            self.emit(Diagnostic::new(DiagnosticKind::UnlockUnknownMutex, thread, mutex));
            return;
        };

        let outcome = self.graph.record_mut(idx).on_unlock(thread);
        match outcome {
            UnlockOutcome::Released | UnlockOutcome::StillHeld { .. } => {}
            UnlockOutcome::NotLocked => {
                self.emit(Diagnostic::new(DiagnosticKind::UnlockNotLocked, thread, mutex));
            }
            UnlockOutcome::NotOwner(owner) => {
                self.emit(
                    Diagnostic::new(DiagnosticKind::UnlockFromNonOwner, thread, mutex)
                        .with_owner(owner),
                );
            }
        }

        let root = self.trie.root();
        let cursor = match self.cursors.get(&thread) {
            Some(&cursor) if cursor != root => cursor,
            _ => {
                self.emit(Diagnostic::new(DiagnosticKind::UnlockNothingHeld, thread, mutex));
                return;
            }
        };

        match self.trie.pop(cursor, idx) {
            Ok(next) => {
                self.cursors.insert(thread, next);
            }
            Err(err) if outcome.is_valid() => {
                panic!(
                    "lock stack of thread {thread:?} is out of sync with mutex {mutex:?}: {err}"
                );
            }
            // Already reported above, the thread never pushed this mutex
            Err(_) => {}
        }
    }

    fn emit(&self, diagnostic: Diagnostic<M, T>) {
        self.sink.report(diagnostic);
    }

    /// The trie node standing for "nothing held"
    pub fn root(&self) -> NodeId {
        self.trie.root()
    }

    /// Current trie position of `thread`, if it was ever seen
    pub fn cursor(&self, thread: T) -> Option<NodeId> {
        self.cursors.get(&thread).copied()
    }

    /// Mutexes currently held by `thread`, outermost first
    pub fn held_locks(&self, thread: T) -> Vec<M> {
        self.cursor(thread)
            .map(|cursor| {
                self.trie
                    .stack(cursor)
                    .into_iter()
                    .map(|idx| self.graph.record(idx).id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Mutexes that were ever locked while `mutex` was held
    pub fn successors(&self, mutex: M) -> Vec<M> {
        let mut successors = self.graph.successors(mutex);
        successors.sort();
        successors
    }

    /// Whether `after` was ever locked while `before` was held
    pub fn has_edge(&self, before: M, after: M) -> bool {
        self.graph.has_edge(before, after)
    }

    /// Number of distinct lock order edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_locked(&self, mutex: M) -> bool {
        self.graph
            .lookup(mutex)
            .is_some_and(|idx| self.graph.record(idx).is_locked())
    }

    pub fn owner(&self, mutex: M) -> Option<T> {
        self.graph
            .lookup(mutex)
            .and_then(|idx| self.graph.record(idx).owner())
    }

    /// Recursion depth of `mutex`, 0 when unlocked or unknown
    pub fn lock_depth(&self, mutex: M) -> u32 {
        self.graph
            .lookup(mutex)
            .map_or(0, |idx| self.graph.record(idx).depth())
    }

    /// Number of trie nodes, root included
    pub fn node_count(&self) -> usize {
        self.trie.len()
    }

    /// Number of distinct mutexes seen
    pub fn mutex_count(&self) -> usize {
        self.graph.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::MemorySink;
    use std::sync::Arc;

    const A: usize = 1;
    const B: usize = 2;
    const C: usize = 3;
    const D: usize = 4;

    fn checker() -> (Checker<usize, usize>, Arc<MemorySink<usize, usize>>) {
        let sink = Arc::new(MemorySink::new());
        (Checker::new(Arc::clone(&sink)), sink)
    }

    #[test]
    fn test_edges_are_not_duplicated() {
        let (mut checker, sink) = checker();
        for _ in 0..5 {
            checker.on_lock(A, 1);
            checker.on_lock(B, 1);
            checker.on_unlock(B, 1);
            checker.on_unlock(A, 1);
        }
        assert_eq!(checker.successors(A), vec![B]);
        assert_eq!(checker.edge_count(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_opposite_order_is_reported() {
        let (mut checker, sink) = checker();
        checker.on_lock(A, 1);
        checker.on_lock(B, 1);
        checker.on_unlock(B, 1);
        checker.on_unlock(A, 1);

        checker.on_lock(B, 2);
        checker.on_lock(A, 2);

        let diagnostics = sink.take();
        assert_eq!(diagnostics.len(), 1);
        let deadlock = &diagnostics[0];
        assert_eq!(deadlock.kind, DiagnosticKind::PossibleDeadlock);
        assert_eq!(deadlock.thread_id, 2);
        assert_eq!(deadlock.lock_id, A);
        assert_eq!(deadlock.lock_order_cycle, Some(vec![B, A, B]));
    }

    #[test]
    fn test_nested_unlock_returns_to_root() {
        let (mut checker, _sink) = checker();
        checker.on_lock(A, 1);
        checker.on_lock(B, 1);
        checker.on_unlock(B, 1);
        assert_eq!(checker.held_locks(1), vec![A]);
        checker.on_unlock(A, 1);
        assert_eq!(checker.cursor(1), Some(checker.root()));
    }

    #[test]
    fn test_middle_unlock_keeps_order() {
        let (mut checker, sink) = checker();
        checker.on_lock(A, 1);
        checker.on_lock(B, 1);
        checker.on_lock(C, 1);
        checker.on_unlock(B, 1);
        assert_eq!(checker.held_locks(1), vec![A, C]);

        checker.on_lock(D, 1);
        assert_eq!(checker.held_locks(1), vec![A, C, D]);
        // D was locked with C innermost
        assert!(checker.has_edge(C, D));

        checker.on_unlock(D, 1);
        checker.on_unlock(C, 1);
        checker.on_unlock(A, 1);
        assert_eq!(checker.cursor(1), Some(checker.root()));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_recursive_lock_warns_once() {
        let (mut checker, sink) = checker();
        checker.on_lock(A, 1);
        checker.on_lock(A, 1);
        checker.on_lock(A, 1);
        assert_eq!(sink.kinds(), vec![DiagnosticKind::RecursiveLock]);
        assert_eq!(checker.lock_depth(A), 3);
        assert_eq!(checker.edge_count(), 0);
    }

    #[test]
    fn test_reentry_under_other_lock_is_ordered() {
        let (mut checker, sink) = checker();
        checker.on_lock(A, 1);
        checker.on_lock(B, 1);
        checker.on_lock(A, 1);

        // B is innermost when A is taken again, which closes A -> B -> A
        assert!(checker.has_edge(A, B));
        assert!(checker.has_edge(B, A));
        let diagnostics = sink.take();
        assert_eq!(
            diagnostics.iter().map(|d| d.kind).collect::<Vec<_>>(),
            vec![DiagnosticKind::RecursiveLock, DiagnosticKind::PossibleDeadlock]
        );
        assert_eq!(diagnostics[1].lock_order_cycle, Some(vec![B, A, B]));

        checker.on_unlock(A, 1);
        assert_eq!(checker.held_locks(1), vec![A, B]);
        assert!(checker.is_locked(A));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_lock_owned_by_other_thread() {
        let (mut checker, sink) = checker();
        checker.on_lock(A, 1);
        checker.on_lock(A, 2);

        let diagnostics = sink.take();
        assert_eq!(diagnostics[0].kind, DiagnosticKind::LockedByOtherThread);
        assert_eq!(diagnostics[0].owner, Some(1));
        assert_eq!(checker.owner(A), Some(1));

        // Thread 2 still pushed it and can pop it again
        assert_eq!(checker.held_locks(2), vec![A]);
        checker.on_unlock(A, 2);
        assert_eq!(checker.held_locks(2), Vec::<usize>::new());
        assert_eq!(sink.kinds(), vec![DiagnosticKind::UnlockFromNonOwner]);
    }

    #[test]
    fn test_unknown_mutex_unlock() {
        let (mut checker, sink) = checker();
        checker.on_unlock(A, 1);
        assert_eq!(sink.kinds(), vec![DiagnosticKind::UnlockUnknownMutex]);
        assert_eq!(checker.mutex_count(), 0);
        assert_eq!(checker.cursor(1), None);
    }

    #[test]
    fn test_unlock_with_nothing_held() {
        let (mut checker, sink) = checker();
        checker.on_lock(A, 1);
        checker.on_unlock(A, 1);
        checker.on_unlock(A, 1);

        assert_eq!(
            sink.kinds(),
            vec![
                DiagnosticKind::UnlockNotLocked,
                DiagnosticKind::UnlockNothingHeld
            ]
        );
    }

    #[test]
    fn test_shared_root_and_nodes() {
        let (mut checker, _sink) = checker();
        checker.on_lock(A, 1);
        checker.on_lock(B, 1);
        checker.on_lock(A, 2);
        checker.on_lock(B, 2);

        assert_eq!(checker.cursor(1), checker.cursor(2));
        assert_eq!(checker.node_count(), 3);
    }
}
