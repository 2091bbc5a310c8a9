//! Lock Order Graph for detecting lock ordering violations
//!
//! This module implements a lock order graph that tracks the order in which locks
//! are acquired across all threads. It detects potential deadlocks by identifying
//! lock ordering violations, even when threads don't actually block.
//!
//! # How it works
//!
//! When a thread holds lock A and then acquires lock B, we record the edge A -> B
//! in the record of A. The edge is inserted first and then a depth-first search
//! looks for a way back from B to A. If one exists, some other code path takes
//! the same locks in the opposite order and the full chain is returned.
//!
//! Edges are only ever added, so each distinct pair is searched exactly once.

use crate::core::mutex_record::{MutexIndex, MutexRecord};
use fxhash::{FxHashMap, FxHashSet};

/// Lock order graph that owns every mutex record
///
/// Records live in an arena and refer to each other by [`MutexIndex`], so
/// the cyclic "held while locking" relation needs no shared ownership.
#[derive(Debug)]
pub struct LockOrderGraph<M, T> {
    /// Arena of records, indexed by `MutexIndex`
    records: Vec<MutexRecord<M, T>>,
    /// Maps a mutex identity to its record
    index: FxHashMap<M, MutexIndex>,
    /// Number of distinct edges recorded so far
    edge_count: usize,
}

impl<M, T> LockOrderGraph<M, T>
where
    M: Copy + Eq + std::hash::Hash,
    T: Copy + Eq,
{
    /// Create a new empty lock order graph
    pub fn new() -> Self {
        LockOrderGraph {
            records: Vec::new(),
            index: FxHashMap::default(),
            edge_count: 0,
        }
    }

    /// Find the record index of a mutex, creating the record on first sight
    pub fn intern(&mut self, id: M) -> MutexIndex {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.records.len();
        self.records.push(MutexRecord::new(id));
        self.index.insert(id, idx);
        idx
    }

    /// Find the record index of a mutex without creating it
    pub fn lookup(&self, id: M) -> Option<MutexIndex> {
        self.index.get(&id).copied()
    }

    pub fn record(&self, idx: MutexIndex) -> &MutexRecord<M, T> {
        &self.records[idx]
    }

    pub fn record_mut(&mut self, idx: MutexIndex) -> &mut MutexRecord<M, T> {
        &mut self.records[idx]
    }

    /// Record that `to` was locked while `from` was held
    ///
    /// # Returns
    /// `Some(chain)` when the new edge closes a cycle. The chain starts and
    /// ends with `from`: `[from, to, ..., from]`. `None` when the edge was
    /// already known, is a self edge, or closes no cycle.
    pub fn link(&mut self, from: MutexIndex, to: MutexIndex) -> Option<Vec<M>> {
        // Don't add self-edges
        if from == to {
            return None;
        }

        if !self.records[from].edges.insert(to) {
            // Known edge, it was checked when first inserted
            return None;
        }
        self.edge_count += 1;

        let path = self.find_path(to, from)?;
        let mut cycle = Vec::with_capacity(path.len() + 1);
        cycle.push(self.records[from].id());
        cycle.extend(path.into_iter().map(|idx| self.records[idx].id()));
        Some(cycle)
    }

    /// Find a path from `start` to `target` following edges depth-first
    ///
    /// # Returns
    /// The indices on the path, `start` and `target` included
    fn find_path(&self, start: MutexIndex, target: MutexIndex) -> Option<Vec<MutexIndex>> {
        if start == target {
            return Some(vec![start]);
        }

        // Early termination: nothing reachable from start
        if self.records[start].edges.is_empty() {
            return None;
        }

        let mut stack = vec![start];
        let mut visited = FxHashSet::default();
        let mut parent: FxHashMap<MutexIndex, MutexIndex> = FxHashMap::default();
        visited.insert(start);

        while let Some(current) = stack.pop() {
            for &next in &self.records[current].edges {
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, current);

                if next == target {
                    let mut path = vec![target];
                    let mut node = target;
                    while let Some(&prev) = parent.get(&node) {
                        path.push(prev);
                        node = prev;
                    }
                    path.reverse();
                    return Some(path);
                }

                stack.push(next);
            }
        }

        None
    }

    /// Check if there's an edge from `before` to `after`
    pub fn has_edge(&self, before: M, after: M) -> bool {
        match (self.lookup(before), self.lookup(after)) {
            (Some(from), Some(to)) => self.records[from].edges.contains(&to),
            _ => false,
        }
    }

    /// Identities of every mutex locked while `id` was held
    pub fn successors(&self, id: M) -> Vec<M> {
        self.lookup(id)
            .map(|idx| {
                self.records[idx]
                    .edges
                    .iter()
                    .map(|&to| self.records[to].id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of distinct edges in the graph
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of mutex records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<M, T> Default for LockOrderGraph<M, T>
where
    M: Copy + Eq + std::hash::Hash,
    T: Copy + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(ids: &[usize]) -> (LockOrderGraph<usize, usize>, Vec<MutexIndex>) {
        let mut graph = LockOrderGraph::new();
        let indices = ids.iter().map(|&id| graph.intern(id)).collect();
        (graph, indices)
    }

    #[test]
    fn test_direct_cycle() {
        let (mut graph, idx) = graph_with(&[1, 2]);

        assert!(graph.link(idx[0], idx[1]).is_none());
        let cycle = graph.link(idx[1], idx[0]).expect("Should have detected cycle");
        assert_eq!(cycle, vec![2, 1, 2]);
    }

    #[test]
    fn test_three_lock_cycle_reports_full_chain() {
        let (mut graph, idx) = graph_with(&[1, 2, 3]);

        assert!(graph.link(idx[0], idx[1]).is_none()); // 1 -> 2
        assert!(graph.link(idx[1], idx[2]).is_none()); // 2 -> 3
        let cycle = graph.link(idx[2], idx[0]).expect("3 -> 1 closes the cycle");
        assert_eq!(cycle, vec![3, 1, 2, 3]);
    }

    #[test]
    fn test_no_false_cycles() {
        let (mut graph, idx) = graph_with(&[1, 2, 3]);

        // Linear chain: A -> B -> C (no cycle)
        assert!(graph.link(idx[0], idx[1]).is_none());
        assert!(graph.link(idx[1], idx[2]).is_none());
        assert!(graph.link(idx[0], idx[2]).is_none()); // Redundant but valid
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let (mut graph, idx) = graph_with(&[1, 2]);

        for _ in 0..10 {
            assert!(graph.link(idx[0], idx[1]).is_none());
        }
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.successors(1), vec![2]);
        assert!(graph.has_edge(1, 2));
        assert!(!graph.has_edge(2, 1));
    }

    #[test]
    fn test_cycle_edge_is_kept() {
        let (mut graph, idx) = graph_with(&[1, 2]);

        graph.link(idx[0], idx[1]);
        assert!(graph.link(idx[1], idx[0]).is_some());

        // The offending edge stays recorded and is not reported twice
        assert!(graph.has_edge(2, 1));
        assert!(graph.link(idx[1], idx[0]).is_none());
    }

    #[test]
    fn test_self_edge_is_not_recorded() {
        let (mut graph, idx) = graph_with(&[1]);
        assert!(graph.link(idx[0], idx[0]).is_none());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_intern_is_stable() {
        let mut graph: LockOrderGraph<usize, usize> = LockOrderGraph::new();
        let a = graph.intern(42);
        assert_eq!(graph.intern(42), a);
        assert_eq!(graph.lookup(42), Some(a));
        assert_eq!(graph.lookup(7), None);
        assert_eq!(graph.len(), 1);
    }
}
