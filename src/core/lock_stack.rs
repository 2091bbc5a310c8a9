//! Lock-stack trie
//!
//! Every path from the root to a node spells out a sequence of locks that
//! some thread held at some point, outermost first. A thread's current stack
//! is just a cursor into the trie, so threads taking the same locks in the
//! same order end up on the very same node.
//!
//! Nodes are kept in an arena and never removed: the trie is a cache of
//! observed sequences, the live part is only what the cursors point at.
//!
//! Unlocking the innermost lock moves the cursor to its parent. Unlocking a
//! lock deeper in the stack re-derives the position of the remaining locks
//! under the node that existed before the released lock was taken
//! ("branching"), reusing nodes wherever the sequence was seen before.

use fxhash::FxHashMap;
use std::hash::Hash;
use thiserror::Error;

/// Arena index of a trie node
pub type NodeId = usize;

/// Errors of the lock-stack trie
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// Pop on the root, nothing is held
    #[error("lock stack is empty")]
    Empty,
    /// The lock does not appear anywhere on the stack
    #[error("lock is not on the stack")]
    NotHeld,
}

#[derive(Debug)]
struct TrieNode<K> {
    /// None only for the root
    lock: Option<K>,
    parent: Option<NodeId>,
    children: FxHashMap<K, NodeId>,
}

/// Shared trie of lock acquisition sequences
#[derive(Debug)]
pub struct LockStackTrie<K> {
    nodes: Vec<TrieNode<K>>,
}

const ROOT: NodeId = 0;

impl<K: Copy + Eq + Hash> LockStackTrie<K> {
    /// Create a trie holding only the empty stack
    pub fn new() -> Self {
        LockStackTrie {
            nodes: vec![TrieNode {
                lock: None,
                parent: None,
                children: FxHashMap::default(),
            }],
        }
    }

    /// The node for "nothing held"
    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Innermost lock of the stack at `node`, None for the root
    pub fn lock_at(&self, node: NodeId) -> Option<K> {
        self.nodes[node].lock
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Number of locks on the stack at `node`
    pub fn depth(&self, node: NodeId) -> usize {
        self.ancestors(node).count()
    }

    /// Locks on the stack at `node`, outermost first
    pub fn stack(&self, node: NodeId) -> Vec<K> {
        let mut locks: Vec<K> = self
            .ancestors(node)
            .filter_map(|n| self.nodes[n].lock)
            .collect();
        locks.reverse();
        locks
    }

    /// Whether `lock` is anywhere on the stack at `node`
    pub fn contains(&self, node: NodeId, lock: K) -> bool {
        self.ancestors(node).any(|n| self.nodes[n].lock == Some(lock))
    }

    /// Stack at `cursor` with `lock` taken on top
    pub fn push(&mut self, cursor: NodeId, lock: K) -> NodeId {
        if let Some(&child) = self.nodes[cursor].children.get(&lock) {
            return child;
        }
        self.add_child(cursor, lock)
    }

    /// Stack at `cursor` with `lock` released, wherever it sits
    ///
    /// Releasing the innermost lock returns the parent. Releasing a deeper
    /// lock keeps the locks above it in their original order on top of the
    /// stack that existed before it was taken. When the lock appears more
    /// than once, the innermost occurrence is released.
    pub fn pop(&mut self, cursor: NodeId, lock: K) -> Result<NodeId, StackError> {
        if cursor == ROOT {
            return Err(StackError::Empty);
        }

        let node = &self.nodes[cursor];
        if node.lock == Some(lock) {
            return node.parent.ok_or(StackError::Empty);
        }

        // Walk up collecting the locks above the released one, innermost first
        let mut remainder = Vec::new();
        let mut current = cursor;
        loop {
            let node = &self.nodes[current];
            match (node.lock, node.parent) {
                (Some(held), Some(parent)) if held == lock => {
                    remainder.reverse();
                    return Ok(self.branch(parent, &remainder));
                }
                (Some(held), Some(parent)) => {
                    remainder.push(held);
                    current = parent;
                }
                _ => return Err(StackError::NotHeld),
            }
        }
    }

    /// Descend from `node` along `locks`, creating only the missing suffix
    pub fn branch(&mut self, node: NodeId, locks: &[K]) -> NodeId {
        let mut current = node;
        for (i, &lock) in locks.iter().enumerate() {
            match self.nodes[current].children.get(&lock) {
                Some(&child) => current = child,
                None => {
                    // Everything below a new node is new as well
                    current = self.add_child(current, lock);
                    for &rest in &locks[i + 1..] {
                        current = self.add_child(current, rest);
                    }
                    return current;
                }
            }
        }
        current
    }

    fn add_child(&mut self, parent: NodeId, lock: K) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TrieNode {
            lock: Some(lock),
            parent: Some(parent),
            children: FxHashMap::default(),
        });
        self.nodes[parent].children.insert(lock, id);
        id
    }

    /// Nodes from `node` up to, but excluding, the root
    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), move |&n| self.nodes[n].parent)
            .filter(|&n| n != ROOT)
    }
}

impl<K: Copy + Eq + Hash> Default for LockStackTrie<K> {
    fn default() -> Self {
        Self::new()
    }
}
