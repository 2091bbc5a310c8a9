//! Graph module for lock order checking
//!
//! The lock order graph records, for every mutex, which other mutexes were
//! locked while it was held, and reports every cycle as a possible deadlock.

pub(crate) mod lock_order_graph;

pub use lock_order_graph::LockOrderGraph;
