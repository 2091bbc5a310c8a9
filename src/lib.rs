//! # lockcheck
//!
//! A runtime lock-order checker.
//!
//! lockcheck watches mutexes being locked and unlocked and remembers, for
//! every mutex, which other mutexes were taken while it was held. As soon as
//! two code paths take the same mutexes in opposite order it reports a
//! possible deadlock, even if the program never actually hangs.
//!
//! ## Features
//!
//! - Lock order cycle detection over an incrementally built graph
//! - Correct tracking of locks released out of acquisition order
//! - Ownership checks (recursive locking, foreign and double unlocks)
//! - Pluggable diagnostic sinks, JSON transport and event logging
//! - Offline replay of recorded logs
//! - Cross-language support through FFI
//! - Tracked mutex implementation for Rust
//!
//! ## Example
//!
//! ```rust
//! use lockcheck::{Checker, DiagnosticKind, MemorySink};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let mut checker = Checker::new(Arc::clone(&sink));
//!
//! // Thread 1 takes A then B
//! checker.on_lock("A", 1);
//! checker.on_lock("B", 1);
//! checker.on_unlock("B", 1);
//! checker.on_unlock("A", 1);
//!
//! // Thread 2 takes B then A
//! checker.on_lock("B", 2);
//! checker.on_lock("A", 2);
//!
//! assert_eq!(sink.kinds(), vec![DiagnosticKind::PossibleDeadlock]);
//! ```

mod core;
pub use core::{
    CallbackSink, Checker, ConsoleSink, Diagnostic, DiagnosticKind, DiagnosticSink, LocalTransport,
    LockCheck, MemorySink, Mutex, MutexGuard, Severity, Tee, Transport, TransportSink,
    detector::{current_log_file, flush_global_detector_logs, with_checker},
    graph::LockOrderGraph,
    lock_stack::{LockStackTrie, NodeId, StackError},
    logger::{EventLogger, LogEntry, LogRecord, LogSink},
    mutex_record::{LockOutcome, MutexIndex, MutexRecord, UnlockOutcome},
    on_lock_acquired, on_lock_release,
    replay::{ReplaySummary, replay_log, replay_records},
    types::{Events, Identity, LockId, ThreadId, get_current_thread_id},
};

pub mod ffi;

const BANNER: &str = r#"
  ▖   ▄▖▄▖▖▖  ▄▖▖▖▄▖▄▖▖▖
  ▌   ▌▌▌ ▙▘  ▌ ▙▌▙▖▌ ▙▘
  ▙▖  ▙▌▙▖▌▌  ▙▖▌▌▙▖▙▖▌▌
"#;
