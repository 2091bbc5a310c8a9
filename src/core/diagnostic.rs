//! Structured diagnostics produced by the checker
//!
//! Every finding of the checker, from a harmless recursive lock up to a lock
//! ordering cycle, is described by one [`Diagnostic`]. Detection code builds
//! the value, sinks decide how to present or transport it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the checker observed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// The owning thread acquired a mutex it already holds
    RecursiveLock,
    /// A thread reported acquiring a mutex that another thread still owns
    LockedByOtherThread,
    /// Unlock of a mutex that is not locked
    UnlockNotLocked,
    /// Unlock of a mutex owned by a different thread
    UnlockFromNonOwner,
    /// Unlock of a mutex that was never locked through the checker
    UnlockUnknownMutex,
    /// Unlock from a thread whose lock stack is empty
    UnlockNothingHeld,
    /// Two acquisition paths take the same mutexes in opposite order
    PossibleDeadlock,
}

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    Deadlock,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::RecursiveLock => Severity::Warning,
            DiagnosticKind::PossibleDeadlock => Severity::Deadlock,
            _ => Severity::Error,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            DiagnosticKind::RecursiveLock => "recursive lock",
            DiagnosticKind::LockedByOtherThread => "locking a mutex owned by another thread",
            DiagnosticKind::UnlockNotLocked => "unlocking a mutex that is not locked",
            DiagnosticKind::UnlockFromNonOwner => "unlocking a mutex owned by another thread",
            DiagnosticKind::UnlockUnknownMutex => "unlocking an unknown mutex",
            DiagnosticKind::UnlockNothingHeld => "unlocking while holding no locks",
            DiagnosticKind::PossibleDeadlock => "possible deadlock",
        }
    }
}

/// A single finding of the checker
///
/// `lock_id` is the mutex the triggering event was about. For a possible
/// deadlock, `lock_order_cycle` holds the closed chain of mutexes, starting
/// and ending with the mutex that was held when the new edge was recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic<M, T> {
    /// What happened
    pub kind: DiagnosticKind,
    /// Thread that delivered the triggering event
    pub thread_id: T,
    /// Mutex the triggering event was about
    pub lock_id: M,
    /// Owner of the mutex at the time, when someone else owned it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<T>,
    /// Full ordering chain, only for possible deadlocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_order_cycle: Option<Vec<M>>,
    /// ISO-8601 timestamp of when the diagnostic was produced
    pub timestamp: String,
}

impl<M, T> Diagnostic<M, T> {
    pub fn new(kind: DiagnosticKind, thread_id: T, lock_id: M) -> Self {
        Diagnostic {
            kind,
            thread_id,
            lock_id,
            owner: None,
            lock_order_cycle: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_owner(mut self, owner: T) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_cycle(mut self, cycle: Vec<M>) -> Self {
        self.lock_order_cycle = Some(cycle);
        self
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl<M: fmt::Debug, T: fmt::Debug> fmt::Display for Diagnostic<M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity() {
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
            Severity::Deadlock => "DEADLOCK",
        };
        write!(
            f,
            "[{tag}] {}: mutex {:?}, thread {:?}",
            self.kind.describe(),
            self.lock_id,
            self.thread_id
        )?;
        if let Some(owner) = &self.owner {
            write!(f, ", owned by thread {owner:?}")?;
        }
        if let Some(cycle) = &self.lock_order_cycle {
            let chain = cycle
                .iter()
                .map(|lock| format!("{lock:?}"))
                .collect::<Vec<_>>()
                .join(" -> ");
            write!(f, ", lock order cycle: {chain}")?;
        }
        Ok(())
    }
}
