//! Destinations for diagnostics
//!
//! The checker is handed a [`DiagnosticSink`] at construction and pushes
//! every finding into it. Sinks must never call back into the checker.

use crate::core::diagnostic::{Diagnostic, DiagnosticKind};
use crate::core::transport::Transport;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::mpsc::{Sender, channel};
use std::thread::{self, JoinHandle};

/// Receiver of checker diagnostics
pub trait DiagnosticSink<M, T>: Send {
    /// Accept one diagnostic. Must not block for long and must not fail.
    fn report(&self, diagnostic: Diagnostic<M, T>);
}

impl<M, T, S> DiagnosticSink<M, T> for Arc<S>
where
    S: DiagnosticSink<M, T> + Sync + ?Sized,
{
    fn report(&self, diagnostic: Diagnostic<M, T>) {
        (**self).report(diagnostic);
    }
}

impl<M, T, S> DiagnosticSink<M, T> for Box<S>
where
    S: DiagnosticSink<M, T> + ?Sized,
{
    fn report(&self, diagnostic: Diagnostic<M, T>) {
        (**self).report(diagnostic);
    }
}

/// Writes human-readable diagnostics to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl<M: Debug, T: Debug> DiagnosticSink<M, T> for ConsoleSink {
    fn report(&self, diagnostic: Diagnostic<M, T>) {
        eprintln!("{diagnostic}");
    }
}

/// Keeps every diagnostic in memory
pub struct MemorySink<M, T> {
    diagnostics: Mutex<Vec<Diagnostic<M, T>>>,
}

impl<M, T> Default for MemorySink<M, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, T> MemorySink<M, T> {
    pub fn new() -> Self {
        MemorySink {
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Remove and return everything collected so far
    pub fn take(&self) -> Vec<Diagnostic<M, T>> {
        std::mem::take(&mut *self.diagnostics.lock())
    }

    /// Kinds of the collected diagnostics, in arrival order
    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.diagnostics.lock().iter().map(|d| d.kind).collect()
    }

    /// How many collected diagnostics are of `kind`
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics
            .lock()
            .iter()
            .filter(|d| d.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.lock().is_empty()
    }
}

impl<M: Clone, T: Clone> MemorySink<M, T> {
    /// Copy of everything collected so far
    pub fn snapshot(&self) -> Vec<Diagnostic<M, T>> {
        self.diagnostics.lock().clone()
    }
}

impl<M: Send, T: Send> DiagnosticSink<M, T> for MemorySink<M, T> {
    fn report(&self, diagnostic: Diagnostic<M, T>) {
        self.diagnostics.lock().push(diagnostic);
    }
}

/// Runs a user callback for each diagnostic on a background thread
///
/// The reporting thread only pushes into a channel, so a slow or blocking
/// callback never stalls the instrumented program while it holds the
/// checker lock.
pub struct CallbackSink<M, T> {
    /// Channel sender for transmitting diagnostics
    sender: Sender<Diagnostic<M, T>>,
    /// Background thread handle
    _thread_handle: JoinHandle<()>,
}

impl<M: Send + 'static, T: Send + 'static> CallbackSink<M, T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Diagnostic<M, T>) + Send + 'static,
    {
        let (tx, rx) = channel::<Diagnostic<M, T>>();

        // Background thread listens for diagnostics and executes the callback
        let thread_handle = thread::spawn(move || {
            while let Ok(diagnostic) = rx.recv() {
                callback(diagnostic);
            }
        });

        CallbackSink {
            sender: tx,
            _thread_handle: thread_handle,
        }
    }
}

impl<M: Send, T: Send> DiagnosticSink<M, T> for CallbackSink<M, T> {
    fn report(&self, diagnostic: Diagnostic<M, T>) {
        // Events are dropped if the dispatcher thread is gone
        let _ = self.sender.send(diagnostic);
    }
}

/// Serializes each diagnostic to JSON and hands the bytes to a transport
pub struct TransportSink<Tr> {
    transport: Tr,
}

impl<Tr: Transport> TransportSink<Tr> {
    pub fn new(transport: Tr) -> Self {
        TransportSink { transport }
    }

    pub fn transport(&self) -> &Tr {
        &self.transport
    }
}

impl<M: Serialize, T: Serialize, Tr: Transport> DiagnosticSink<M, T> for TransportSink<Tr> {
    fn report(&self, diagnostic: Diagnostic<M, T>) {
        match serde_json::to_vec(&diagnostic) {
            Ok(bytes) => self.transport.send(&bytes),
            Err(e) => eprintln!("Failed to serialize diagnostic: {e:?}"),
        }
    }
}

/// Sends every diagnostic to two sinks
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A, B> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Tee { first, second }
    }
}

impl<M: Clone, T: Clone, A, B> DiagnosticSink<M, T> for Tee<A, B>
where
    A: DiagnosticSink<M, T>,
    B: DiagnosticSink<M, T>,
{
    fn report(&self, diagnostic: Diagnostic<M, T>) {
        self.first.report(diagnostic.clone());
        self.second.report(diagnostic);
    }
}
