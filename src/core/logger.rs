//! Logger for recording lock operations and checker findings
//!
//! This module provides an efficient logging mechanism for lock and unlock
//! events and for the diagnostics they cause. Writes happen on a background
//! thread fed through a channel, so the instrumented threads only pay for a
//! channel send. Each record is one JSON line, which makes a log both
//! greppable and replayable (see [`crate::core::replay`]).

use crate::core::diagnostic::Diagnostic;
use crate::core::sink::DiagnosticSink;
use crate::core::types::{Events, LockId, ThreadId};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A single lock event as written to the log
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LogEntry {
    /// Thread that performed the action
    pub thread_id: ThreadId,
    /// Lock that was involved
    pub lock_id: LockId,
    /// Type of event that occurred
    pub event: Events,
    /// Absolute timestamp of when the event occurred (seconds since Unix Epoch)
    pub timestamp: f64,
}

/// One line of the log
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LogRecord {
    Event(LogEntry),
    Diagnostic(Diagnostic<LockId, ThreadId>),
}

/// Commands for controlling the async logger thread
#[derive(Debug)]
pub enum LoggerCommand {
    /// Write a record to the file
    Write(LogRecord),
    /// Flush all pending records to disk and signal completion
    Flush(Sender<()>),
}

/// Event logger for recording lock operations
///
/// Uses a background thread to handle file writes.
pub struct EventLogger {
    /// Channel sender for async communication with logger thread
    sender: Sender<LoggerCommand>,
    /// Flag indicating if a flush operation is in progress
    flushing: Arc<AtomicBool>,
    /// File the logger writes to, after placeholder replacement
    path: PathBuf,
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        // Flush remaining records, the program may be about to exit
        if let Err(e) = self.flush() {
            eprintln!("Warning: Failed to flush logs during EventLogger drop: {e:?}");
        }
    }
}

impl EventLogger {
    /// Create a new logger that writes to the specified file asynchronously
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If the filename contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The directory containing the log file could not be created
    /// - The log file could not be opened for writing
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();

        // Create directory if needed
        if let Some(parent) = path_buf.parent()
            && parent.to_string_lossy() != ""
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        // Replace timestamp placeholder if present
        #[allow(clippy::literal_string_with_formatting_args)]
        let file_path = if path_buf.to_string_lossy().contains("{timestamp}") {
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            PathBuf::from(
                path_buf
                    .to_string_lossy()
                    .replace("{timestamp}", &timestamp.to_string()),
            )
        } else {
            path_buf
        };

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&file_path)
            .with_context(|| format!("Failed to open log file {}", file_path.display()))?;

        let (tx, rx) = channel::<LoggerCommand>();
        let flushing = Arc::new(AtomicBool::new(false));

        // Spawn async writer thread
        thread::spawn(move || async_logger_thread(file, rx));

        Ok(EventLogger {
            sender: tx,
            flushing,
            path: file_path,
        })
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log a lock or unlock event
    ///
    /// Non-blocking, a closed channel only produces a warning on stderr.
    pub fn log_event(&self, thread_id: ThreadId, lock_id: LockId, event: Events) {
        let now = Utc::now();
        let timestamp = now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0;

        self.send(LogRecord::Event(LogEntry {
            thread_id,
            lock_id,
            event,
            timestamp,
        }));
    }

    /// A sink writing diagnostics into this log
    pub fn diagnostic_sink(&self) -> LogSink {
        LogSink {
            sender: self.sender.clone(),
        }
    }

    fn send(&self, record: LogRecord) {
        if let Err(e) = self.sender.send(LoggerCommand::Write(record)) {
            eprintln!("Failed to send log entry: {e:?}");
        }
    }

    /// Force flush all pending log records to disk
    ///
    /// Blocks until the writer thread confirms the flush.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The flush request could not be sent to the async thread
    /// - The flush confirmation was not received in time
    pub fn flush(&self) -> Result<()> {
        // Use atomic CAS (Compare-And-Swap) to prevent multiple simultaneous flushes
        let already_flushing = self
            .flushing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err();

        if already_flushing {
            // Another thread is already flushing
            return Ok(());
        }

        let result = (|| {
            let (flush_tx, flush_rx) = channel();
            self.sender
                .send(LoggerCommand::Flush(flush_tx))
                .context("Logger thread is gone")?;

            // Wait for flush to complete with timeout
            flush_rx
                .recv_timeout(Duration::from_secs(10))
                .context("Flush operation timed out")
        })();

        // Reset flushing flag
        self.flushing.store(false, Ordering::SeqCst);
        result
    }
}

/// Diagnostic sink that appends to an [`EventLogger`] file
#[derive(Clone)]
pub struct LogSink {
    sender: Sender<LoggerCommand>,
}

impl DiagnosticSink<LockId, ThreadId> for LogSink {
    fn report(&self, diagnostic: Diagnostic<LockId, ThreadId>) {
        let _ = self
            .sender
            .send(LoggerCommand::Write(LogRecord::Diagnostic(diagnostic)));
    }
}

/// Async logger thread
///
/// Runs in a dedicated thread and handles all file I/O. Exits when every
/// sender is dropped.
fn async_logger_thread(file: File, rx: Receiver<LoggerCommand>) {
    let mut writer = BufWriter::new(file);

    while let Ok(cmd) = rx.recv() {
        match cmd {
            LoggerCommand::Write(record) => {
                if let Ok(json) = serde_json::to_string(&record)
                    && let Err(e) = writeln!(writer, "{json}")
                {
                    eprintln!("Logger write error: {e:?}");
                }
            }
            LoggerCommand::Flush(responder) => {
                if let Err(e) = writer.flush() {
                    eprintln!("Logger flush error: {e:?}");
                }
                let _ = responder.send(());
            }
        }
    }

    // Channel closed - perform final flush before thread exits
    if let Err(e) = writer.flush() {
        eprintln!("Logger final flush error: {e:?}");
    }
}
