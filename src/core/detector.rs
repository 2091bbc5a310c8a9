//! Process-wide checker instance
//!
//! Adapters (the tracked [`Mutex`](crate::Mutex), the C API) report into one
//! global checker. Every event is processed under a single instrumentation
//! lock, which is never one of the observed mutexes, so the checker cannot
//! add a lock ordering of its own to the program.

use crate::core::checker::Checker;
use crate::core::logger::EventLogger;
use crate::core::sink::{ConsoleSink, DiagnosticSink, Tee};
use crate::core::types::{Events, LockId, ThreadId};
use anyhow::Result;
use parking_lot::Mutex;
use std::path::PathBuf;

/// Configuration for the global detector
pub struct DetectorConfig {
    /// Where diagnostics are reported
    pub sink: Box<dyn DiagnosticSink<LockId, ThreadId>>,
    /// Logger for recording events and diagnostics
    pub logger: Option<EventLogger>,
}

/// Global checker plus the optional event log
struct Detector {
    checker: Checker<LockId, ThreadId>,
    logger: Option<EventLogger>,
}

impl Detector {
    fn new() -> Self {
        Detector {
            checker: Checker::new(ConsoleSink),
            logger: None,
        }
    }

    fn on_lock_acquired(&mut self, thread_id: ThreadId, lock_id: LockId) {
        if let Some(logger) = &self.logger {
            logger.log_event(thread_id, lock_id, Events::Lock);
        }
        self.checker.on_lock(lock_id, thread_id);
    }

    fn on_lock_release(&mut self, thread_id: ThreadId, lock_id: LockId) {
        if let Some(logger) = &self.logger {
            logger.log_event(thread_id, lock_id, Events::Unlock);
        }
        self.checker.on_unlock(lock_id, thread_id);
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_DETECTOR: Mutex<Detector> = Mutex::new(Detector::new());
}

/// Initialize the global detector with the provided configuration
///
/// Recorded lock order edges survive re-initialization; only the sink and
/// the logger are replaced.
pub fn init_detector(config: DetectorConfig) {
    let mut detector = GLOBAL_DETECTOR.lock();
    match config.logger {
        Some(logger) => {
            let log_sink = logger.diagnostic_sink();
            detector.checker.set_sink(Tee::new(config.sink, log_sink));
            detector.logger = Some(logger);
        }
        None => {
            detector.checker.set_sink(config.sink);
            detector.logger = None;
        }
    }
}

/// Register a lock acquisition with the global detector
///
/// Must be called after the lock was physically acquired.
///
/// # Arguments
/// * `thread_id` - ID of the thread that acquired the lock
/// * `lock_id` - ID of the lock that was acquired
pub fn on_lock_acquired(thread_id: ThreadId, lock_id: LockId) {
    GLOBAL_DETECTOR.lock().on_lock_acquired(thread_id, lock_id);
}

/// Register a lock release with the global detector
///
/// Must be called before the lock is physically released.
///
/// # Arguments
/// * `thread_id` - ID of the thread releasing the lock
/// * `lock_id` - ID of the lock being released
pub fn on_lock_release(thread_id: ThreadId, lock_id: LockId) {
    GLOBAL_DETECTOR.lock().on_lock_release(thread_id, lock_id);
}

/// Run `f` with read access to the global checker
pub fn with_checker<R>(f: impl FnOnce(&Checker<LockId, ThreadId>) -> R) -> R {
    f(&GLOBAL_DETECTOR.lock().checker)
}

/// Flush all pending log entries of the global detector to disk
///
/// # Errors
/// Returns an error if the logger flush operation fails
pub fn flush_global_detector_logs() -> Result<()> {
    match &GLOBAL_DETECTOR.lock().logger {
        Some(logger) => logger.flush(),
        None => Ok(()),
    }
}

/// Path of the log file the global detector writes to, if any
pub fn current_log_file() -> Option<PathBuf> {
    GLOBAL_DETECTOR
        .lock()
        .logger
        .as_ref()
        .map(|logger| logger.path().to_path_buf())
}
