// Core types
pub mod types;
pub use types::*;

// Diagnostics and where they go
pub mod diagnostic;
pub mod sink;
pub mod transport;
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use sink::{CallbackSink, ConsoleSink, DiagnosticSink, MemorySink, Tee, TransportSink};
pub use transport::{LocalTransport, Transport};

// Lock order graph and lock-stack trie
pub mod graph;
pub mod lock_stack;
pub mod mutex_record;

// Checker tying them together
pub mod checker;
pub use checker::Checker;

// Logging functionality
pub mod logger;
pub mod replay;

// Global detector
pub mod detector;
pub use detector::{init_detector, on_lock_acquired, on_lock_release};

// Tracked mutex
pub mod locks;
pub use locks::mutex::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use detector::DetectorConfig;
use logger::EventLogger;

/// LockCheck configuration struct
pub struct LockCheck {
    log_path: Option<String>,
    sink: Box<dyn DiagnosticSink<LockId, ThreadId>>,
}

impl Default for LockCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl LockCheck {
    /// Create a new LockCheck with default settings
    ///
    /// By default:
    /// - Logging is disabled
    /// - Diagnostics are printed to stderr
    pub fn new() -> Self {
        LockCheck {
            log_path: None,
            sink: Box::new(ConsoleSink),
        }
    }

    /// Activate logger and set the path for the log file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If the path contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    pub fn with_log<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.log_path = Some(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Set a callback invoked for every diagnostic
    ///
    /// The callback runs on a background thread, never on the thread that
    /// triggered the diagnostic.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Diagnostic<LockId, ThreadId>) + Send + 'static,
    {
        self.sink = Box::new(CallbackSink::new(callback));
        self
    }

    /// Send every diagnostic as JSON through `transport`
    pub fn with_transport<Tr>(mut self, transport: Tr) -> Self
    where
        Tr: Transport + 'static,
    {
        self.sink = Box::new(TransportSink::new(transport));
        self
    }

    /// Report diagnostics to a custom sink
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: DiagnosticSink<LockId, ThreadId> + 'static,
    {
        self.sink = Box::new(sink);
        self
    }

    /// Install the configured global detector
    ///
    /// # Errors
    /// Returns an error if logger initialization fails
    pub fn start(self) -> Result<()> {
        let logger = match self.log_path {
            Some(log_path) => {
                Some(EventLogger::with_file(log_path).context("Failed to initialize logger")?)
            }
            None => None,
        };

        init_detector(DetectorConfig {
            sink: self.sink,
            logger,
        });

        println!("{}", crate::BANNER);

        Ok(())
    }
}
