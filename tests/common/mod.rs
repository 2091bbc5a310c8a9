use lockcheck::{Checker, Diagnostic, DiagnosticKind, LockCheck, LockId, MemorySink, ThreadId};
use std::sync::{Arc, Mutex as StdMutex, mpsc};
use std::time::Duration;

#[allow(dead_code)]
pub const DIAGNOSTIC_TIMEOUT: Duration = Duration::from_secs(3);
#[allow(dead_code)]
pub const NO_DIAGNOSTIC_TIMEOUT: Duration = Duration::from_millis(500);

pub struct DetectorHarness {
    pub rx: mpsc::Receiver<Diagnostic<LockId, ThreadId>>,
    pub reported: Arc<StdMutex<usize>>,
}

/// Install the global detector with a callback feeding a channel
#[allow(dead_code)]
pub fn start_detector() -> DetectorHarness {
    start_detector_with(LockCheck::new())
}

/// Same as `start_detector`, on top of a preconfigured builder
#[allow(dead_code)]
pub fn start_detector_with(builder: LockCheck) -> DetectorHarness {
    let (tx, rx) = mpsc::channel();
    let reported = Arc::new(StdMutex::new(0));
    let counter = Arc::clone(&reported);

    builder
        .callback(move |diagnostic| {
            *counter.lock().unwrap() += 1;
            let _ = tx.send(diagnostic);
        })
        .start()
        .expect("Failed to initialize detector");

    DetectorHarness { rx, reported }
}

/// Wait for the next diagnostic of `kind`, skipping others
#[allow(dead_code)]
pub fn expect_diagnostic(
    h: &DetectorHarness,
    kind: DiagnosticKind,
    timeout: Duration,
) -> Diagnostic<LockId, ThreadId> {
    loop {
        match h.rx.recv_timeout(timeout) {
            Ok(diagnostic) if diagnostic.kind == kind => return diagnostic,
            Ok(_) => continue,
            Err(_) => panic!("No {kind:?} reported within {timeout:?}"),
        }
    }
}

#[allow(dead_code)]
pub fn assert_no_diagnostic(h: &DetectorHarness, timeout: Duration) {
    if let Ok(diagnostic) = h.rx.recv_timeout(timeout) {
        panic!("Unexpected diagnostic: {diagnostic}");
    }
    assert_eq!(*h.reported.lock().unwrap(), 0, "Nothing should be reported");
}

/// A standalone checker recording into memory
#[allow(dead_code)]
pub fn memory_checker() -> (Checker<usize, usize>, Arc<MemorySink<usize, usize>>) {
    let sink = Arc::new(MemorySink::new());
    (Checker::new(Arc::clone(&sink)), sink)
}
