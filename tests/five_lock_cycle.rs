use lockcheck::{DiagnosticKind, Mutex};
use std::sync::Arc;
use std::thread;

mod common;
use common::{DIAGNOSTIC_TIMEOUT, expect_diagnostic, start_detector};

#[test]
fn test_five_lock_cycle() {
    let harness = start_detector();

    // 5 locks, each thread takes one and then its successor
    let locks: Vec<Arc<Mutex<()>>> = (0..5).map(|_| Arc::new(Mutex::new(()))).collect();
    let ids: Vec<_> = locks.iter().map(|l| l.id()).collect();

    for i in 0..locks.len() {
        let first = Arc::clone(&locks[i]);
        let second = Arc::clone(&locks[(i + 1) % locks.len()]);
        thread::spawn(move || {
            let _g0 = first.lock();
            let _g1 = second.lock();
        })
        .join()
        .unwrap();
    }

    // Only the last thread closes the ring: E -> A -> B -> C -> D -> E
    let diagnostic =
        expect_diagnostic(&harness, DiagnosticKind::PossibleDeadlock, DIAGNOSTIC_TIMEOUT);
    let cycle = diagnostic.lock_order_cycle.expect("cycle chain");
    assert_eq!(cycle.len(), 6);
    assert_eq!(cycle.first(), Some(&ids[4]));
    assert_eq!(cycle.last(), Some(&ids[4]));
    for id in &ids {
        assert!(cycle.contains(id));
    }
}
