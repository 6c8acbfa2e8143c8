//! Throttling: never more than `capacity` items in flight

use super::fixtures::{init_tracing, sleepers, Gates, Probe};
use directly::{directly, work_item, Directly, WorkItem};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_test::{assert_pending, assert_ready_ok, task};

#[test]
fn test_only_starts_up_to_the_limit() {
    let mut gates = Gates::new(3);
    let spied = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&spied);

    let mut items = gates.items();
    items.push(work_item(move || {
        flag.store(true, Ordering::SeqCst);
        async { Ok(99) }
    }));

    let mut run = task::spawn(Directly::new(3, items).unwrap().run());
    assert_pending!(run.poll());
    assert!(!spied.load(Ordering::SeqCst));
    assert_eq!(gates.probe.current(), 3);
}

#[test]
fn test_starts_next_items_as_slots_free_up() {
    init_tracing();
    let mut gates = Gates::new(5);
    let mut run = task::spawn(Directly::new(3, gates.items()).unwrap().run());

    assert_pending!(run.poll());
    assert_eq!(gates.started(), vec![0, 1, 2]);

    gates.resolve(0);
    assert_pending!(run.poll());
    assert_eq!(gates.started(), vec![0, 1, 2, 3]);

    gates.resolve(3);
    assert_pending!(run.poll());
    assert_eq!(gates.started(), vec![0, 1, 2, 3, 4]);

    for i in [1, 2, 4] {
        gates.resolve(i);
    }
    assert_eq!(assert_ready_ok!(run.poll()), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_in_flight_never_exceeds_capacity() {
    let probe = Arc::new(Probe::default());
    let results = directly(4, sleepers(40, &probe)).unwrap().await.unwrap();

    assert_eq!(results, (0..40).collect::<Vec<_>>());
    assert!(probe.max() <= 4, "saw {} in flight", probe.max());
    assert_eq!(probe.current(), 0);
}

#[tokio::test]
async fn test_capacity_of_one_runs_serially() {
    let probe = Arc::new(Probe::default());
    let items: Vec<WorkItem<usize, String>> = sleepers(6, &probe);
    let results = directly(1, items).unwrap().await.unwrap();

    assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(probe.max(), 1);
}
