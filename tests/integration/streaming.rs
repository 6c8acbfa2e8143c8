//! Streaming runner: idling, revival, capacity and error recovery

use super::fixtures::{eventually, init_tracing, quiesce, Gates};
use directly::{directly_streaming, StreamingRunner, WorkQueue};
use tokio_test::{assert_pending, assert_ready_err, task};

#[tokio::test]
async fn test_push_after_idle_runs_only_new_items() {
    init_tracing();
    let mut gates = Gates::new(2);
    let queue = WorkQueue::with_items(gates.items());
    let runner = StreamingRunner::new(3, queue.clone()).unwrap();
    let _errors = runner.run().unwrap();

    gates.wait_started(2).await;
    gates.resolve(0);
    gates.resolve(1);
    eventually(|| runner.snapshot().idle).await;

    let third = gates.add();
    queue.push(third);
    gates.wait_started(3).await;
    assert_eq!(gates.started(), vec![0, 1, 2]);

    gates.resolve(2);
    eventually(|| runner.snapshot().idle).await;
    assert_eq!(runner.snapshot().started, 3);
}

#[tokio::test]
async fn test_error_handle_stays_pending_while_idle() {
    init_tracing();
    let mut gates = Gates::new(1);
    let queue = WorkQueue::with_items(gates.items());
    let runner = StreamingRunner::new(2, queue.clone()).unwrap();
    let mut errors = task::spawn(runner.run().unwrap().unwrap());

    gates.wait_started(1).await;
    gates.resolve(0);
    eventually(|| runner.snapshot().idle).await;
    assert_pending!(errors.poll());

    quiesce().await;
    assert!(runner.snapshot().idle);
    assert_pending!(errors.poll());

    // Reviving the runner with a failing item settles the same handle.
    let failing = gates.add();
    queue.push(failing);
    gates.wait_started(2).await;
    gates.reject(1);
    eventually(|| errors.is_woken()).await;

    let failure = assert_ready_err!(errors.poll());
    assert_eq!(failure.index, 1);
    assert_eq!(failure.error, "err1");
}

#[tokio::test]
async fn test_pushes_beyond_capacity_wait_for_a_free_slot() {
    let mut gates = Gates::new(0);
    let queue = WorkQueue::new();
    let runner = StreamingRunner::new(3, queue.clone()).unwrap();
    let _errors = runner.run().unwrap();

    for _ in 0..4 {
        let item = gates.add();
        queue.push(item);
    }
    gates.wait_started(3).await;
    quiesce().await;
    assert_eq!(gates.started(), vec![0, 1, 2]);
    assert_eq!(gates.probe.max(), 3);

    let snap = runner.snapshot();
    assert_eq!(snap.in_flight, 3);
    assert_eq!(snap.pending, 1);
    assert!(!snap.idle);

    gates.resolve(1);
    gates.wait_started(4).await;
    assert_eq!(gates.started(), vec![0, 1, 2, 3]);
    assert!(gates.probe.max() <= 3);
}

#[tokio::test]
async fn test_push_into_free_slot_starts_immediately() {
    let mut gates = Gates::new(1);
    let queue = WorkQueue::with_items(gates.items());
    let runner = StreamingRunner::new(3, queue.clone()).unwrap();
    let _errors = runner.run().unwrap();
    gates.wait_started(1).await;

    // Item 0 is still racing; the new item must not wait for it.
    let second = gates.add();
    queue.push(second);
    gates.wait_started(2).await;
    assert_eq!(runner.snapshot().in_flight, 2);
}

#[tokio::test]
async fn test_failure_does_not_stop_the_runner() {
    let mut gates = Gates::new(3);
    let queue = WorkQueue::with_items(gates.items());
    let errors = directly_streaming(2, queue.clone()).unwrap();

    gates.wait_started(2).await;
    gates.reject(0);
    let failure = errors.await.unwrap_err();
    assert_eq!(failure.index, 0);
    assert_eq!(failure.error, "err0");

    // The freed slot goes to the next queued item.
    gates.wait_started(3).await;
    gates.resolve(1);
    gates.reject(2);
    let failure = failure.next_error.await.unwrap_err();
    assert_eq!(failure.index, 2);
    assert_eq!(failure.error, "err2");

    let later = gates.add();
    queue.push(later);
    gates.wait_started(4).await;
    gates.reject(3);
    let failure = failure.next_error.await.unwrap_err();
    assert_eq!(failure.error, "err3");
}

#[tokio::test]
async fn test_terminate_in_error_handler_stops_new_starts() {
    let mut gates = Gates::new(3);
    let queue = WorkQueue::with_items(gates.items());
    let runner = StreamingRunner::new(1, queue.clone()).unwrap();
    let errors = runner.run().unwrap().unwrap();

    gates.wait_started(1).await;
    gates.reject(0);
    let failure = errors.await.unwrap_err();
    failure.terminate.terminate();
    assert!(failure.next_error.await.is_ok());

    let extra = gates.add();
    queue.push(extra);
    quiesce().await;

    // Item 1 may have taken the freed slot before termination; nothing after it starts.
    let started = gates.started();
    assert!(started.len() <= 2, "started {:?}", started);
    assert!(!started.contains(&3));
    assert!(runner.snapshot().cancelled);
}

#[tokio::test]
async fn test_terminate_leaves_in_flight_items_running() {
    let mut gates = Gates::new(3);
    let queue = WorkQueue::with_items(gates.items());
    let runner = StreamingRunner::new(2, queue.clone()).unwrap();
    let errors = runner.run().unwrap().unwrap();
    gates.wait_started(2).await;

    runner.terminator().terminate();
    assert!(errors.await.is_ok());
    assert_eq!(gates.probe.current(), 2);

    gates.reject(0);
    gates.resolve(1);
    eventually(|| gates.probe.current() == 0).await;
    quiesce().await;

    let snap = runner.snapshot();
    assert!(snap.cancelled);
    assert_eq!(snap.started, 2);
    assert_eq!(snap.pending, 1);
    assert_eq!(snap.failed, 1);
}

#[tokio::test]
async fn test_second_run_restarts_without_new_handle() {
    let mut gates = Gates::new(1);
    let queue = WorkQueue::with_items(gates.items());
    let runner = StreamingRunner::new(1, queue.clone()).unwrap();
    assert!(runner.run().unwrap().is_some());
    gates.wait_started(1).await;

    assert!(runner.run().unwrap().is_none());
    quiesce().await;
    assert_eq!(gates.started(), vec![0]);
}
