//! Unit tests for the threading module
//!
//! # Test Categories
//! 1. Worker tests - spawning, joining, bounded joins, panics
//! 2. Run flag tests - stop propagation, interruptible sleep

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Worker Tests
// ============================================================================

/// Spawn a worker, let it do work, join it
#[test]
fn test_worker_spawn_and_join() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = Arc::clone(&counter);

    let worker = Worker::spawn("test_worker", move || {
        for _ in 0..10 {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }
    })
    .expect("Worker spawn should succeed");

    assert_eq!(worker.name(), "test_worker");
    worker.join().expect("Worker join should succeed");
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

/// The join returns the closure's value
#[test]
fn test_worker_return_value() {
    let mut worker = Worker::spawn("answer", || 42).expect("Worker spawn should succeed");
    let value = worker
        .join_timeout(Duration::from_secs(2))
        .expect("Worker join should succeed");
    assert_eq!(value, 42);
}

/// A worker that never exits is reported after the bound, not waited on forever
#[test]
fn test_join_timeout_expires() {
    let run = RunFlag::new();
    let worker_run = run.clone();
    let mut worker = Worker::spawn("stubborn", move || {
        while worker_run.wait_timeout(Duration::from_millis(5)) {}
    })
    .expect("Worker spawn should succeed");

    let start = Instant::now();
    let err = worker
        .join_timeout(Duration::from_millis(50))
        .expect_err("join should time out");
    assert!(matches!(err, ThreadError::JoinTimeout { .. }));
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert!(worker.is_running());

    // Handle survives the timeout; a second attempt succeeds once stopped
    run.stop();
    worker
        .join_timeout(Duration::from_secs(2))
        .expect("second join should succeed");
    assert!(!worker.is_running());
}

/// Joining a consumed handle is an error, not a hang
#[test]
fn test_join_twice() {
    let mut worker = Worker::spawn("once", || ()).expect("Worker spawn should succeed");
    worker
        .join_timeout(Duration::from_secs(2))
        .expect("first join should succeed");
    assert!(matches!(
        worker.join_timeout(Duration::from_millis(1)),
        Err(ThreadError::AlreadyJoined(_))
    ));
}

/// A panicking worker surfaces as `Panicked`
#[test]
fn test_worker_panic_reported() {
    let worker = Worker::spawn("doomed", || panic!("boom")).expect("Worker spawn should succeed");
    assert_eq!(
        worker.join().expect_err("join should report the panic"),
        ThreadError::Panicked("doomed".to_string())
    );
}

// ============================================================================
// Run Flag Tests
// ============================================================================

#[test]
fn test_run_flag_starts_running() {
    let run = RunFlag::new();
    assert!(run.is_running());
    run.stop();
    assert!(!run.is_running());
    // stop is idempotent
    run.stop();
    assert!(!run.is_running());
}

/// Full sleep elapses when nobody stops the flag
#[test]
fn test_wait_timeout_elapses() {
    let run = RunFlag::new();
    let start = Instant::now();
    assert!(run.wait_timeout(Duration::from_millis(30)));
    assert!(start.elapsed() >= Duration::from_millis(30));
}

/// Stopping the flag cuts a long sleep short
#[test]
fn test_stop_interrupts_wait() {
    let run = RunFlag::new();
    let sleeper = run.clone();

    let handle = thread::spawn(move || {
        let start = Instant::now();
        let still_running = sleeper.wait_timeout(Duration::from_secs(30));
        (still_running, start.elapsed())
    });

    thread::sleep(Duration::from_millis(20));
    run.stop();

    let (still_running, elapsed) = handle.join().expect("sleeper should not panic");
    assert!(!still_running);
    assert!(elapsed < Duration::from_secs(5));
}

/// Waiting on an already stopped flag returns immediately
#[test]
fn test_wait_after_stop_returns_immediately() {
    let run = RunFlag::new();
    run.stop();
    let start = Instant::now();
    assert!(!run.wait_timeout(Duration::from_secs(10)));
    assert!(start.elapsed() < Duration::from_secs(1));
}
