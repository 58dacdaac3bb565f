#![cfg(feature = "control")]
//! Concurrency tests for `MemoCell`.
//!
//! These tests verify the check-compute-publish protocol through
//! multi-threaded stress testing: however many threads race on a cell,
//! each computed generation must run the recipe exactly once, and every
//! caller of a generation must observe that generation's value.

use persimmon::control::MemoCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

/// Racing `force` calls share a single evaluation.
#[test]
fn test_concurrent_force_computes_exactly_once() {
    for _ in 0..100 {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);

        let cell = Arc::new(MemoCell::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            42
        }));

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cell.force()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}

/// A slow recipe still runs once; late callers block until it publishes.
#[test]
fn test_late_callers_wait_for_the_winner() {
    let runs = Arc::new(AtomicUsize::new(0));
    let runs_clone = Arc::clone(&runs);

    let cell = Arc::new(MemoCell::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(50));
        "slow".to_string()
    }));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.force())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "slow");
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Each generation between forgets evaluates exactly once.
#[test]
fn test_sequential_generations_each_compute_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let runs_clone = Arc::clone(&runs);
    let cell = Arc::new(MemoCell::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst)
    }));

    for generation in 0..10 {
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cell.force()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), generation);
        }
        cell.forget();
    }

    assert_eq!(runs.load(Ordering::SeqCst), 10);
}

/// Racing `force` against `forget` never exposes a torn value: every
/// caller sees a value the recipe actually produced, complete.
#[test]
fn test_force_and_forget_race_stays_consistent() {
    let cell = Arc::new(MemoCell::new(|| vec![7usize; 1024]));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for _ in 0..200 {
                    let value = cell.force();
                    assert_eq!(value.len(), 1024);
                    assert!(value.iter().all(|element| *element == 7));
                }
            })
        })
        .collect();

    let invalidator = {
        let cell = Arc::clone(&cell);
        thread::spawn(move || {
            for _ in 0..200 {
                cell.forget();
                thread::yield_now();
            }
        })
    };

    for reader in readers {
        reader.join().unwrap();
    }
    invalidator.join().unwrap();
}

/// Failed attempts do not block other threads from retrying.
#[test]
fn test_concurrent_retry_after_failure_converges() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = Arc::clone(&attempts);

    let cell = Arc::new(MemoCell::fallible(move || {
        // The first two attempts fail, later ones succeed
        if attempts_clone.fetch_add(1, Ordering::SeqCst) < 2 {
            Err("not ready")
        } else {
            Ok(42)
        }
    }));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                loop {
                    match cell.try_force() {
                        Ok(value) => return value,
                        Err(_) => thread::yield_now(),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 42);
    }
    // Once a success is published no further attempts run
    let settled = attempts.load(Ordering::SeqCst);
    assert_eq!(cell.try_force(), Ok(42));
    assert_eq!(attempts.load(Ordering::SeqCst), settled);
}
