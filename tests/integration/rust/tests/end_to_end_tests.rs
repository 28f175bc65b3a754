//! End-to-End Event Loop Tests
//!
//! Tests the complete stack: background jobs and timers hand callbacks to
//! the loop, the loop runs them against the embedded engine on one thread.
//! Covers:
//! - Streaming progress from a background job with `next`
//! - Jobs and timers interleaving
//! - Reentrant scheduling from script callbacks
//! - Cancellation reaching jobs blocked on the loop

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_runtime::{callback, LoopError};
use core_types::{Context, ContextError};
use script_runtime::{native, Host, NativeEngine, NativeError, Runtime, RuntimeOptions};

type Events = Rc<RefCell<Vec<String>>>;

/// Test: a job streams chunks with next, then finalizes with submit
#[test]
fn test_e2e_streaming_job() {
    let mut runtime = Runtime::new(NativeEngine::new());
    runtime
        .go(Box::new(|worker| {
            for chunk in 0..5u64 {
                thread::sleep(Duration::from_millis(1));
                let delivered = worker.next(callback(move |host: &mut Host<NativeEngine>| {
                    // each chunk schedules a short timer
                    host.timers.set_timeout(None, chunk as i64)?;
                    Ok(())
                }));
                if delivered.is_err() {
                    return;
                }
            }
            let _ = worker.submit(None);
        }))
        .unwrap();

    runtime.run_loop().unwrap();
    assert_eq!(runtime.timers().registered(), 0);
}

/// Test: a job result feeds a script timer
#[test]
fn test_e2e_job_result_triggers_timer() {
    let mut runtime = Runtime::new(NativeEngine::new());
    let fired = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&fired);
    runtime
        .go(Box::new(move |worker| {
            // pretend to fetch something
            thread::sleep(Duration::from_millis(5));
            let body = String::from("payload");
            let _ = worker.submit(callback(move |host: &mut Host<NativeEngine>| {
                host.timers.set_timeout(
                    native(move |_, _| {
                        sink.lock().unwrap().push(body.clone());
                        Ok(())
                    }),
                    1,
                )?;
                Ok(())
            }));
        }))
        .unwrap();

    runtime.run_loop().unwrap();
    assert_eq!(*fired.lock().unwrap(), vec!["payload".to_string()]);
    assert_eq!(runtime.engine().calls(), 1);
}

/// Test: interval and timeout interleave; the timeout clears the interval
#[test]
fn test_e2e_timeout_clears_interval() {
    let mut runtime = Runtime::new(NativeEngine::new());
    let events: Events = Rc::default();

    let ticks = Rc::clone(&events);
    let interval = runtime
        .timers_mut()
        .set_interval(
            native(move |_, _| {
                ticks.borrow_mut().push("tick".to_string());
                Ok(())
            }),
            5,
        )
        .unwrap();

    let stop = Rc::clone(&events);
    runtime
        .timers_mut()
        .set_timeout(
            native(move |_, timers| {
                stop.borrow_mut().push("stop".to_string());
                timers.clear_interval(&interval);
                Ok(())
            }),
            28,
        )
        .unwrap();

    runtime.run_loop().unwrap();
    let events = events.borrow();
    assert_eq!(events.last().map(String::as_str), Some("stop"));
    let ticks = events.iter().filter(|e| *e == "tick").count();
    assert!(ticks >= 2, "expected several ticks, got {}", ticks);
}

/// Test: a script error aborts the loop and reaches the embedder
#[test]
fn test_e2e_script_error_aborts_loop() {
    let mut runtime = Runtime::new(NativeEngine::new());
    let events: Events = Rc::default();

    runtime
        .timers_mut()
        .set_timeout(native(|_, _| Err(NativeError::new("TypeError: x is undefined"))), 1)
        .unwrap();
    let late = Rc::clone(&events);
    runtime
        .timers_mut()
        .set_timeout(
            native(move |_, _| {
                late.borrow_mut().push("late".to_string());
                Ok(())
            }),
            200,
        )
        .unwrap();

    let err = runtime.run_loop().unwrap_err();
    assert!(err.to_string().contains("TypeError"));
    assert!(events.borrow().is_empty());
    runtime.cancel();
}

/// Test: cancelling the parent context unblocks a job waiting to deliver
#[test]
fn test_e2e_parent_cancel_unblocks_job() {
    let parent = Context::new();
    let runtime =
        Runtime::with_options(NativeEngine::new(), RuntimeOptions::new().with_context(parent.clone()));
    let (tx, rx) = std::sync::mpsc::channel();

    runtime
        .go(Box::new(move |worker| {
            // nobody runs the loop, so this blocks until cancellation
            let result = worker.submit(None);
            let _ = tx.send(result);
        }))
        .unwrap();

    thread::sleep(Duration::from_millis(10));
    parent.cancel();

    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(
        result,
        Err(LoopError::Context(ContextError::Canceled))
    ));
}

/// Test: cancelling the root reaches a runtime whose parent scope was dropped
#[test]
fn test_e2e_root_cancel_through_dropped_scope() {
    let root = Context::new();
    let (tx, rx) = std::sync::mpsc::channel();

    let canceller = root.clone();
    let driver = thread::spawn(move || {
        let mut runtime = Runtime::with_options(
            NativeEngine::new(),
            RuntimeOptions::new().with_context(root.child()),
        );
        runtime.timers_mut().set_interval(None, 5).unwrap();
        let _ = tx.send(runtime.run_loop().map_err(|e| e.context()));
    });

    thread::sleep(Duration::from_millis(20));
    canceller.cancel();

    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(result, Err(Some(ContextError::Canceled)));
    driver.join().unwrap();
}

/// Test: a long job observing the runtime context ends with it
#[test]
fn test_e2e_runtime_cancel_ends_long_job() {
    let mut runtime = Runtime::new(NativeEngine::new());
    runtime
        .go(Box::new(|worker| {
            let ctx = worker.context().clone();
            ctx.wait();
            let _ = worker.submit(None);
        }))
        .unwrap();

    let ctx = runtime.context().clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(15));
        ctx.cancel();
    });

    let err = runtime.run_loop().unwrap_err();
    assert_eq!(err.context(), Some(ContextError::Canceled));
}
