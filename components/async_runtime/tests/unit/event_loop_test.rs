//! Unit tests for SimpleLoop

use async_runtime::{callback, Loop, LoopError, SimpleLoop, Worker};
use core_types::{Context, ContextError};
use crossbeam::channel;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn run_returns_after_every_job_finalizes() {
    let event_loop: SimpleLoop<Vec<u32>> = SimpleLoop::new();
    let ctx = Context::new();
    let finalized = Arc::new(AtomicUsize::new(0));

    for i in 0..16 {
        let finalized = finalized.clone();
        event_loop
            .go(
                &ctx,
                Box::new(move |worker| {
                    thread::sleep(Duration::from_millis(u64::from(i % 4)));
                    worker
                        .submit(callback(move |log: &mut Vec<u32>| {
                            log.push(i);
                            Ok(())
                        }))
                        .unwrap();
                    assert!(worker.is_finalized());
                    finalized.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
    }

    let mut log = Vec::new();
    event_loop.run(&ctx, &mut log).unwrap();

    assert_eq!(log.len(), 16);
    log.sort_unstable();
    assert_eq!(log, (0..16).collect::<Vec<_>>());
    assert_eq!(event_loop.pending(), 0);
    // every submit returned once run had consumed its message
    thread::sleep(Duration::from_millis(10));
    assert_eq!(finalized.load(Ordering::SeqCst), 16);
}

#[test]
fn callbacks_execute_in_arrival_order() {
    let event_loop: SimpleLoop<Vec<u32>> = SimpleLoop::new();
    let ctx = Context::new();

    event_loop
        .go(
            &ctx,
            Box::new(|worker| {
                for i in 0..5 {
                    worker
                        .next(callback(move |log: &mut Vec<u32>| {
                            log.push(i);
                            Ok(())
                        }))
                        .unwrap();
                }
                worker
                    .submit(callback(|log: &mut Vec<u32>| {
                        log.push(99);
                        Ok(())
                    }))
                    .unwrap();
            }),
        )
        .unwrap();

    let mut log = Vec::new();
    event_loop.run(&ctx, &mut log).unwrap();
    assert_eq!(log, vec![0, 1, 2, 3, 4, 99]);
}

#[test]
fn next_calls_leave_pending_count_unchanged() {
    let event_loop: SimpleLoop<Vec<usize>> = SimpleLoop::new();
    let event_loop = Arc::new(event_loop);
    let ctx = Context::new();

    for ticks in [0usize, 1, 5] {
        let observer = Arc::clone(&event_loop);
        event_loop
            .go(
                &ctx,
                Box::new(move |worker| {
                    for _ in 0..ticks {
                        let observer = Arc::clone(&observer);
                        worker
                            .next(callback(move |seen: &mut Vec<usize>| {
                                seen.push(observer.pending());
                                Ok(())
                            }))
                            .unwrap();
                    }
                    worker.submit(None).unwrap();
                }),
            )
            .unwrap();
    }

    // 6 ticks in total; every tick observes the jobs that have not submitted
    let mut seen = Vec::new();
    event_loop.run(&ctx, &mut seen).unwrap();
    assert_eq!(seen.len(), 6);
    assert!(seen.iter().all(|pending| *pending >= 1 && *pending <= 3));
    assert_eq!(event_loop.pending(), 0);
}

#[test]
fn cancel_stops_run_with_pending_jobs() {
    let event_loop: SimpleLoop<u32> = SimpleLoop::new();
    let ctx = Context::new();

    event_loop
        .go(
            &ctx,
            Box::new(|worker| {
                // waits for the governing context, never submits in time
                let err = worker.context().wait();
                assert_eq!(err, ContextError::Canceled);
            }),
        )
        .unwrap();

    let canceller = ctx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        canceller.cancel();
    });

    let start = Instant::now();
    let err = event_loop.run(&ctx, &mut 0).unwrap_err();
    assert!(err.is_canceled());
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(event_loop.pending(), 1);
}

#[test]
fn callbacks_queued_after_cancel_are_not_executed() {
    let event_loop: SimpleLoop<Vec<&'static str>> = SimpleLoop::new();
    let ctx = Context::new();
    let (release_tx, release_rx) = channel::bounded::<()>(0);

    // first job cancels the context from inside its callback
    let canceller = ctx.clone();
    event_loop
        .go(
            &ctx,
            Box::new(move |worker| {
                worker
                    .next(callback(move |log: &mut Vec<&'static str>| {
                        log.push("cancel");
                        canceller.cancel();
                        Ok(())
                    }))
                    .unwrap();
                let _ = release_tx.send(());
                let _ = worker.submit(None);
            }),
        )
        .unwrap();

    // second job tries to deliver after the cancellation
    let late = Arc::new(Mutex::new(None));
    let late_result = late.clone();
    event_loop
        .go(
            &ctx,
            Box::new(move |worker| {
                let _ = release_rx.recv();
                let result = worker.submit(callback(|log: &mut Vec<&'static str>| {
                    log.push("late");
                    Ok(())
                }));
                *late_result.lock().unwrap() = Some(result.map_err(|e| e.context()));
            }),
        )
        .unwrap();

    let mut log = Vec::new();
    let err = event_loop.run(&ctx, &mut log).unwrap_err();
    assert!(err.is_canceled());
    assert_eq!(log, vec!["cancel"]);

    thread::sleep(Duration::from_millis(20));
    let late = late.lock().unwrap().take();
    assert_eq!(late, Some(Err(Some(ContextError::Canceled))));
}

#[test]
fn deadline_ends_run() {
    let event_loop: SimpleLoop<()> = SimpleLoop::new();
    let ctx = Context::new().with_timeout(Duration::from_millis(20));

    event_loop
        .go(
            &ctx,
            Box::new(|worker| {
                worker.context().wait();
            }),
        )
        .unwrap();

    let err = event_loop.run(&ctx, &mut ()).unwrap_err();
    assert_eq!(err.context(), Some(ContextError::DeadlineExceeded));
}

#[test]
fn go_from_inside_a_callback_is_driven_by_the_same_run() {
    struct State {
        event_loop: Arc<SimpleLoop<State>>,
        ctx: Context,
        log: Vec<&'static str>,
    }

    let event_loop = Arc::new(SimpleLoop::new());
    let ctx = Context::new();

    event_loop
        .go(
            &ctx,
            Box::new(|worker| {
                worker
                    .submit(callback(|state: &mut State| {
                        state.log.push("outer");
                        state.event_loop.go(
                            &state.ctx,
                            Box::new(|worker| {
                                let _ = worker.submit(callback(|state: &mut State| {
                                    state.log.push("inner");
                                    Ok(())
                                }));
                            }),
                        )?;
                        Ok(())
                    }))
                    .unwrap();
            }),
        )
        .unwrap();

    let mut state = State {
        event_loop: Arc::clone(&event_loop),
        ctx: ctx.clone(),
        log: Vec::new(),
    };
    event_loop.run(&ctx, &mut state).unwrap();
    assert_eq!(state.log, vec!["outer", "inner"]);
}

#[test]
fn empty_submit_finalizes_without_callback() {
    let event_loop: SimpleLoop<u32> = SimpleLoop::new();
    let ctx = Context::new();
    event_loop
        .go(&ctx, Box::new(|worker| worker.submit(None).unwrap()))
        .unwrap();

    let mut untouched = 7;
    event_loop.run(&ctx, &mut untouched).unwrap();
    assert_eq!(untouched, 7);
}

#[test]
fn run_can_be_called_again_after_draining() {
    let event_loop: SimpleLoop<u32> = SimpleLoop::new();
    let ctx = Context::new();
    let mut count = 0;

    for _ in 0..2 {
        event_loop
            .go(
                &ctx,
                Box::new(|worker| {
                    let _ = worker.submit(callback(|n: &mut u32| {
                        *n += 1;
                        Ok(())
                    }));
                }),
            )
            .unwrap();
        event_loop.run(&ctx, &mut count).unwrap();
    }
    assert_eq!(count, 2);
}

#[test]
fn go_after_cancel_is_rejected() {
    let event_loop: SimpleLoop<()> = SimpleLoop::new();
    let ctx = Context::new();
    ctx.cancel();
    let err = event_loop.go(&ctx, Box::new(|_| {})).unwrap_err();
    assert!(matches!(err, LoopError::Context(ContextError::Canceled)));
    assert_eq!(event_loop.pending(), 0);
}
