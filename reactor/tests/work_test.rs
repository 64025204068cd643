//! Scenario 4 (work -> completion): work items run on pool workers, their
//! done callbacks run on the dispatch thread, and `stop` between "queued"
//! and "running" still lets the work function run but suppresses its
//! completion callback (§4.5, §4.6 `Work` state machine).
//!
//! The default thread pool is process-wide (one process per test binary
//! here, since each file under `tests/` is its own binary), but tests
//! within this file still share it, so they are serialized.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reactor_loop::{Loop, Work};
use serial_test::serial;

#[test]
#[serial]
fn work_items_complete_on_the_dispatch_thread() {
    let event_loop = Loop::new().expect("backend init");
    event_loop.require_workers(2).expect("provision pool workers");

    let item_count = 20;
    let completions = Arc::new(AtomicU32::new(0));
    let mut items = Vec::with_capacity(item_count);
    for _ in 0..item_count {
        let done = completions.clone();
        let item = Work::new(
            || thread::sleep(Duration::from_millis(10)),
            move |_w| {
                done.fetch_add(1, Ordering::SeqCst);
            },
        );
        event_loop.start(&item).expect("start work item");
        items.push(item);
    }

    let exit_loop = event_loop.clone();
    let watch = completions.clone();
    let target = item_count as u32;
    let watchdog = thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(5);
        while watch.load(Ordering::SeqCst) < target && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        exit_loop.exit();
    });

    event_loop.run().expect("run loop");
    watchdog.join().expect("watchdog thread panicked");

    assert_eq!(completions.load(Ordering::SeqCst), target, "every work item's done callback ran");
    for item in &items {
        assert!(!item.is_started(), "a completed work item implicitly stops itself");
    }
}

#[test]
#[serial]
fn stopping_a_queued_work_item_suppresses_its_completion() {
    let event_loop = Loop::new().expect("backend init");
    event_loop.require_workers(1).expect("provision one worker");

    let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let completed = Arc::new(std::sync::atomic::AtomicBool::new(false));

    // Occupy the single worker with a slow item first so the second item
    // is still sitting in the queue when we stop it.
    let blocker = Work::new(|| thread::sleep(Duration::from_millis(100)), |_w| {});
    event_loop.start(&blocker).expect("start blocker");

    let ran_flag = ran.clone();
    let completed_flag = completed.clone();
    let item = Work::new(
        move || {
            ran_flag.store(true, Ordering::SeqCst);
        },
        move |_w| {
            completed_flag.store(true, Ordering::SeqCst);
        },
    );
    event_loop.start(&item).expect("start queued item");
    event_loop.stop(&item);
    assert!(!item.is_started());

    let deadline = Instant::now() + Duration::from_millis(300);
    while Instant::now() < deadline {
        event_loop.poll(Some(Duration::from_millis(10))).expect("poll");
        event_loop.dispatch();
    }

    // The work function may or may not have run (it was already queued to
    // a worker thread pool by the time it runs), but its completion
    // callback must never fire once it has been stopped.
    assert!(!completed.load(Ordering::SeqCst), "a stopped item's done callback must not run");
    assert!(ran.load(Ordering::SeqCst), "the work function itself still runs once a worker picks it up");
}
