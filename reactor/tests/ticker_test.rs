//! Scenario 1 (single ticker): a ticker with a fixed period fires N times
//! while a watchdog thread drives `exit()` once it has seen enough ticks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reactor_loop::{Loop, Ticker};

#[test]
fn single_ticker_fires_ten_times_then_exits() {
    let event_loop = Loop::new().expect("backend init");

    let ticks = Arc::new(AtomicU32::new(0));
    let counter = ticks.clone();
    let ticker = Ticker::new(Duration::from_micros(1000), move |_tick| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    event_loop.start(&ticker).expect("start ticker");

    let exit_loop = event_loop.clone();
    let watch = ticks.clone();
    let watchdog = thread::spawn(move || {
        while watch.load(Ordering::SeqCst) < 10 {
            thread::sleep(Duration::from_micros(200));
        }
        exit_loop.exit();
    });

    event_loop.run().expect("run loop");
    watchdog.join().expect("watchdog thread panicked");

    assert!(ticks.load(Ordering::SeqCst) >= 10, "expected at least 10 ticks before exit");
}

#[test]
fn ticker_reschedules_drift_free() {
    // A ticker's deadline advances by exactly `period`, never `now + period`
    // (§4.2), so a slow callback does not let later ticks creep forward.
    let event_loop = Loop::new().expect("backend init");
    let period = Duration::from_millis(2);

    let fires = Arc::new(AtomicU32::new(0));
    let counter = fires.clone();
    let ticker = Ticker::new(period, move |_tick| {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_micros(200));
    });
    event_loop.start(&ticker).expect("start ticker");

    let deadline = std::time::Instant::now() + Duration::from_millis(40);
    while std::time::Instant::now() < deadline && fires.load(Ordering::SeqCst) < 15 {
        event_loop.poll(Some(Duration::from_millis(5))).expect("poll");
        event_loop.dispatch();
    }

    assert!(fires.load(Ordering::SeqCst) >= 10, "expected steady ticks within the time budget");
}
