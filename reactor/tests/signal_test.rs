//! Scenario 3 (signal under load): a signal callback runs exactly once on
//! the dispatch thread even while many timers are also expiring, and
//! signal delivery never starves the timer callbacks (§4.3, §8 scenario 3).
//!
//! Each test in this file raises a real OS signal in-process, so they are
//! serialized to avoid one test's raise being observed by another test's
//! subscription within the same test binary.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reactor_loop::{Loop, Signal, Timer};
use serial_test::serial;

#[test]
#[serial]
fn signal_fires_once_under_timer_load() {
    let event_loop = Loop::new().expect("backend init");

    let signal_hits = Arc::new(AtomicU32::new(0));
    let hits = signal_hits.clone();
    let signal = Signal::new(signal_hook::consts::SIGUSR1, move |_s| {
        hits.fetch_add(1, Ordering::SeqCst);
    });
    event_loop.start(&signal).expect("start signal");

    let timer_count = 1_000;
    let timer_hits = Arc::new(AtomicU32::new(0));
    let mut timers = Vec::with_capacity(timer_count);
    for _ in 0..timer_count {
        let hits = timer_hits.clone();
        let timer = Timer::new(Duration::from_millis(5), move |_t| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        event_loop.start(&timer).expect("start timer");
        timers.push(timer);
    }

    let raiser_loop = event_loop.clone();
    let raiser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(2));
        signal_hook::low_level::raise(signal_hook::consts::SIGUSR1).expect("raise SIGUSR1");
        let _ = raiser_loop.interrupt();
    });

    let budget = if is_ci::is_ci() { Duration::from_millis(500) } else { Duration::from_millis(100) };
    let deadline = Instant::now() + budget;
    while Instant::now() < deadline && (timer_hits.load(Ordering::SeqCst) as usize) < timer_count {
        event_loop.poll(Some(Duration::from_millis(10))).expect("poll");
        event_loop.dispatch();
    }
    raiser.join().expect("raiser thread panicked");

    assert_eq!(signal_hits.load(Ordering::SeqCst), 1, "signal callback runs exactly once");
    assert_eq!(timer_hits.load(Ordering::SeqCst) as usize, timer_count, "every timer still fires under signal load");

    for timer in &timers {
        event_loop.stop(timer);
    }
    event_loop.stop(&signal);
}

#[test]
#[serial]
fn two_signal_subscribers_both_observe_one_raise() {
    let event_loop = Loop::new().expect("backend init");

    let a_hits = Arc::new(AtomicU32::new(0));
    let b_hits = Arc::new(AtomicU32::new(0));

    let a_counter = a_hits.clone();
    let signal_a = Signal::new(signal_hook::consts::SIGUSR2, move |_s| {
        a_counter.fetch_add(1, Ordering::SeqCst);
    });
    let b_counter = b_hits.clone();
    let signal_b = Signal::new(signal_hook::consts::SIGUSR2, move |_s| {
        b_counter.fetch_add(1, Ordering::SeqCst);
    });
    event_loop.start(&signal_a).expect("start signal a");
    event_loop.start(&signal_b).expect("start signal b");

    signal_hook::low_level::raise(signal_hook::consts::SIGUSR2).expect("raise SIGUSR2");

    let deadline = Instant::now() + Duration::from_millis(200);
    while Instant::now() < deadline && (a_hits.load(Ordering::SeqCst) == 0 || b_hits.load(Ordering::SeqCst) == 0) {
        event_loop.poll(Some(Duration::from_millis(10))).expect("poll");
        event_loop.dispatch();
    }

    assert_eq!(a_hits.load(Ordering::SeqCst), 1);
    assert_eq!(b_hits.load(Ordering::SeqCst), 1);

    event_loop.stop(&signal_a);
    event_loop.stop(&signal_b);
}
