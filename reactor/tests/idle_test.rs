//! Idle callbacks (§4.4 C4, §5): run after every dispatch pass, in
//! insertion order, whether or not any event was actually observed.

use std::sync::{Arc, Mutex};

use reactor_loop::{Idle, Loop};

#[test]
fn idle_callbacks_run_after_every_dispatch_in_insertion_order() {
    let event_loop = Loop::new().expect("backend init");
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = order.clone();
    let idle_a = Idle::new(move |_self| first.lock().unwrap().push('a'));
    let second = order.clone();
    let idle_b = Idle::new(move |_self| second.lock().unwrap().push('b'));

    event_loop.start(&idle_a).expect("start idle a");
    event_loop.start(&idle_b).expect("start idle b");

    // Nothing is queued and no timer is armed; dispatch still runs idle
    // callbacks every time it is called.
    event_loop.dispatch();
    assert_eq!(*order.lock().unwrap(), vec!['a', 'b']);

    event_loop.dispatch();
    assert_eq!(*order.lock().unwrap(), vec!['a', 'b', 'a', 'b']);
}

#[test]
fn idle_callback_may_stop_itself() {
    let event_loop = Loop::new().expect("backend init");
    let runs = Arc::new(Mutex::new(0u32));
    let counter = runs.clone();

    let idle = Idle::new(move |_self| {
        *counter.lock().unwrap() += 1;
    });
    event_loop.start(&idle).expect("start idle");

    event_loop.dispatch();
    event_loop.stop(&idle);
    event_loop.dispatch();

    assert_eq!(*runs.lock().unwrap(), 1, "an idle callback does not run again once stopped");
}
