//! Scenario 2 (handler latching): a handler's callback fires once per
//! dispatch for any readiness observed since the previous one, delivering
//! the bitwise OR of everything latched in between (§4.3, §5).

use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reactor_loop::{EventMask, Handler, Loop};

#[test]
fn handler_fires_once_per_dispatch_with_ored_revents() {
    let (a, mut b) = UnixStream::pair().expect("socketpair");
    let fd_a = a.as_raw_fd();

    let event_loop = Loop::new().expect("backend init");
    let invocations = Arc::new(AtomicU32::new(0));
    let last_revents = Arc::new(Mutex::new(EventMask::empty()));

    let inv = invocations.clone();
    let observed = last_revents.clone();
    let handler = Handler::new(fd_a, EventMask::READ, move |_h, revents| {
        inv.fetch_add(1, Ordering::SeqCst);
        *observed.lock().unwrap() = revents;
    });
    event_loop.start(&handler).expect("start handler");

    b.write_all(&[1]).expect("write one byte");

    event_loop.poll(Some(Duration::from_millis(200))).expect("poll");
    event_loop.dispatch();

    assert_eq!(invocations.load(Ordering::SeqCst), 1, "exactly one callback invocation per dispatch");
    assert!(last_revents.lock().unwrap().contains(EventMask::READ));
    assert!(handler.revents().is_empty(), "revents is cleared once delivered to the callback");

    // `fd_a` was never drained, so on this (level-triggered) backend the
    // fd is still readable: the handler fires again on the next dispatch,
    // and its latched revents are empty again beforehand.
    event_loop.poll(Some(Duration::from_millis(200))).expect("poll again");
    event_loop.dispatch();
    assert_eq!(invocations.load(Ordering::SeqCst), 2, "level-triggered backend re-reports readiness");

    // Dropping `a` keeps fd_a alive long enough for both dispatches above;
    // explicit stop before the socket closes.
    event_loop.stop(&handler);
}

#[test]
fn handler_latches_multiple_emits_before_dispatch() {
    // Two writes land before a single poll/dispatch pass: the spec requires
    // at most one pending queue entry, delivering the OR of both emits.
    let (a, mut b) = UnixStream::pair().expect("socketpair");
    let fd_a = a.as_raw_fd();

    let event_loop = Loop::new().expect("backend init");
    let invocations = Arc::new(AtomicU32::new(0));
    let inv = invocations.clone();
    let handler = Handler::new(fd_a, EventMask::READ, move |_h, _revents| {
        inv.fetch_add(1, Ordering::SeqCst);
    });
    event_loop.start(&handler).expect("start handler");

    b.write_all(&[1, 2]).expect("write two bytes in one syscall");
    event_loop.poll(Some(Duration::from_millis(200))).expect("poll");
    event_loop.dispatch();

    assert_eq!(invocations.load(Ordering::SeqCst), 1, "one readiness event, one callback invocation");
}
