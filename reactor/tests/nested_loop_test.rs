//! Scenario 6 (nested loop): `Loop::get_fd` returns a descriptor that an
//! outer reactor can poll to learn this loop has pending work, and the
//! inner loop's own `poll`/`dispatch` then consume the event normally.

use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use reactor_loop::{EventMask, Handler, Loop};

#[test]
fn outer_reactor_observes_inner_loop_readiness() {
    let inner = Loop::new().expect("inner backend init");

    let (fd_a_owner, mut fd_b) = UnixStream::pair().expect("socketpair");
    let fd_a = fd_a_owner.as_raw_fd();
    let handler = Handler::new(fd_a, EventMask::READ, |_h, _revents| {});
    inner.start(&handler).expect("start handler on inner loop");

    let inner_fd = inner.get_fd().expect("reference backend exposes its epoll/kqueue fd");

    let mut outer = Poll::new().expect("outer poll");
    let mut events = Events::with_capacity(8);
    outer
        .registry()
        .register(&mut SourceFd(&inner_fd), Token(0), Interest::READABLE)
        .expect("register inner loop's fd with the outer reactor");

    fd_b.write_all(&[7]).expect("write one byte");

    outer.poll(&mut events, Some(Duration::from_millis(500))).expect("outer poll");
    assert!(
        events.iter().any(|event| event.token() == Token(0)),
        "the outer reactor should observe the inner loop's readiness"
    );

    let observed = inner.poll(Some(Duration::from_millis(0))).expect("inner poll consumes the event");
    assert_eq!(observed, 1);
    inner.dispatch();

    inner.stop(&handler);
}
