//! `EventMask` is a plain bitflags set over {READ, WRITE, OOB} (§6 "Handler
//! configuration": `set_event_mask`/`get_event_mask`, `get_revents`).

use pretty_assertions::assert_eq;
use reactor_loop::EventMask;
use test_case::test_case;

#[test_case(EventMask::READ, EventMask::WRITE, EventMask::READ | EventMask::WRITE; "read or write")]
#[test_case(EventMask::READ, EventMask::READ, EventMask::READ; "read or read is read")]
#[test_case(EventMask::empty(), EventMask::OOB, EventMask::OOB; "empty or oob is oob")]
#[test_case(EventMask::READ | EventMask::WRITE, EventMask::OOB, EventMask::READ | EventMask::WRITE | EventMask::OOB; "all three")]
fn mask_union_matches_expected(a: EventMask, b: EventMask, expected: EventMask) {
    assert_eq!(a | b, expected);
}

#[test]
fn empty_mask_contains_nothing() {
    let mask = EventMask::empty();
    assert_eq!(mask.contains(EventMask::READ), false);
    assert_eq!(mask.contains(EventMask::WRITE), false);
    assert_eq!(mask.contains(EventMask::OOB), false);
}
