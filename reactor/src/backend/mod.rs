//! The pluggable polling-backend contract (§4.6 C6).
//!
//! A backend owns the readiness multiplexer (epoll/kqueue/IOCP, here via
//! `mio`), the signal-delivery descriptor, and the "what's my next
//! wakeup" deadline. The core never reaches into OS APIs directly; every
//! interaction funnels through this trait, so a second backend is a matter
//! of implementing it rather than touching `reactor_loop.rs`.

pub(crate) mod mio_backend;

use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bitflags::bitflags;
use strum_macros::Display;

use crate::id::ObjectId;
use crate::mask::EventMask;
use crate::reactor_loop::LoopShared;

/// A cheap, lock-free handle that wakes a concurrent [`Backend::poll`]
/// (§4.4 `interrupt`). Obtained once from the backend at loop construction
/// and kept outside the backend's own mutex: a thread calling `interrupt`
/// (a worker reporting completion, `Loop::exit` from any thread) must
/// never contend with the thread blocked inside `poll` for the duration of
/// the blocking call, or it would wait for `poll` to return on its own —
/// defeating the point of interrupting it.
pub(crate) trait Interrupt: Send + Sync {
    fn interrupt(&self) -> io::Result<()>;
}

bitflags! {
    /// Capability flags a backend reports about itself (§4.6: "a record of
    /// function pointers and two scalar fields: feature flags ... and a
    /// monotonic clock identifier").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct BackendFlags: u8 {
        /// Readiness is edge-triggered: a `Handler` returning to `idle`
        /// after dispatch must be re-armed via `mod_fd`, or it will never
        /// fire again even though the fd is still ready (§4.6).
        const EDGE_TRIGGERED = 1 << 0;
    }
}

/// Which monotonic clock a backend's deadlines are measured against.
/// Every backend this crate ships uses the same process clock as
/// [`std::time::Instant`]; the enum exists so a future backend bound to a
/// different clock (e.g. `CLOCK_BOOTTIME`) can say so explicitly rather
/// than silently mixing clocks with the timer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum ClockId {
    Monotonic,
}

/// The capability contract a readiness multiplexer must satisfy (§4.6).
///
/// `new_state`/`del_state` from the original interface are just this
/// trait's constructor and [`Drop`] impl in Rust; there is no separate
/// opaque "state" pointer to allocate and free by hand.
pub(crate) trait Backend: Send {
    fn flags(&self) -> BackendFlags {
        BackendFlags::empty()
    }

    fn clock_id(&self) -> ClockId {
        ClockId::Monotonic
    }

    /// A descriptor the outer world can poll to learn this loop has work,
    /// for embedding one loop inside another's readiness set (§8 scenario
    /// 6). Not every backend can offer one.
    fn get_fd(&self) -> Option<RawFd> {
        None
    }

    fn add_fd(&mut self, id: ObjectId, fd: RawFd, mask: EventMask) -> io::Result<()>;

    /// Updates an already-installed subscription. The default falls back
    /// to `del_fd` + `add_fd`, exactly as §4.6 permits for backends that
    /// cannot update a subscription in place.
    fn mod_fd(&mut self, id: ObjectId, fd: RawFd, mask: EventMask) -> io::Result<()> {
        self.del_fd(id, fd)?;
        self.add_fd(id, fd, mask)
    }

    fn del_fd(&mut self, id: ObjectId, fd: RawFd) -> io::Result<()>;

    fn add_signal(&mut self, id: ObjectId, signo: i32) -> io::Result<()>;
    fn del_signal(&mut self, id: ObjectId, signo: i32) -> io::Result<()>;

    /// Programs the backend's wake-up for the loop's next timer deadline.
    /// Idempotent; called whenever the earliest armed timer changes,
    /// including becoming `None` (no more timers armed).
    fn set_deadline(&mut self, deadline: Option<Instant>);

    /// Blocks until a monitored fd is ready, a signal arrives, the
    /// deadline elapses, or [`Self::interrupt`] is called, then emits
    /// every observed event onto `loop_shared` and returns how many it
    /// observed. `timeout` is `None` for "block indefinitely" (no timers
    /// armed and nothing else scheduled `poll` to return early).
    fn poll(&mut self, timeout: Option<Duration>, loop_shared: &LoopShared) -> io::Result<usize>;

    /// Runs at the end of each dispatch pass, after idle callbacks. Used
    /// by edge-triggered backends to re-arm handlers that returned to
    /// `idle` during this pass.
    fn post_dispatch(&mut self, _loop_shared: &LoopShared) {}

    /// Returns the handle used to asynchronously unblock a concurrent
    /// [`Self::poll`] (§4.4 `interrupt`, and `exit`'s "may arrange for
    /// poll to return"). Cloned once at loop construction and stored
    /// outside the backend's mutex; every backend this crate ships builds
    /// it from a native waker (e.g. `mio::Waker`). A backend without a
    /// native waker would instead hand back a handle that writes to a
    /// self-pipe whose read end is registered as an internal handler.
    fn interrupt_handle(&self) -> Arc<dyn Interrupt>;
}
