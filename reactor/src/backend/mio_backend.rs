//! The reference backend (§4.6): `mio` for fd readiness plus an `mio::Waker`
//! for native interrupt, `signal-hook-mio` for signal delivery translated
//! into a safe synchronous emission instead of running inside a signal
//! handler (§4.3 "Signal-safe emission").
//!
//! Deadlines are not polled against a kernel timer descriptor: `mio` has no
//! portable timerfd/kqueue-EVFILT_TIMER abstraction exposed uniformly, so
//! `set_deadline` just records the instant and [`MioBackend::poll`] computes
//! `mio`'s timeout argument from it directly, the same way the loop core
//! already has to compute a timeout from the timer set for every poll call.

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};
use signal_hook_mio::v1_0::Signals;
use tracing::warn;

use super::{Backend, BackendFlags, ClockId, Interrupt};
use crate::id::ObjectId;
use crate::mask::EventMask;
use crate::reactor_loop::LoopShared;

impl Interrupt for Waker {
    fn interrupt(&self) -> io::Result<()> {
        self.wake()
    }
}

/// Reserved for the interrupt waker; ids start at 1 so this never collides
/// with a real [`ObjectId`].
const WAKER_TOKEN: Token = Token(usize::MAX);
/// Reserved for the signal-delivery descriptor.
const SIGNALS_TOKEN: Token = Token(usize::MAX - 1);

pub(crate) struct MioBackend {
    poll: Poll,
    events: Events,
    waker: Arc<Waker>,
    signals: Signals,
    /// Which ids are subscribed to which signal number. More than one
    /// `Signal` object may watch the same `signo`; all of them fire.
    signal_subscribers: Mutex<Vec<(i32, ObjectId)>>,
}

impl MioBackend {
    pub(crate) fn new() -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        let mut signals = Signals::new([])?;
        poll.registry().register(&mut signals, SIGNALS_TOKEN, Interest::READABLE)?;
        Ok(Self {
            poll,
            events: Events::with_capacity(256),
            waker,
            signals,
            signal_subscribers: Mutex::new(Vec::new()),
        })
    }

    fn interest_for(mask: EventMask) -> Option<Interest> {
        let mut interest: Option<Interest> = None;
        if mask.contains(EventMask::READ) || mask.contains(EventMask::OOB) {
            interest = Some(Interest::READABLE);
        }
        if mask.contains(EventMask::WRITE) {
            interest = Some(interest.map_or(Interest::WRITABLE, |i| i.add(Interest::WRITABLE)));
        }
        interest
    }

    fn token_for(id: ObjectId) -> Token {
        Token(id.as_u64() as usize)
    }
}

impl Backend for MioBackend {
    fn flags(&self) -> BackendFlags {
        // epoll (and kqueue, via mio's abstraction) report readiness
        // level-triggered through mio's default registration; no re-arm
        // needed in `post_dispatch`.
        BackendFlags::empty()
    }

    fn clock_id(&self) -> ClockId {
        ClockId::Monotonic
    }

    /// The underlying epoll/kqueue descriptor. Both facilities are
    /// themselves pollable by an outer `poll`/`select`/`epoll_wait`, which
    /// is exactly the nesting trick §4.4 `get_fd` and §8 scenario 6 ask
    /// for: this loop becomes readable from the outside whenever it has a
    /// registered fd, timer, or signal ready to report.
    fn get_fd(&self) -> Option<RawFd> {
        Some(self.poll.as_raw_fd())
    }

    fn add_fd(&mut self, id: ObjectId, fd: RawFd, mask: EventMask) -> io::Result<()> {
        let interest = Self::interest_for(mask)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty event mask"))?;
        self.poll.registry().register(&mut SourceFd(&fd), Self::token_for(id), interest)
    }

    fn mod_fd(&mut self, id: ObjectId, fd: RawFd, mask: EventMask) -> io::Result<()> {
        let interest = Self::interest_for(mask)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty event mask"))?;
        self.poll.registry().reregister(&mut SourceFd(&fd), Self::token_for(id), interest)
    }

    fn del_fd(&mut self, id: ObjectId, fd: RawFd) -> io::Result<()> {
        let _ = id;
        self.poll.registry().deregister(&mut SourceFd(&fd))
    }

    fn add_signal(&mut self, id: ObjectId, signo: i32) -> io::Result<()> {
        self.signals.handle().add_signal(signo)?;
        self.signal_subscribers.lock().unwrap().push((signo, id));
        Ok(())
    }

    fn del_signal(&mut self, id: ObjectId, signo: i32) -> io::Result<()> {
        self.signal_subscribers.lock().unwrap().retain(|(s, i)| !(*s == signo && *i == id));
        Ok(())
    }

    fn set_deadline(&mut self, _deadline: Option<Instant>) {
        // Nothing to program: `poll`'s caller (the loop core) derives the
        // `mio` timeout directly from the timer set on every call.
    }

    fn poll(&mut self, timeout: Option<Duration>, loop_shared: &LoopShared) -> io::Result<usize> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(err) => return Err(err),
        }

        let mut count = 0usize;
        for event in self.events.iter() {
            let token = event.token();
            if token == WAKER_TOKEN {
                continue;
            }
            if token == SIGNALS_TOKEN {
                for signo in self.signals.pending() {
                    let ids: Vec<ObjectId> = self
                        .signal_subscribers
                        .lock()
                        .unwrap()
                        .iter()
                        .filter(|(s, _)| *s == signo)
                        .map(|(_, id)| *id)
                        .collect();
                    for id in ids {
                        loop_shared.emit_signal(id);
                        count += 1;
                    }
                }
                continue;
            }

            let id = ObjectId::from_raw(token.0 as u64);
            let mut revents = EventMask::empty();
            if event.is_readable() {
                revents |= EventMask::READ;
            }
            if event.is_writable() {
                revents |= EventMask::WRITE;
            }
            if event.is_priority() {
                revents |= EventMask::OOB;
            }
            if revents.is_empty() {
                warn!(%id, "mio event carried no recognized readiness bits");
                continue;
            }
            loop_shared.emit_fd(id, revents);
            count += 1;
        }
        Ok(count)
    }

    fn interrupt_handle(&self) -> Arc<dyn Interrupt> {
        self.waker.clone()
    }
}
