//! The loop core (§4.4 C7): binds a backend, owns the started set, timer
//! set, idle list and event queue, and implements `poll`/`dispatch`/`run`.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use crate::backend::mio_backend::MioBackend;
use crate::backend::{Backend, Interrupt};
use crate::config::LoopConfig;
use crate::error::{LoopError, Result};
use crate::id::ObjectId;
use crate::idle::IdleList;
use crate::mask::EventMask;
use crate::object::{EventSource, Installable};
use crate::queue::EventQueue;
use crate::started::StartedSet;
use crate::timer::TimerSet;

/// State shared by a [`Loop`] and every event source started on it. Every
/// variant module reaches into this through `Arc<LoopShared>` rather than
/// through `Loop` itself, so a `Handler`/`Timer`/... can outlive the
/// `Loop` handle that started it (the loop stays alive as long as
/// anything still holds a weak link to it plus at least one started
/// source keeping a strong one).
pub(crate) struct LoopShared {
    id: ObjectId,
    pub(crate) backend: Mutex<Box<dyn Backend>>,
    /// The backend's waker, obtained once at construction and kept outside
    /// `backend`'s mutex (see [`Interrupt`]): `poll` holds that mutex for
    /// the entire blocking call, so anything routed through it to wake a
    /// concurrently blocked `poll` would have to wait for `poll` to return
    /// on its own first.
    interrupt_handle: Arc<dyn Interrupt>,
    pub(crate) started: StartedSet,
    pub(crate) timer_set: TimerSet,
    pub(crate) idle_list: IdleList,
    pub(crate) queue: EventQueue,
    exiting: AtomicBool,
    span_prefix: Option<String>,
    /// Set the first time this loop calls `require_workers` (§4.5
    /// "user-count"). Guards the matching [`crate::thread_pool::release_user`]
    /// call in [`Drop`] so a loop that never touched the pool doesn't count
    /// as one of its users.
    pool_acquired: AtomicBool,
}

impl Drop for LoopShared {
    fn drop(&mut self) {
        if self.pool_acquired.load(Ordering::Acquire) {
            crate::thread_pool::release_user();
        }
    }
}

impl LoopShared {
    /// Re-derives the backend's next wakeup from the current earliest
    /// timer deadline and nudges a concurrent `poll` so it notices sooner
    /// rather than waiting out its old timeout (§4.2, used whenever a
    /// timer/ticker is started or its duration changes).
    pub(crate) fn interrupt_for_new_deadline(&self) {
        let deadline = self.timer_set.earliest_deadline();
        self.backend.lock().unwrap().set_deadline(deadline);
        if let Err(err) = self.interrupt() {
            warn!(loop_id = %self.id, %err, "failed to interrupt backend after arming new deadline");
        }
    }

    pub(crate) fn interrupt(&self) -> io::Result<()> {
        self.interrupt_handle.interrupt()
    }

    /// Called by a backend from inside [`Backend::poll`] when it observes
    /// readiness on a started `Handler`'s fd.
    pub(crate) fn emit_fd(&self, id: ObjectId, revents: EventMask) {
        if let Some(source) = self.started.get(id) {
            self.queue.emit(source, revents);
        }
    }

    /// Called by a backend from inside [`Backend::poll`] when it observes
    /// a subscribed signal.
    pub(crate) fn emit_signal(&self, id: ObjectId) {
        if let Some(source) = self.started.get(id) {
            self.queue.emit(source, EventMask::empty());
        }
    }
}

/// A single-threaded event loop multiplexing fd readiness, timers,
/// tickers, signals, thread-pool work, and idle callbacks.
///
/// Cloning a `Loop` shares the same underlying state (it is a thin handle
/// over `Arc<LoopShared>`); dropping the last clone does not forcibly stop
/// sources still started on it; those keep it alive until they `stop`.
#[derive(Clone)]
pub struct Loop(pub(crate) Arc<LoopShared>);

impl fmt::Debug for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loop").field("id", &self.0.id).finish()
    }
}

impl Loop {
    /// Creates a loop with the default configuration and the reference
    /// (`mio`-backed) backend.
    pub fn new() -> Result<Self> {
        Self::with_config(LoopConfig::default())
    }

    pub fn with_config(config: LoopConfig) -> Result<Self> {
        let backend = MioBackend::new().map_err(LoopError::BackendInit)?;
        let interrupt_handle = backend.interrupt_handle();
        let shared = Arc::new(LoopShared {
            id: ObjectId::next(),
            backend: Mutex::new(Box::new(backend)),
            interrupt_handle,
            started: StartedSet::new(),
            timer_set: TimerSet::new(),
            idle_list: IdleList::new(),
            queue: EventQueue::new(),
            exiting: AtomicBool::new(false),
            span_prefix: config.span_prefix.clone(),
            pool_acquired: AtomicBool::new(false),
        });
        debug!(loop_id = %shared.id, clock_id = %shared.backend.lock().unwrap().clock_id(), "loop initialized");
        let this = Self(shared);
        if config.eager_default_pool {
            this.require_workers(config.initial_pool_size.map_or(-1, |n| n as isize))?;
        }
        Ok(this)
    }

    fn span_label(&self) -> String {
        match &self.0.span_prefix {
            Some(prefix) => format!("{prefix}/{}", self.0.id),
            None => self.0.id.to_string(),
        }
    }

    /// Starts `obj` on this loop: installs it at the backend (or the
    /// appropriate internal collection) and adds the loop's own strong
    /// reference (§3 invariant 1). Idempotent-on-error only in the sense
    /// that calling `start` twice on the same loop reports
    /// [`LoopError::AlreadyStarted`] rather than silently succeeding,
    /// matching §4.4.
    #[allow(private_bounds, private_interfaces)]
    pub fn start<S: Installable>(&self, obj: &S) -> Result<()> {
        obj.install(&self.0)
    }

    /// Stops `obj`: uninstalls it at the backend, removes the loop's own
    /// reference, and releases the ownership claim. Idempotent (§5):
    /// stopping an already-stopped source is a no-op.
    #[allow(private_bounds, private_interfaces)]
    pub fn stop<S: Installable>(&self, obj: &S) {
        if obj.is_started() {
            obj.uninstall(&self.0);
        }
    }

    #[allow(private_bounds, private_interfaces)]
    pub fn is_started<S: Installable>(&self, obj: &S) -> bool {
        obj.is_started()
    }

    /// Ensures the default thread pool has at least `n` workers (`n < 0`
    /// means "as many as logical CPUs"). Shared process-wide: calling this
    /// from more than one loop in the same process is fine and additive
    /// only up to the highest requested `n`. The first call from a given
    /// loop registers it as one of the pool's users (§4.5): once every
    /// loop that ever called this releases it (on drop), the pool's
    /// workers are torn down.
    pub fn require_workers(&self, n: isize) -> Result<()> {
        if !self.0.pool_acquired.swap(true, Ordering::AcqRel) {
            crate::thread_pool::acquire_user();
        }
        crate::thread_pool::require_workers(n)
    }

    /// A descriptor that becomes readable when this loop has pending
    /// work, so it can be nested inside another reactor's readiness set
    /// (§8 scenario 6). `None` if the bound backend cannot offer one.
    pub fn get_fd(&self) -> Option<std::os::fd::RawFd> {
        self.0.backend.lock().unwrap().get_fd()
    }

    /// Blocks until an event is observed, the earliest timer deadline
    /// elapses, or the loop is interrupted. Does not invoke any
    /// callbacks; call [`Self::dispatch`] afterward. `timeout` is capped
    /// by the earliest armed timer deadline regardless of what the caller
    /// requests, so a timer is never missed by an over-long poll.
    pub fn poll(&self, timeout: Option<Duration>) -> io::Result<usize> {
        let now = Instant::now();
        let timer_bound = self.0.timer_set.earliest_deadline().map(|deadline| deadline.saturating_duration_since(now));
        let effective = match (timeout, timer_bound) {
            (Some(t), Some(d)) => Some(t.min(d)),
            (Some(t), None) => Some(t),
            (None, Some(d)) => Some(d),
            (None, None) => None,
        };
        trace!(loop_id = %self.span_label(), ?effective, "poll");
        let mut backend = self.0.backend.lock().unwrap();
        let result = backend.poll(effective, &self.0);
        if let Err(err) = &result {
            warn!(loop_id = %self.span_label(), %err, "backend poll failed");
        }
        result
    }

    /// Runs exactly one dispatch pass (§4.4 ordering): expired timers,
    /// then whatever was already queued, then rearm the backend deadline,
    /// then idle callbacks, then the backend's post-dispatch hook.
    pub fn dispatch(&self) {
        let _span = tracing::debug_span!("dispatch", loop_id = %self.span_label()).entered();
        let now = Instant::now();
        for timer in self.0.timer_set.pop_expired(now) {
            self.0.queue.emit(timer, EventMask::empty());
        }

        for source in self.0.queue.drain_for_dispatch() {
            // An extra `Arc<dyn Dispatchable>` clone is already held by this
            // loop binding for the duration of the call (§9 "Callback
            // reentrancy"): a `stop()` from inside the callback that drops
            // the last other reference cannot destroy the source under its
            // own stack frame. A panicking callback is caught here rather
            // than allowed to unwind through the dispatch loop and take
            // every other pending source with it (ambient panic policy).
            let id = source.id();
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| source.invoke())) {
                error!(%id, ?panic, "callback panicked; dispatch continues with the next source");
            }
        }

        self.0.interrupt_for_new_deadline();
        self.0.idle_list.run_all();

        let mut backend = self.0.backend.lock().unwrap();
        backend.post_dispatch(&self.0);
    }

    /// Runs `poll`/`dispatch` until [`Self::exit`] is called. Returns once
    /// the exit flag is observed, after the dispatch pass it was noticed
    /// in has completed.
    pub fn run(&self) -> io::Result<()> {
        while !self.0.exiting.load(Ordering::Acquire) {
            self.poll(None)?;
            self.dispatch();
        }
        Ok(())
    }

    /// Sets the exit flag and wakes a concurrently blocked `poll`. Safe to
    /// call from any thread, including while another thread is blocked in
    /// `poll`: this goes through the hoisted [`Interrupt`] handle rather
    /// than the backend's own mutex, so it never waits on a poll in
    /// progress.
    pub fn exit(&self) {
        self.0.exiting.store(true, Ordering::Release);
        if let Err(err) = self.0.interrupt_handle.interrupt() {
            warn!(loop_id = %self.0.id, %err, "failed to interrupt backend on exit");
        }
    }

    /// Causes a concurrently blocked `poll` to return promptly.
    pub fn interrupt(&self) -> io::Result<()> {
        self.0.interrupt()
    }
}
