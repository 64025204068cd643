//! Timers and tickers (§4.2 C2) and the timer set that orders them by
//! deadline on the loop's monotonic clock.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{LoopError, Result};
use crate::id::ObjectId;
use crate::object::{ClaimError, Dispatchable, EventSource, Installable, ObjectCore};
use crate::reactor_loop::LoopShared;

struct TimerState {
    /// Requested duration / ticker period.
    duration: Duration,
    /// Absolute deadline on the monotonic clock. `None` once a one-shot
    /// timer has fired and been removed from the set.
    deadline: Option<Instant>,
    /// `true` for `Ticker`, `false` for `Timer`: whether firing reschedules
    /// (§4.2: "advances its deadline by `period`, not by `now + period`,
    /// to prevent drift") rather than stopping.
    repeating: bool,
}

pub(crate) struct TimerNode {
    core: ObjectCore,
    state: Mutex<TimerState>,
    callback: Mutex<Box<dyn FnMut(&TimerNodeHandle) + Send>>,
}

/// Opaque handle passed to a timer/ticker callback; carries only what a
/// callback legitimately needs (its own id), since mutating deadline state
/// from inside the callback is the core's job, not the user's.
pub struct TimerNodeHandle<'a>(&'a TimerNode);

impl TimerNodeHandle<'_> {
    pub fn id(&self) -> ObjectId {
        self.0.core.id()
    }
}

impl fmt::Debug for TimerNodeHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerNodeHandle").field("id", &self.id()).finish()
    }
}

impl Dispatchable for TimerNode {
    fn id(&self) -> ObjectId {
        self.core.id()
    }

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn invoke(&self) {
        let handle = TimerNodeHandle(self);
        (self.callback.lock().unwrap())(&handle);
    }
}

impl Drop for TimerNode {
    fn drop(&mut self) {
        crate::registry::remove(self.core.id());
    }
}

fn new_node(duration: Duration, repeating: bool, callback: impl FnMut(&TimerNodeHandle) + Send + 'static) -> Arc<TimerNode> {
    let node = Arc::new(TimerNode {
        core: ObjectCore::new(),
        state: Mutex::new(TimerState {
            duration,
            deadline: None,
            repeating,
        }),
        callback: Mutex::new(Box::new(callback)),
    });
    crate::registry::insert(node.core.id(), &node);
    node
}

fn install_timer(node: &Arc<TimerNode>, loop_shared: &Arc<LoopShared>) -> Result<()> {
    match node.core.claim(loop_shared) {
        Ok(()) => {
            let mut state = node.state.lock().unwrap();
            let now = Instant::now();
            // duration == 0 fires immediately (§4.2): deadline is `now`, so
            // the very next `earliest()` query reports it already due.
            state.deadline = Some(now + state.duration);
            drop(state);
            loop_shared.timer_set.insert(node.clone());
            loop_shared.interrupt_for_new_deadline();
            Ok(())
        }
        Err(ClaimError::AlreadyStarted) => Err(LoopError::AlreadyStarted(node.core.id())),
        Err(ClaimError::StartedOnAnotherLoop) => Err(LoopError::StartedOnAnotherLoop(node.core.id())),
    }
}

fn uninstall_timer(node: &Arc<TimerNode>, loop_shared: &LoopShared) {
    loop_shared.timer_set.remove(node.core.id());
    node.core.release();
}

/// A one-shot deadline (§3 `Timer`). Fires once, then stops itself.
#[derive(Clone)]
pub struct Timer(Arc<TimerNode>);

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer").field("id", &self.0.core.id()).finish()
    }
}

impl Timer {
    /// Creates a timer that fires `duration` after it is started. A zero
    /// duration fires on the very next dispatch (§4.2).
    pub fn new(duration: Duration, callback: impl FnMut(&TimerNodeHandle) + Send + 'static) -> Self {
        Self(new_node(duration, false, callback))
    }

    /// Changes the duration. Takes effect the next time this timer is
    /// started; it does not retroactively reschedule an armed deadline.
    pub fn set_duration(&self, duration: Duration) {
        self.0.state.lock().unwrap().duration = duration;
    }
}

impl EventSource for Timer {
    type Node = TimerNode;
    fn from_node(node: Arc<TimerNode>) -> Self {
        Self(node)
    }
    fn node(&self) -> &Arc<TimerNode> {
        &self.0
    }
    fn core_of(node: &TimerNode) -> &ObjectCore {
        &node.core
    }
}

impl Installable for Timer {
    fn as_dispatchable(&self) -> Arc<dyn Dispatchable> {
        self.0.clone()
    }
    fn install(&self, loop_shared: &Arc<LoopShared>) -> Result<()> {
        install_timer(&self.0, loop_shared)
    }
    fn uninstall(&self, loop_shared: &LoopShared) {
        uninstall_timer(&self.0, loop_shared);
    }
}

/// A repeating deadline (§3 `Ticker`). Reschedules drift-free after every
/// fire by advancing its deadline by exactly `period`.
#[derive(Clone)]
pub struct Ticker(Arc<TimerNode>);

impl fmt::Debug for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticker").field("id", &self.0.core.id()).finish()
    }
}

impl Ticker {
    /// Creates a ticker with the given period. A period of zero is
    /// undefined behavior per §4.2 and will panic rather than spin.
    pub fn new(period: Duration, callback: impl FnMut(&TimerNodeHandle) + Send + 'static) -> Self {
        assert!(!period.is_zero(), "Ticker period must be non-zero");
        Self(new_node(period, true, callback))
    }

    pub fn set_period(&self, period: Duration) {
        assert!(!period.is_zero(), "Ticker period must be non-zero");
        self.0.state.lock().unwrap().duration = period;
    }
}

impl EventSource for Ticker {
    type Node = TimerNode;
    fn from_node(node: Arc<TimerNode>) -> Self {
        Self(node)
    }
    fn node(&self) -> &Arc<TimerNode> {
        &self.0
    }
    fn core_of(node: &TimerNode) -> &ObjectCore {
        &node.core
    }
}

impl Installable for Ticker {
    fn as_dispatchable(&self) -> Arc<dyn Dispatchable> {
        self.0.clone()
    }
    fn install(&self, loop_shared: &Arc<LoopShared>) -> Result<()> {
        install_timer(&self.0, loop_shared)
    }
    fn uninstall(&self, loop_shared: &LoopShared) {
        uninstall_timer(&self.0, loop_shared);
    }
}

/// The ordered set of armed timers/tickers (§4.2 C2).
///
/// A linear scan is explicitly sanctioned by the design for the populations
/// this crate expects (hundreds to low thousands, §8 scenario 3); it keeps
/// `insert`/`remove` O(1) at the cost of an O(n) `earliest`/expiry scan,
/// which is the right trade for a structure whose size rarely exceeds a few
/// thousand entries and whose `earliest` is recomputed once per dispatch.
#[derive(Default)]
pub(crate) struct TimerSet {
    entries: Mutex<Vec<Arc<TimerNode>>>,
}

impl TimerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, node: Arc<TimerNode>) {
        self.entries.lock().unwrap().push(node);
    }

    pub(crate) fn remove(&self, id: ObjectId) {
        self.entries.lock().unwrap().retain(|n| n.core.id() != id);
    }

    /// The timer with the minimum deadline, if any are armed.
    pub(crate) fn earliest_deadline(&self) -> Option<Instant> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|n| n.state.lock().unwrap().deadline)
            .min()
    }

    /// Removes and returns every timer whose deadline is `<= now`, oldest
    /// deadline first (§4.4 dispatch ordering, rule 1). Tickers are
    /// rescheduled in place (by exactly `period`, drift-free) and stay in
    /// the set; one-shot timers are dropped from the set entirely.
    pub(crate) fn pop_expired(&self, now: Instant) -> Vec<Arc<TimerNode>> {
        let mut guard = self.entries.lock().unwrap();
        let mut expired: Vec<(Instant, Arc<TimerNode>)> = Vec::new();
        guard.retain(|node| {
            let mut state = node.state.lock().unwrap();
            let Some(deadline) = state.deadline else {
                return false;
            };
            if deadline > now {
                return true;
            }
            let keep = if state.repeating {
                // Advance by `period`, not `now + period`: a caller that is
                // delayed does not get to "catch up" by compressing future
                // periods, but also never falls permanently behind wall
                // time by more than one period (§4.2).
                state.deadline = Some(deadline + state.duration);
                true
            } else {
                state.deadline = None;
                false
            };
            drop(state);
            expired.push((deadline, node.clone()));
            keep
        });
        drop(guard);
        expired.sort_by_key(|(deadline, _)| *deadline);
        expired.into_iter().map(|(_, node)| node).collect()
    }
}
