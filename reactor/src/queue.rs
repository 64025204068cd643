//! The pending-dispatch event queue (§4.3).
//!
//! A FIFO of sources awaiting their callback. Enqueue is callable from the
//! dispatch thread, backend poll threads, worker threads, and (indirectly,
//! via the backend's signal-delivery descriptor) signal context; dequeue
//! happens only on the dispatch thread, inside [`crate::Loop::dispatch`].

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use crate::mask::EventMask;
use crate::object::Dispatchable;

#[derive(Default)]
pub(crate) struct EventQueue {
    inner: Mutex<VecDeque<Arc<dyn Dispatchable>>>,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueues `source`, latching `revents` first (§4.3): the bits
    /// themselves live on the source's own per-variant state (only
    /// `Handler` overrides [`Dispatchable::latch_revents`]; every other
    /// variant's latch is its one-shot "armed" state), so this always ORs
    /// in `revents` before checking whether a pending entry already
    /// exists. The `queued` atomic on [`crate::object::ObjectCore`] is the
    /// actual "at most one pending entry per source" latch: a
    /// compare-and-set so concurrent emitters (a backend poll thread and a
    /// worker thread, say) never both observe "not queued" and
    /// double-enqueue the same source. Returns `true` if this call
    /// actually enqueued a new entry.
    pub(crate) fn emit(&self, source: Arc<dyn Dispatchable>, revents: EventMask) -> bool {
        source.latch_revents(revents);
        let core = source.core();
        if core
            .queued
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.inner.lock().unwrap().push_back(source);
        true
    }

    /// Drains everything that was pending when dispatch began, in FIFO
    /// order (§4.4: "all events that were in the queue when dispatch
    /// began"). Entries enqueued by a callback invoked from this same
    /// drain are not observed by it, matching the ordering contract.
    pub(crate) fn drain_for_dispatch(&self) -> Vec<Arc<dyn Dispatchable>> {
        let mut guard = self.inner.lock().unwrap();
        let drained: Vec<Arc<dyn Dispatchable>> = guard.drain(..).collect();
        drop(guard);
        for source in &drained {
            source.core().queued.store(false, Ordering::Release);
        }
        drained
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
