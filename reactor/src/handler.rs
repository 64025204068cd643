//! File-descriptor readiness (§3 `Handler`).
//!
//! State machine per §4.6: `idle -> armed (start) -> pending (emit) -> idle
//! (dispatch)`. The revents latch that makes "pending" well-defined lives on
//! [`crate::object::ObjectCore`] (shared with every other variant); what's
//! specific to `Handler` is the fd, the subscribed mask, and the *observed*
//! revents delivered to the callback.

use std::fmt;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{LoopError, Result};
use crate::id::ObjectId;
use crate::mask::EventMask;
use crate::object::{ClaimError, Dispatchable, EventSource, Installable, ObjectCore};
use crate::reactor_loop::LoopShared;

pub(crate) struct HandlerNode {
    core: ObjectCore,
    fd: RawFd,
    mask: Mutex<EventMask>,
    /// The OR of every `revents` bit observed since the last dispatch
    /// (§5 "Ordering guarantees": "the bitwise OR of all revents observed
    /// since the last dispatch is delivered as a single callback
    /// invocation"). Stored separately from the queue's copy so
    /// `get_revents` reflects the latest state even before dispatch runs.
    revents: AtomicU8,
    callback: Mutex<Box<dyn FnMut(&HandlerRef, EventMask) + Send>>,
}

/// Borrowed view of a [`Handler`] passed to its callback.
///
/// A borrow rather than an owned handle: the event queue already keeps the
/// underlying node alive for the duration of the callback (§9 "Callback
/// reentrancy"), so there is no need to mint a second `Arc`. Code that
/// wants to `stop()` itself or a sibling handler from inside the callback
/// should capture an owned [`Handler`] clone in the closure instead.
pub struct HandlerRef<'a>(&'a HandlerNode);

impl HandlerRef<'_> {
    pub fn id(&self) -> ObjectId {
        self.0.core.id()
    }

    pub fn fd(&self) -> RawFd {
        self.0.fd
    }
}

impl fmt::Debug for HandlerRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRef").field("id", &self.id()).field("fd", &self.fd()).finish()
    }
}

impl Dispatchable for HandlerNode {
    fn id(&self) -> ObjectId {
        self.core.id()
    }

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn invoke(&self) {
        let revents = EventMask::from_bits_truncate(self.revents.swap(0, Ordering::AcqRel));
        let handle = HandlerRef(self);
        (self.callback.lock().unwrap())(&handle, revents);
    }

    fn latch_revents(&self, revents: EventMask) {
        self.revents.fetch_or(revents.bits(), Ordering::AcqRel);
    }
}

impl Drop for HandlerNode {
    fn drop(&mut self) {
        crate::registry::remove(self.core.id());
    }
}

/// A subscription to readiness on a raw file descriptor.
///
/// The handler does not own `fd`; closing it is the caller's
/// responsibility, and must happen only after `stop` (or drop).
#[derive(Clone)]
pub struct Handler(Arc<HandlerNode>);

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("id", &self.0.core.id()).field("fd", &self.0.fd).finish()
    }
}

impl Handler {
    /// Creates a handler watching `fd` for the directions in `mask`.
    pub fn new(fd: RawFd, mask: EventMask, callback: impl FnMut(&HandlerRef, EventMask) + Send + 'static) -> Self {
        let node = Arc::new(HandlerNode {
            core: ObjectCore::new(),
            fd,
            mask: Mutex::new(mask),
            revents: AtomicU8::new(0),
            callback: Mutex::new(Box::new(callback)),
        });
        crate::registry::insert(node.core.id(), &node);
        Self(node)
    }

    pub fn fd(&self) -> RawFd {
        self.0.fd
    }

    pub fn event_mask(&self) -> EventMask {
        *self.0.mask.lock().unwrap()
    }

    /// Changes the subscribed mask. If started, re-installs at the backend
    /// immediately (backends without `mod_fd` fall back to `del_fd` +
    /// `add_fd`, per §4.6).
    pub fn set_event_mask(&self, mask: EventMask) {
        *self.0.mask.lock().unwrap() = mask;
        if let Some(loop_shared) = self.0.core.owning_loop() {
            let _ = loop_shared.backend.lock().unwrap().mod_fd(self.0.core.id(), self.0.fd, mask);
        }
    }

    /// The readiness bits observed since the last dispatch, before they are
    /// delivered to the callback and cleared.
    pub fn revents(&self) -> EventMask {
        EventMask::from_bits_truncate(self.0.revents.load(Ordering::Acquire))
    }
}

impl EventSource for Handler {
    type Node = HandlerNode;
    fn from_node(node: Arc<HandlerNode>) -> Self {
        Self(node)
    }
    fn node(&self) -> &Arc<HandlerNode> {
        &self.0
    }
    fn core_of(node: &HandlerNode) -> &ObjectCore {
        &node.core
    }
}

impl Installable for Handler {
    fn as_dispatchable(&self) -> Arc<dyn Dispatchable> {
        self.0.clone()
    }

    fn install(&self, loop_shared: &Arc<LoopShared>) -> Result<()> {
        match self.0.core.claim(loop_shared) {
            Ok(()) => {
                let mask = *self.0.mask.lock().unwrap();
                if let Err(source) = loop_shared.backend.lock().unwrap().add_fd(self.0.core.id(), self.0.fd, mask) {
                    self.0.core.release();
                    return Err(LoopError::BackendInstall { id: self.id(), source });
                }
                loop_shared.started.insert(self.as_dispatchable());
                Ok(())
            }
            Err(ClaimError::AlreadyStarted) => Err(LoopError::AlreadyStarted(self.id())),
            Err(ClaimError::StartedOnAnotherLoop) => Err(LoopError::StartedOnAnotherLoop(self.id())),
        }
    }

    fn uninstall(&self, loop_shared: &LoopShared) {
        let _ = loop_shared.backend.lock().unwrap().del_fd(self.0.core.id(), self.0.fd);
        loop_shared.started.remove(self.id());
        self.0.core.release();
    }
}
