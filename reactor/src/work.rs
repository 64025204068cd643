//! Thread-pool work items (§4.5 C5).
//!
//! A `Work` item's function body runs off the dispatch thread, on whichever
//! pool worker picks it up off the FIFO queue. Completion is reported back
//! by re-acquiring the owning loop through the weak link already kept on
//! [`crate::object::ObjectCore`] (the Rust equivalent of the original
//! "look the loop up by id in the global table"; here the worker already
//! holds that link directly, so there is no second hop through the
//! registry) — if the loop has since been destroyed, the upgrade fails and
//! the completion is silently dropped, exactly as §4.5 requires.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::error::{LoopError, Result};
use crate::id::ObjectId;
use crate::object::{ClaimError, Dispatchable, EventSource, Installable, ObjectCore};
use crate::reactor_loop::LoopShared;

pub(crate) struct WorkNode {
    core: ObjectCore,
    work_fn: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    done_callback: Mutex<Box<dyn FnMut(&WorkRef) + Send>>,
}

/// Borrowed view of a [`Work`] item passed to its completion callback.
pub struct WorkRef<'a>(&'a WorkNode);

impl WorkRef<'_> {
    pub fn id(&self) -> ObjectId {
        self.0.core.id()
    }
}

impl fmt::Debug for WorkRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkRef").field("id", &self.id()).finish()
    }
}

impl Dispatchable for WorkNode {
    fn id(&self) -> ObjectId {
        self.core.id()
    }

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn invoke(&self) {
        let handle = WorkRef(self);
        (self.done_callback.lock().unwrap())(&handle);
    }
}

impl Drop for WorkNode {
    fn drop(&mut self) {
        crate::registry::remove(self.core.id());
    }
}

impl WorkNode {
    /// Runs the work function on the calling (pool worker) thread. Takes
    /// the closure out of its slot so it can only ever run once, even if a
    /// stray second pool pickup somehow occurred.
    pub(crate) fn run_work(&self) {
        let work_fn = self.work_fn.lock().unwrap().take();
        if let Some(work_fn) = work_fn {
            work_fn();
        }
    }

    /// Called by the pool worker after `run_work` returns (or panics and is
    /// caught): re-acquires the owning loop and, if it still exists, emits
    /// the completion, stops the item, and interrupts the dispatch thread
    /// so it notices the completion promptly (§4.5).
    pub(crate) fn complete(self: &Arc<Self>) {
        let Some(loop_shared) = self.core.owning_loop() else {
            warn!(id = %self.core.id(), "work item's loop was destroyed before completion; dropping");
            return;
        };
        loop_shared.queue.emit(self.clone(), crate::mask::EventMask::empty());
        loop_shared.started.remove(self.core.id());
        self.core.release();
        loop_shared.interrupt();
    }
}

/// A unit of work dispatched onto the default thread pool (§3 `Work`).
///
/// Starting a `Work` item enqueues it; it is not "armed" the way a
/// `Handler`/`Signal` is, and it always stops itself once its completion
/// callback has run.
#[derive(Clone)]
pub struct Work(Arc<WorkNode>);

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Work").field("id", &self.0.core.id()).finish()
    }
}

impl Work {
    pub fn new(
        work_fn: impl FnOnce() + Send + 'static,
        done_callback: impl FnMut(&WorkRef) + Send + 'static,
    ) -> Self {
        let node = Arc::new(WorkNode {
            core: ObjectCore::new(),
            work_fn: Mutex::new(Some(Box::new(work_fn))),
            done_callback: Mutex::new(Box::new(done_callback)),
        });
        crate::registry::insert(node.core.id(), &node);
        Self(node)
    }
}

impl EventSource for Work {
    type Node = WorkNode;
    fn from_node(node: Arc<WorkNode>) -> Self {
        Self(node)
    }
    fn node(&self) -> &Arc<WorkNode> {
        &self.0
    }
    fn core_of(node: &WorkNode) -> &ObjectCore {
        &node.core
    }
}

impl Installable for Work {
    fn as_dispatchable(&self) -> Arc<dyn Dispatchable> {
        self.0.clone()
    }

    fn install(&self, loop_shared: &Arc<LoopShared>) -> Result<()> {
        match self.0.core.claim(loop_shared) {
            Ok(()) => {
                loop_shared.started.insert(self.as_dispatchable());
                if let Err(err) = crate::thread_pool::enqueue(self.0.clone()) {
                    loop_shared.started.remove(self.0.core.id());
                    self.0.core.release();
                    return Err(err);
                }
                Ok(())
            }
            Err(ClaimError::AlreadyStarted) => Err(LoopError::AlreadyStarted(self.id())),
            Err(ClaimError::StartedOnAnotherLoop) => Err(LoopError::StartedOnAnotherLoop(self.id())),
        }
    }

    fn uninstall(&self, loop_shared: &LoopShared) {
        // A work item already handed to a pool worker cannot be revoked:
        // the worker holds its own `Arc<WorkNode>` clone off the queue.
        // `stop()` before the work runs only prevents the *completion*
        // callback from being delivered by removing it from `started`; the
        // work function itself may still execute to completion.
        loop_shared.started.remove(self.0.core.id());
        self.0.core.release();
    }
}
