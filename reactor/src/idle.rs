//! Idle callbacks (§4.4 C4): invoked after every dispatch pass, in
//! insertion order, regardless of whether any events were observed.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::error;

use crate::error::{LoopError, Result};
use crate::id::ObjectId;
use crate::object::{ClaimError, Dispatchable, EventSource, Installable, ObjectCore};
use crate::reactor_loop::LoopShared;

pub(crate) struct IdleNode {
    core: ObjectCore,
    callback: Mutex<Box<dyn FnMut(&Idle) + Send>>,
}

impl Dispatchable for IdleNode {
    fn id(&self) -> ObjectId {
        self.core.id()
    }

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn invoke(&self) {
        unreachable!("Idle callbacks run directly from IdleList, not via the event queue");
    }
}

/// A callback invoked after every [`crate::Loop::dispatch`] pass.
///
/// Idle callbacks may mutate the started set (§4.4) — starting or stopping
/// other sources, including themselves, from within the callback is safe.
#[derive(Clone)]
pub struct Idle(Arc<IdleNode>);

impl fmt::Debug for Idle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Idle").field("id", &self.0.core.id()).finish()
    }
}

impl Idle {
    /// Creates a new idle callback. It does nothing until [`crate::Loop::start`].
    pub fn new(callback: impl FnMut(&Idle) + Send + 'static) -> Self {
        let node = Arc::new(IdleNode {
            core: ObjectCore::new(),
            callback: Mutex::new(Box::new(callback)),
        });
        crate::registry::insert(node.id(), &node);
        Self(node)
    }

    pub(crate) fn run_callback(&self) {
        (self.0.callback.lock().unwrap())(self);
    }
}

impl EventSource for Idle {
    type Node = IdleNode;

    fn from_node(node: Arc<IdleNode>) -> Self {
        Self(node)
    }

    fn node(&self) -> &Arc<IdleNode> {
        &self.0
    }

    fn core_of(node: &IdleNode) -> &ObjectCore {
        &node.core
    }
}

impl Installable for Idle {
    fn as_dispatchable(&self) -> Arc<dyn Dispatchable> {
        self.0.clone()
    }

    fn install(&self, loop_shared: &Arc<LoopShared>) -> Result<()> {
        match self.0.core.claim(loop_shared) {
            Ok(()) => {
                loop_shared.idle_list.push(self.clone());
                Ok(())
            }
            Err(ClaimError::AlreadyStarted) => Err(LoopError::AlreadyStarted(self.id())),
            Err(ClaimError::StartedOnAnotherLoop) => Err(LoopError::StartedOnAnotherLoop(self.id())),
        }
    }

    fn uninstall(&self, loop_shared: &LoopShared) {
        loop_shared.idle_list.remove(self.id());
        self.0.core.release();
    }
}

impl Drop for IdleNode {
    fn drop(&mut self) {
        crate::registry::remove(self.core.id());
    }
}

/// The loop's ordered list of started idle callbacks.
#[derive(Default)]
pub(crate) struct IdleList {
    entries: Mutex<Vec<Idle>>,
}

impl IdleList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&self, idle: Idle) {
        self.entries.lock().unwrap().push(idle);
    }

    fn remove(&self, id: ObjectId) {
        self.entries.lock().unwrap().retain(|i| i.id() != id);
    }

    /// Runs every started idle callback, in insertion order (§5 "Ordering
    /// guarantees"). Snapshot the list first so a callback that starts or
    /// stops an idle source does not perturb this pass's iteration.
    pub(crate) fn run_all(&self) {
        let snapshot: Vec<Idle> = self.entries.lock().unwrap().clone();
        for idle in &snapshot {
            let id = idle.id();
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| idle.run_callback())) {
                error!(%id, ?panic, "idle callback panicked; remaining idle callbacks still run this pass");
            }
        }
    }
}
