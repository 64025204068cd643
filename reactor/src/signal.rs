//! OS signal subscriptions (§3 `Signal`).
//!
//! Delivery never runs inside the kernel signal handler (§4.3, §9
//! "Signal-safe emission"): the backend translates a raw signal into a
//! synchronous emission on the dispatch thread via a signal-delivery
//! descriptor, and this node's callback only ever runs from there.

use std::fmt;
use std::sync::Arc;

use crate::error::{LoopError, Result};
use crate::id::ObjectId;
use crate::object::{ClaimError, Dispatchable, EventSource, Installable, ObjectCore};
use crate::reactor_loop::LoopShared;

pub(crate) struct SignalNode {
    core: ObjectCore,
    signo: i32,
    callback: std::sync::Mutex<Box<dyn FnMut(&SignalRef) + Send>>,
}

/// Borrowed view of a [`Signal`] passed to its callback.
pub struct SignalRef<'a>(&'a SignalNode);

impl SignalRef<'_> {
    pub fn signo(&self) -> i32 {
        self.0.signo
    }
}

impl fmt::Debug for SignalRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalRef").field("id", &self.0.core.id()).field("signo", &self.signo()).finish()
    }
}

impl Dispatchable for SignalNode {
    fn id(&self) -> ObjectId {
        self.core.id()
    }

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn invoke(&self) {
        let handle = SignalRef(self);
        (self.callback.lock().unwrap())(&handle);
    }
}

impl Drop for SignalNode {
    fn drop(&mut self) {
        crate::registry::remove(self.core.id());
    }
}

/// A subscription to an OS signal number, delivered once per raise as a
/// single callback invocation on the dispatch thread.
#[derive(Clone)]
pub struct Signal(Arc<SignalNode>);

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("id", &self.0.core.id()).field("signo", &self.0.signo).finish()
    }
}

impl Signal {
    pub fn new(signo: i32, callback: impl FnMut(&SignalRef) + Send + 'static) -> Self {
        let node = Arc::new(SignalNode {
            core: ObjectCore::new(),
            signo,
            callback: std::sync::Mutex::new(Box::new(callback)),
        });
        crate::registry::insert(node.core.id(), &node);
        Self(node)
    }

    pub fn signo(&self) -> i32 {
        self.0.signo
    }
}

impl EventSource for Signal {
    type Node = SignalNode;
    fn from_node(node: Arc<SignalNode>) -> Self {
        Self(node)
    }
    fn node(&self) -> &Arc<SignalNode> {
        &self.0
    }
    fn core_of(node: &SignalNode) -> &ObjectCore {
        &node.core
    }
}

impl Installable for Signal {
    fn as_dispatchable(&self) -> Arc<dyn Dispatchable> {
        self.0.clone()
    }

    fn install(&self, loop_shared: &Arc<LoopShared>) -> Result<()> {
        match self.0.core.claim(loop_shared) {
            Ok(()) => {
                if let Err(source) = loop_shared.backend.lock().unwrap().add_signal(self.0.core.id(), self.0.signo) {
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
        let _ = loop_shared.backend.lock().unwrap().del_signal(self.0.core.id(), self.0.signo);
        loop_shared.started.remove(self.id());
        self.0.core.release();
    }
}
