//! Common plumbing shared by every event-source variant (§3, §4.1, §9
//! "Type-tagged variants").
//!
//! The original C library keeps one tagged-union struct for every variant
//! and dispatches on a type field. Here each variant is its own type
//! (`Handler`, `Timer`, `Ticker`, `Signal`, `Work`, `Idle`), so operations
//! that only make sense for one variant (`get_fd`, `set_duration`,
//! `get_signo`, ...) are simply not compiled for the others. What every
//! variant still shares — an id, user data, the event-queue latch, the
//! backend's opaque per-source slot, and "which loop owns me" — lives here
//! in [`ObjectCore`].

use std::any::Any;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, Weak};

use crate::id::ObjectId;
use crate::mask::EventMask;
use crate::reactor_loop::LoopShared;

/// Fields every event-source node carries regardless of variant.
pub(crate) struct ObjectCore {
    id: ObjectId,
    userdata: Mutex<Option<Box<dyn Any + Send>>>,
    /// The event-queue latch (§4.3): set while a pending-dispatch entry for
    /// this source exists, so a second emission before dispatch runs just
    /// ORs into the existing entry instead of double-queuing.
    pub(crate) queued: AtomicBool,
    /// Backend-owned data, opaque to the core (§4.6). Kept in its own slot
    /// so a backend can never collide with `userdata`.
    pub(crate) backend_data: Mutex<Option<Box<dyn Any + Send>>>,
    /// The loop this source is currently started on, if any. A weak link:
    /// the loop's started-set is what actually keeps the source alive
    /// (invariant 1), this is only a "where do I belong" check used to
    /// reject double-start (§4.1).
    owner: Mutex<Option<Weak<LoopShared>>>,
}

impl ObjectCore {
    pub(crate) fn new() -> Self {
        Self {
            id: ObjectId::next(),
            userdata: Mutex::new(None),
            queued: AtomicBool::new(false),
            backend_data: Mutex::new(None),
            owner: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }

    /// Claims this source for `loop_shared`, or reports why it could not be
    /// claimed (§4.1: "already started" vs "started on another loop").
    pub(crate) fn claim(&self, loop_shared: &Arc<LoopShared>) -> Result<(), ClaimError> {
        let mut owner = self.owner.lock().unwrap();
        if let Some(existing) = owner.as_ref().and_then(Weak::upgrade) {
            return if Arc::ptr_eq(&existing, loop_shared) {
                Err(ClaimError::AlreadyStarted)
            } else {
                Err(ClaimError::StartedOnAnotherLoop)
            };
        }
        *owner = Some(Arc::downgrade(loop_shared));
        Ok(())
    }

    /// Releases the claim installed by [`Self::claim`]. Idempotent (§5
    /// "stop is the only cancellation primitive ... idempotent").
    pub(crate) fn release(&self) {
        *self.owner.lock().unwrap() = None;
    }

    pub(crate) fn owning_loop(&self) -> Option<Arc<LoopShared>> {
        self.owner.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn is_started(&self) -> bool {
        self.owning_loop().is_some()
    }

    pub(crate) fn set_userdata<T: Send + 'static>(&self, value: T) {
        *self.userdata.lock().unwrap() = Some(Box::new(value));
    }

    pub(crate) fn userdata_ref<T: 'static, R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        let guard = self.userdata.lock().unwrap();
        f(guard.as_deref().and_then(|b| b.downcast_ref::<T>()))
    }

    /// Stashes backend-owned data in the slot reserved for it, distinct
    /// from `userdata` so a backend implementation can never collide with
    /// application state (§4.6, §6 "backend authoring": `set_backend_data`).
    pub(crate) fn set_backend_data<T: Send + 'static>(&self, value: T) {
        *self.backend_data.lock().unwrap() = Some(Box::new(value));
    }

    /// Reads back whatever a backend previously stashed via
    /// [`Self::set_backend_data`] (§6 `get_backend_data`).
    pub(crate) fn backend_data_ref<T: 'static, R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        let guard = self.backend_data.lock().unwrap();
        f(guard.as_deref().and_then(|b| b.downcast_ref::<T>()))
    }
}

pub(crate) enum ClaimError {
    AlreadyStarted,
    StartedOnAnotherLoop,
}

/// Object-safe view used by the event queue and the loop's started-set,
/// which both need to hold heterogeneous sources without knowing their
/// concrete variant.
pub(crate) trait Dispatchable: Send + Sync + 'static {
    fn id(&self) -> ObjectId;
    fn core(&self) -> &ObjectCore;
    /// Runs the user callback. Called only from the dispatch thread, with
    /// an extra strong reference held across the call (§9 "Callback
    /// reentrancy") by virtue of the caller holding an `Arc<dyn
    /// Dispatchable>` for the duration.
    fn invoke(&self);

    /// ORs `revents` into whatever per-source readiness state this variant
    /// tracks. Only `Handler` overrides this; every other variant's
    /// "pending" state is a plain one-shot latch with nothing further to
    /// merge, so the default is a no-op.
    fn latch_revents(&self, _revents: EventMask) {}
}

impl fmt::Debug for dyn Dispatchable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dispatchable({})", self.id())
    }
}

/// Bridges a public handle type (`Handler`, `Timer`, ...) to the `Arc<Node>`
/// the registry and the loop's internals actually store.
///
/// Every variant's handle is a thin newtype over `Arc<Self::Node>`; this
/// trait is what lets the free functions in this module (`add_ref`,
/// `unref`, `try_ref`, `get_id`) work generically across all of them,
/// matching the single shared surface §4.1/§6 describe.
pub trait EventSource: Sized {
    #[doc(hidden)]
    type Node: Send + Sync + 'static;
    #[doc(hidden)]
    fn from_node(node: Arc<Self::Node>) -> Self;
    #[doc(hidden)]
    fn node(&self) -> &Arc<Self::Node>;
    #[doc(hidden)]
    fn core_of(node: &Self::Node) -> &ObjectCore;

    /// The process-unique id assigned when this source was created.
    fn id(&self) -> ObjectId {
        Self::core_of(self.node()).id()
    }

    /// Attaches arbitrary user data to this source, replacing any previous
    /// value. Dropping the previous value (if any) runs its destructor —
    /// the Rust-native equivalent of the original API's `free_fn` callback.
    fn set_userdata<T: Send + 'static>(&self, value: T) {
        Self::core_of(self.node()).set_userdata(value);
    }

    /// Borrows the user data as `T`, or passes `None` if none was set or it
    /// was set with a different type.
    fn with_userdata<T: 'static, R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        Self::core_of(self.node()).userdata_ref(f)
    }

    /// Whether this source is currently started on some loop.
    fn is_started(&self) -> bool {
        Self::core_of(self.node()).is_started()
    }
}

/// Bridges a typed handle to the erased [`Dispatchable`] view the event
/// queue and started-set store, and to backend (de)registration.
///
/// Implemented once per variant. `install`/`uninstall` are where each
/// variant's backend contact point lives: `Handler` calls `add_fd`/`del_fd`,
/// `Signal` calls `add_signal`/`del_signal`, `Timer`/`Ticker` insert into
/// the timer set, `Work` enqueues onto the thread pool, `Idle` appends to
/// the idle list.
pub(crate) trait Installable: EventSource {
    fn as_dispatchable(&self) -> Arc<dyn Dispatchable>;
    fn install(&self, loop_shared: &Arc<LoopShared>) -> crate::error::Result<()>;
    fn uninstall(&self, loop_shared: &LoopShared);
}

/// Increments the reference count, mirroring the original API's manual
/// `ref(obj) -> prior_count`.
///
/// Unlike [`Clone`] this does not hand back a new owned value — it exists
/// for callers that want the historical "raw handle, no new owner"
/// calling convention. Idiomatic callers should prefer `.clone()`, which
/// has the same effect (one more strong reference) and is statically safe.
/// Pair every `add_ref` with exactly one later release (e.g. `unref` on a
/// handle obtained via [`try_ref`]).
#[must_use]
pub fn add_ref<S: EventSource>(obj: &S) -> usize {
    let arc = obj.node();
    let prior = Arc::strong_count(arc);
    let ptr = Arc::as_ptr(arc);
    // SAFETY: `arc` is a live `Arc`, so `ptr` is a valid, non-dangling
    // allocation whose strong count we are entitled to bump by one. The
    // resulting reference has no Rust owner until a matching release (the
    // documented pairing invariant above) drops it.
    unsafe { Arc::increment_strong_count(ptr) };
    prior
}

/// Decrements the reference count, mirroring the original API's manual
/// `unref(obj) -> new_count`. Consumes the handle: after this call the
/// binding is gone, so (unlike the original pointer-based API) a
/// use-after-unref is a compile error rather than undefined behavior.
pub fn unref<S: EventSource>(obj: S) -> usize {
    let prior = Arc::strong_count(obj.node());
    drop(obj);
    prior - 1
}

/// Re-acquires a strong reference to the source registered under `id`, if
/// it is still alive (§4.1, §8 scenario 5: weak reference across a thread).
#[must_use]
pub fn try_ref<S: EventSource>(id: ObjectId) -> Option<S> {
    crate::registry::try_ref_node::<S::Node>(id).map(S::from_node)
}

/// Stashes backend-owned data on `obj`, in the slot kept distinct from
/// application userdata (§4.6, §6 "backend authoring": `set_backend_data`).
/// Crate-internal: the only backend this crate ships (`MioBackend`) derives
/// everything it needs from the object id, so this exists for a future
/// backend implementation that needs a genuine per-source opaque datum.
pub(crate) fn set_backend_data<S: EventSource, T: Send + 'static>(obj: &S, value: T) {
    S::core_of(obj.node()).set_backend_data(value);
}

/// Reads back data previously stashed with [`set_backend_data`] (§6
/// `get_backend_data`).
pub(crate) fn with_backend_data<S: EventSource, T: 'static, R>(obj: &S, f: impl FnOnce(Option<&T>) -> R) -> R {
    S::core_of(obj.node()).backend_data_ref(f)
}
