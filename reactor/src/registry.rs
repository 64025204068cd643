//! The global object registry (§3 "Global object registry", §9 "Reference
//! cycles").
//!
//! A process-wide map from [`ObjectId`] to a type-erased weak reference.
//! `Weak::upgrade` already gives us exactly the atomicity the design asks
//! for: it either returns a live, ref-count-incremented handle, or fails
//! cleanly, and it can never race with the owning `Arc`'s destructor — the
//! standard library does the bookkeeping the original implementation did by
//! hand with a global mutex and an explicit `alive` flag.

use std::any::Any;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use rustc_hash::FxHashMap;

use crate::id::ObjectId;

type Erased = dyn Any + Send + Sync;

fn table() -> &'static Mutex<FxHashMap<ObjectId, Weak<Erased>>> {
    static TABLE: OnceLock<Mutex<FxHashMap<ObjectId, Weak<Erased>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(FxHashMap::default()))
}

/// Registers a freshly-created node under `id`. Called once, from each
/// variant constructor.
pub(crate) fn insert<T: Send + Sync + 'static>(id: ObjectId, node: &Arc<T>) {
    let erased: Arc<Erased> = node.clone();
    let prior = table().lock().unwrap().insert(id, Arc::downgrade(&erased));
    debug_assert!(prior.is_none(), "object id {id} reused while still registered");
}

/// Removes the entry for `id`. Called from the node's `Drop` impl, once the
/// last strong reference is gone — at which point `Weak::upgrade` would
/// already fail, so this is bookkeeping cleanup rather than a correctness
/// requirement.
pub(crate) fn remove(id: ObjectId) {
    table().lock().unwrap().remove(&id);
}

/// Re-acquires a strong, type-checked reference to the node registered under
/// `id`, if it is still alive.
///
/// This is the primitive `try_ref` is built on (§4.1): weak lookup that
/// never races with destruction, usable from any thread including one that
/// never participated in the object's ownership (a signal handler's
/// context, a thread-pool worker re-acquiring its originating loop).
pub(crate) fn try_ref_node<T: Send + Sync + 'static>(id: ObjectId) -> Option<Arc<T>> {
    let weak = table().lock().unwrap().get(&id)?.clone();
    weak.upgrade()?.downcast::<T>().ok()
}
