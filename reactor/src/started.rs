//! The loop's "started" set for `Handler` and `Signal` sources (§3 "Loop":
//! "'started' set of event sources").
//!
//! `Timer`/`Ticker` live in [`crate::timer::TimerSet`] and `Idle` lives in
//! [`crate::idle::IdleList`] instead of here — each of those is already an
//! ordered collection that holds the loop's own strong reference, so a
//! third, undifferentiated set would just duplicate that bookkeeping. This
//! set exists for the remaining variants (`Handler`, `Signal`, `Work`)
//! whose only other home is the backend/pool's opaque internal state.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::id::ObjectId;
use crate::object::Dispatchable;

#[derive(Default)]
pub(crate) struct StartedSet {
    entries: Mutex<FxHashMap<ObjectId, Arc<dyn Dispatchable>>>,
}

impl StartedSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, source: Arc<dyn Dispatchable>) {
        self.entries.lock().unwrap().insert(source.id(), source);
    }

    pub(crate) fn remove(&self, id: ObjectId) -> Option<Arc<dyn Dispatchable>> {
        self.entries.lock().unwrap().remove(&id)
    }

    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        self.entries.lock().unwrap().contains_key(&id)
    }

    pub(crate) fn get(&self, id: ObjectId) -> Option<Arc<dyn Dispatchable>> {
        self.entries.lock().unwrap().get(&id).cloned()
    }

    pub(crate) fn drain(&self) -> Vec<Arc<dyn Dispatchable>> {
        self.entries.lock().unwrap().drain().map(|(_, v)| v).collect()
    }
}
