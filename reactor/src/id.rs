//! Process-unique identifiers for event-source objects.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique id assigned to an event source when it is created.
///
/// Ids are never reused within a process lifetime (the counter only grows),
/// so a stale id can be told apart from a live object: [`crate::try_ref`]
/// simply fails instead of accidentally resurrecting an unrelated object
/// that happened to land on a recycled id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw value, for backends that need to fold an id into a platform
    /// token (e.g. `mio::Token`).
    pub(crate) fn as_u64(self) -> u64 {
        self.0
    }

    /// Reconstructs an id from a raw value previously obtained from
    /// [`Self::as_u64`] on the same process.
    pub(crate) fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
