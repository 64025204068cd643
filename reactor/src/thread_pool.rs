//! The default, process-wide thread pool (§4.5 C5).
//!
//! One work queue and a fixed set of worker threads shared across every
//! loop in the process that opts in via [`crate::Loop::require_workers`].
//! Mirrors the `Mutex<Option<Arc<...>>>` "lazily-allocated, globally shared
//! state" shape used for this crate's dedicated-worker-thread machinery,
//! generalized from "one worker" to "a fixed pool of N workers" and from
//! "broadcast events to async subscribers" to "run FIFO work items and
//! report completion back through the originating loop".

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};

use tracing::{debug, error, warn};

use crate::error::{LoopError, Result};
use crate::work::WorkNode;

static THREAD_GENERATION: AtomicU8 = AtomicU8::new(0);

struct PoolShared {
    queue: Mutex<VecDeque<Arc<WorkNode>>>,
    not_empty: Condvar,
    shutdown: std::sync::atomic::AtomicBool,
    worker_count: AtomicUsize,
    /// Loops currently opted into this pool (§4.5 "user-count"). Dropped
    /// to zero by [`release_user`], which is what actually tears the pool
    /// down; reaching zero worker threads on its own does not.
    users: AtomicUsize,
}

impl PoolShared {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            shutdown: std::sync::atomic::AtomicBool::new(false),
            worker_count: AtomicUsize::new(0),
            users: AtomicUsize::new(0),
        }
    }

    fn enqueue(&self, item: Arc<WorkNode>) {
        self.queue.lock().unwrap().push_back(item);
        self.not_empty.notify_one();
    }

    fn spawn_worker(self: &Arc<Self>) -> Result<()> {
        let generation = THREAD_GENERATION.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let pool = self.clone();
        std::thread::Builder::new()
            .name(format!("reactor-pool-worker-gen-{generation}"))
            .spawn(move || worker_loop(pool, generation))
            .map_err(LoopError::ThreadSpawn)?;
        self.worker_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn worker_loop(pool: Arc<PoolShared>, generation: u8) {
    debug!(generation, "thread-pool worker starting");
    loop {
        let item = {
            let mut queue = pool.queue.lock().unwrap();
            loop {
                if let Some(item) = queue.pop_front() {
                    break Some(item);
                }
                if pool.shutdown.load(Ordering::SeqCst) {
                    break None;
                }
                queue = pool.not_empty.wait(queue).unwrap();
            }
        };
        let Some(item) = item else {
            break;
        };
        // Workers never touch signal subscriptions: only the dispatch
        // thread's backend instance is subscribed to signals (§4.5 "mask
        // all signals"), so there is nothing to mask here — a pool worker
        // thread simply never participates in signal delivery.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| item.run_work()));
        if let Err(panic) = outcome {
            error!(id = %item.id(), ?panic, "work item panicked; its done callback will not run");
            continue;
        }
        item.complete();
    }
    debug!(generation, "thread-pool worker exiting");
}

fn global() -> &'static Mutex<Option<Arc<PoolShared>>> {
    static POOL: OnceLock<Mutex<Option<Arc<PoolShared>>>> = OnceLock::new();
    POOL.get_or_init(|| Mutex::new(None))
}

fn get_or_create() -> Arc<PoolShared> {
    let mut guard = global().lock().unwrap();
    guard.get_or_insert_with(|| Arc::new(PoolShared::new())).clone()
}

/// Ensures the default pool has at least `n` worker threads (`n < 0` means
/// "as many as logical CPUs", per §4.4 `require_workers`). Idempotent:
/// calling with a smaller or equal `n` than already provisioned is a no-op.
pub(crate) fn require_workers(n: isize) -> Result<()> {
    let target = if n < 0 {
        std::thread::available_parallelism().map_or(1, |p| p.get())
    } else {
        n as usize
    };
    let pool = get_or_create();

    let current = pool.worker_count.load(Ordering::SeqCst);
    if current >= target {
        return Ok(());
    }
    for _ in current..target {
        pool.spawn_worker()?;
    }
    Ok(())
}

/// Registers one more user of the default pool (§4.5 "user-count"),
/// creating it if this is the first user in the process. Pair with
/// exactly one later [`release_user`]; [`crate::reactor_loop::LoopShared`]'s
/// `Drop` impl does this for every loop that ever called
/// [`require_workers`].
pub(crate) fn acquire_user() {
    get_or_create().users.fetch_add(1, Ordering::SeqCst);
}

/// Releases one user of the default pool. When the last user releases it,
/// broadcasts the shutdown sentinel so every worker thread observes
/// `shutdown` the next time its queue goes empty and exits, then drops the
/// pool from the global slot so a later [`acquire_user`]/[`require_workers`]
/// call starts a fresh one (§4.5 "the pool structures are destroyed").
pub(crate) fn release_user() {
    let mut guard = global().lock().unwrap();
    let Some(pool) = guard.clone() else {
        return;
    };
    if pool.users.fetch_sub(1, Ordering::SeqCst) == 1 {
        pool.shutdown.store(true, Ordering::SeqCst);
        pool.not_empty.notify_all();
        *guard = None;
    }
}

pub(crate) fn enqueue(item: Arc<WorkNode>) -> Result<()> {
    let pool = get_or_create();
    if pool.worker_count.load(Ordering::SeqCst) == 0 {
        warn!("Work item enqueued with zero pool workers provisioned; call require_workers first");
    }
    pool.enqueue(item);
    Ok(())
}
