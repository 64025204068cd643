//! A general-purpose, single-threaded event loop: one dispatch thread
//! multiplexing file-descriptor readiness, monotonic timers and tickers,
//! OS signals, thread-pool work items, and post-dispatch idle callbacks.
//!
//! ```no_run
//! use std::time::Duration;
//! use reactor_loop::{Loop, Ticker};
//!
//! let event_loop = Loop::new().expect("backend init");
//! let ticks = Ticker::new(Duration::from_millis(250), |_tick| {
//!     println!("tick");
//! });
//! event_loop.start(&ticks).expect("start ticker");
//! event_loop.run().expect("run loop");
//! ```
//!
//! Every event source is its own type (`Handler`, `Timer`, `Ticker`,
//! `Signal`, `Work`, `Idle`) rather than one tagged union, so operations
//! that only make sense for one variant are simply not compiled for the
//! others. All of them share the same lifecycle surface through the
//! [`EventSource`] trait: [`add_ref`], [`unref`], [`try_ref`], `id`,
//! `set_userdata`/`with_userdata`, `is_started`.
//!
//! Not a futures runtime: callbacks are plain closures invoked
//! synchronously on the dispatch thread, there is no `Future`/`Waker`
//! integration, and nothing here schedules async tasks.

mod backend;
mod config;
mod error;
mod handler;
mod id;
mod idle;
mod mask;
mod object;
mod queue;
mod reactor_loop;
mod registry;
mod signal;
mod started;
mod thread_pool;
mod timer;
mod work;

pub use config::LoopConfig;
pub use error::{LoopError, Result};
pub use handler::{Handler, HandlerRef};
pub use id::ObjectId;
pub use idle::Idle;
pub use mask::EventMask;
pub use object::{add_ref, try_ref, unref, EventSource};
pub use reactor_loop::Loop;
pub use signal::{Signal, SignalRef};
pub use timer::{Ticker, Timer, TimerNodeHandle};
pub use work::{Work, WorkRef};

/// The implementation revision of this crate, as published on crates.io.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bumped whenever a surface explicitly marked unstable in its docs changes
/// in a way that is not a semver-breaking change to the stable surface
/// (e.g. a new required method on an internal-extensibility trait). Callers
/// depending on an unstable surface should assert the value they were built
/// against still matches.
pub const UNSTABLE_ABI_VERSION: u32 = 1;
