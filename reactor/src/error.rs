//! Typed errors for every fallible operation on [`crate::Loop`].
//!
//! Each variant carries a stable [diagnostic code][miette::Diagnostic::code]
//! and, where the cause is platform-dependent, OS-specific remediation text
//! — the same shape used for the worker-thread subscription errors this
//! crate's concurrency primitives are modeled on.

/// Errors returned by [`crate::Loop`] operations.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LoopError {
    /// The backend could not be constructed (§4.6 `new_state`).
    #[error("failed to initialize the reactor backend")]
    #[diagnostic(code(reactor_loop::backend_init))]
    #[cfg_attr(
        target_os = "linux",
        diagnostic(help(
            "Check file-descriptor limits with `ulimit -n`, and that \
             epoll/signalfd/timerfd are available in this sandbox."
        ))
    )]
    #[cfg_attr(
        target_os = "macos",
        diagnostic(help(
            "Check file-descriptor limits with `ulimit -n`; kqueue should \
             always be available, so this usually means resource exhaustion."
        ))
    )]
    BackendInit(#[source] std::io::Error),

    /// `start` was called on an object already started on this loop.
    #[error("object {0} is already started on this loop")]
    #[diagnostic(
        code(reactor_loop::already_started),
        help("call stop() before starting the same object again")
    )]
    AlreadyStarted(crate::id::ObjectId),

    /// `start` was called on an object started on a *different* loop.
    #[error("object {0} is already started on another loop")]
    #[diagnostic(
        code(reactor_loop::started_elsewhere),
        help("an event source may only be started on one loop at a time")
    )]
    StartedOnAnotherLoop(crate::id::ObjectId),

    /// The backend rejected installing this source (§4.4 `start` rollback).
    #[error("backend rejected installation of object {id}")]
    #[diagnostic(code(reactor_loop::backend_install))]
    BackendInstall {
        id: crate::id::ObjectId,
        #[source]
        source: std::io::Error,
    },

    /// Spawning a thread-pool worker thread failed.
    #[error("failed to spawn a thread-pool worker")]
    #[diagnostic(code(reactor_loop::thread_spawn))]
    #[cfg_attr(
        target_os = "linux",
        diagnostic(help(
            "the process may have hit its thread limit - check `ulimit -u` \
             and /proc/sys/kernel/threads-max"
        ))
    )]
    #[cfg_attr(
        target_os = "macos",
        diagnostic(help(
            "the process may have hit its thread limit - check `ulimit -u`"
        ))
    )]
    ThreadSpawn(#[source] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LoopError>;
