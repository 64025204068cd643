//! Readiness event mask shared by [`crate::Handler`] subscriptions and the
//! revents latch (§4.3 of the design: "at most one pending entry per
//! handler", delivered as the bitwise OR of everything observed).

use bitflags::bitflags;

bitflags! {
    /// Which directions of readiness a [`crate::Handler`] is subscribed to,
    /// or which were observed (`revents`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventMask: u8 {
        /// The descriptor is ready for reading.
        const READ = 0b001;
        /// The descriptor is ready for writing.
        const WRITE = 0b010;
        /// Out-of-band data is available.
        const OOB = 0b100;
    }
}
