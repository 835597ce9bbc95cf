//! Cell state bits.

use bitflags::bitflags;

bitflags! {
    /// The state machine of a [`Cell`](super::Cell).
    ///
    /// `EMPTY` is set at construction when no value is supplied and cleared
    /// by the first successful write. `decay()` resets every bit, which is
    /// the zero state `CellFlags::empty()`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CellFlags: u32 {
        /// No successful write yet.
        const EMPTY = 1 << 0;
        /// At least one listener is subscribed.
        const HAS_LISTENERS = 1 << 1;
        /// At least one local event handler is registered.
        const HAS_EVENTS = 1 << 2;
        /// A realm handle is attached.
        const HAS_REALM = 1 << 3;
        /// A write has succeeded at least once.
        const WAS_SET = 1 << 4;
        /// Writes equal to the current value are dropped.
        const DEDUP = 1 << 5;
        /// Values are delivered to listeners but never retained.
        const STATELESS = 1 << 6;
        /// The current write suppresses every notification path.
        const SILENT = 1 << 7;
        /// A write is notifying listeners; nested writes are ignored.
        const SETTING = 1 << 8;
        /// A pending value is being awaited.
        const AWAITING = 1 << 9;
        /// The cell is the result of a fusion.
        const WIRED = 1 << 10;
        /// Listener panics are caught and logged.
        const ISOLATE = 1 << 11;
        /// Writes emit the change event.
        const EMIT_CHANGE = 1 << 12;
    }
}

impl Default for CellFlags {
    fn default() -> Self {
        CellFlags::empty()
    }
}
