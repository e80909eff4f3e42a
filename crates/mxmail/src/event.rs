//! Delivery outcome notifications.

use crate::queue::EntryId;

/// Outcome of one delivery attempt, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// The peer accepted the message; the entry left the queue.
    Delivered {
        /// Queue identifier.
        id: EntryId,
        /// Mail exchanger that accepted it.
        host: String,
        /// True if the session was secured with STARTTLS.
        secured: bool,
    },
    /// An attempt failed; the entry stays queued for another try.
    AttemptFailed {
        /// Queue identifier.
        id: EntryId,
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Why the attempt failed.
        error: String,
    },
    /// The last allowed attempt failed; the entry stays queued but will not
    /// be tried again.
    Exhausted {
        /// Queue identifier.
        id: EntryId,
        /// Attempts made.
        attempts: u32,
        /// Why the last attempt failed.
        error: String,
    },
}

impl DeliveryEvent {
    /// Returns the queue identifier the event is about.
    #[must_use]
    pub const fn id(&self) -> EntryId {
        match self {
            Self::Delivered { id, .. }
            | Self::AttemptFailed { id, .. }
            | Self::Exhausted { id, .. } => *id,
        }
    }

    /// Returns true if no further attempts will follow for this entry.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Delivered { .. } | Self::Exhausted { .. })
    }
}
