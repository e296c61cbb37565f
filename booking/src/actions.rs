//! Booking lifecycle actions.
//!
//! Commands come from the service facade. Outcomes are produced by effects
//! and fed back into the reducer; each carries the [`RequestId`] of the
//! command that started the flow so callers can wait for their own result.
//!
//! Status transitions never trust store state: each command reads the booking
//! from the repository ([`BookingAction::BookingLoaded`]) and decides on that
//! copy.

use crate::error::BookingError;
use crate::payment::PaymentOutcome;
use crate::state::{Actor, Booking, BookingId, BookingRequest, BookingStatus, RequestId};

/// A requested status change, carried from the command to the decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Cancel and release the slot.
    Cancel {
        /// Who is cancelling
        actor: Actor,
        /// Optional reason, recorded in the notes
        reason: Option<String>,
    },
    /// Move one step forward.
    Advance {
        /// Who is advancing
        actor: Actor,
        /// Requested status
        target: BookingStatus,
    },
    /// Apply a payment verification outcome.
    Payment(PaymentOutcome),
}

/// Actions handled by [`crate::reducers::BookingReducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingAction {
    // ═══════════════════════════════════════════════════════════
    // Commands
    // ═══════════════════════════════════════════════════════════

    /// Create a booking (scheduled or walk-in).
    CreateBooking {
        /// Correlation id
        request_id: RequestId,
        /// What to book
        request: BookingRequest,
    },

    /// Cancel a booking and release its slot.
    CancelBooking {
        /// Correlation id
        request_id: RequestId,
        /// Booking to cancel
        booking_id: BookingId,
        /// Who is cancelling
        actor: Actor,
        /// Optional reason, recorded in the notes
        reason: Option<String>,
    },

    /// Move a booking one step forward.
    AdvanceBooking {
        /// Correlation id
        request_id: RequestId,
        /// Booking to advance
        booking_id: BookingId,
        /// Who is advancing
        actor: Actor,
        /// Requested status
        target: BookingStatus,
    },

    /// Apply a payment verification outcome.
    ApplyPaymentOutcome {
        /// Correlation id
        request_id: RequestId,
        /// Booking paid for
        booking_id: BookingId,
        /// Verification outcome
        outcome: PaymentOutcome,
    },

    // ═══════════════════════════════════════════════════════════
    // Outcomes
    // ═══════════════════════════════════════════════════════════

    /// Capacity was taken for a creation request.
    SlotReserved {
        /// Correlation id
        request_id: RequestId,
        /// The request holding the capacity
        request: BookingRequest,
    },

    /// Saving a new booking failed after its slot was reserved.
    PersistenceFailed {
        /// Correlation id
        request_id: RequestId,
        /// The request whose capacity must be given back
        request: BookingRequest,
        /// Why saving failed
        error: BookingError,
    },

    /// The booking a transition applies to, as currently persisted.
    BookingLoaded {
        /// Correlation id
        request_id: RequestId,
        /// Booking read from the repository
        booking: Booking,
        /// What to do with it
        transition: Transition,
    },

    /// A booking was created.
    BookingCreated {
        /// Correlation id
        request_id: RequestId,
        /// The saved booking
        booking: Booking,
    },

    /// A creation request failed; nothing was saved.
    CreationRejected {
        /// Correlation id
        request_id: RequestId,
        /// Why
        error: BookingError,
    },

    /// A status change was persisted (or was already in effect).
    BookingUpdated {
        /// Correlation id
        request_id: RequestId,
        /// The booking after the change
        booking: Booking,
    },

    /// A status change was refused or could not be saved; nothing changed.
    TransitionRejected {
        /// Correlation id
        request_id: RequestId,
        /// Why
        error: BookingError,
    },
}

impl BookingAction {
    /// Correlation id of the request the action belongs to.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::CreateBooking { request_id, .. }
            | Self::CancelBooking { request_id, .. }
            | Self::AdvanceBooking { request_id, .. }
            | Self::ApplyPaymentOutcome { request_id, .. }
            | Self::SlotReserved { request_id, .. }
            | Self::PersistenceFailed { request_id, .. }
            | Self::BookingLoaded { request_id, .. }
            | Self::BookingCreated { request_id, .. }
            | Self::CreationRejected { request_id, .. }
            | Self::BookingUpdated { request_id, .. }
            | Self::TransitionRejected { request_id, .. } => *request_id,
        }
    }

    /// Whether this is the final outcome of request `id`.
    #[must_use]
    pub fn is_outcome_for(&self, id: RequestId) -> bool {
        match self {
            Self::BookingCreated { request_id, .. }
            | Self::CreationRejected { request_id, .. }
            | Self::BookingUpdated { request_id, .. }
            | Self::TransitionRejected { request_id, .. } => *request_id == id,
            Self::CreateBooking { .. }
            | Self::CancelBooking { .. }
            | Self::AdvanceBooking { .. }
            | Self::ApplyPaymentOutcome { .. }
            | Self::SlotReserved { .. }
            | Self::PersistenceFailed { .. }
            | Self::BookingLoaded { .. } => false,
        }
    }

    /// Turn a final outcome into the caller's result.
    ///
    /// Returns `None` for actions that are not final outcomes.
    #[must_use]
    pub fn into_result(self) -> Option<Result<Booking, BookingError>> {
        match self {
            Self::BookingCreated { booking, .. } | Self::BookingUpdated { booking, .. } => {
                Some(Ok(booking))
            },
            Self::CreationRejected { error, .. } | Self::TransitionRejected { error, .. } => {
                Some(Err(error))
            },
            _ => None,
        }
    }
}
