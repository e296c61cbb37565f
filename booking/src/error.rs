//! Error types for slot allocation and booking lifecycle operations.

use crate::state::{BookingId, BookingStatus};
use carwash_runtime::StoreError;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

/// Result type alias for booking operations.
pub type Result<T> = std::result::Result<T, BookingError>;

/// Error taxonomy for booking operations.
///
/// Every variant is a recoverable outcome surfaced to the caller. The
/// presentation layer decides how to render them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingError {
    // ═══════════════════════════════════════════════════════════
    // Creation Errors
    // ═══════════════════════════════════════════════════════════

    /// The requested (or booked) date is before today.
    #[error("Date {date} is in the past")]
    PastDate {
        /// Offending date
        date: NaiveDate,
    },

    /// The requested time is outside business hours.
    #[error("{time} is outside business hours ({opening} - {closing})")]
    OutOfHours {
        /// Requested time
        time: NaiveTime,
        /// Opening time
        opening: NaiveTime,
        /// Closing time
        closing: NaiveTime,
    },

    /// The slot has no remaining capacity.
    #[error("Slot {date} {time} is not available")]
    SlotUnavailable {
        /// Slot date
        date: NaiveDate,
        /// Slot time
        time: NaiveTime,
    },

    // ═══════════════════════════════════════════════════════════
    // Lifecycle Errors
    // ═══════════════════════════════════════════════════════════

    /// The booking's status does not permit the requested transition.
    #[error("Cannot move booking from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: BookingStatus,
        /// Requested status
        to: BookingStatus,
    },

    /// The acting user may not perform this operation.
    #[error("Not authorized: {reason}")]
    Authorization {
        /// What was refused
        reason: String,
    },

    /// Unknown booking.
    #[error("Booking {0} not found")]
    NotFound(BookingId),

    // ═══════════════════════════════════════════════════════════
    // Payment Errors
    // ═══════════════════════════════════════════════════════════

    /// No payment has been recorded for the booking.
    #[error("No payment recorded for booking {0}")]
    PaymentNotFound(BookingId),

    /// A payment has already been recorded for the booking.
    #[error("Payment already recorded for booking {0}")]
    PaymentExists(BookingId),

    /// The payment is already verified and can no longer change.
    #[error("Payment for booking {0} is already verified")]
    PaymentAlreadyValid(BookingId),

    // ═══════════════════════════════════════════════════════════
    // Infrastructure Errors
    // ═══════════════════════════════════════════════════════════

    /// Booking record could not be written or read.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Slot ledger storage failure.
    #[error("Slot storage failure: {0}")]
    Storage(String),

    /// No outcome arrived before the request timeout.
    #[error("Timed out waiting for booking outcome")]
    Timeout,

    /// The store runtime refused or lost the request.
    #[error("Runtime failure: {0}")]
    Runtime(String),
}

impl BookingError {
    /// Returns `true` if this error is an expected business outcome
    /// rather than an infrastructure fault.
    ///
    /// # Examples
    ///
    /// ```
    /// # use carwash_booking::{BookingError, BookingId};
    /// assert!(BookingError::NotFound(BookingId::new(1)).is_user_error());
    /// assert!(!BookingError::Timeout.is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::PastDate { .. }
                | Self::OutOfHours { .. }
                | Self::SlotUnavailable { .. }
                | Self::InvalidTransition { .. }
                | Self::Authorization { .. }
                | Self::NotFound(_)
                | Self::PaymentNotFound(_)
                | Self::PaymentExists(_)
                | Self::PaymentAlreadyValid(_)
        )
    }

    /// Shorthand for an authorization failure.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Authorization {
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Timeout => Self::Timeout,
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Errors raised by a slot ledger backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The slot was already at capacity; nothing was changed.
    #[error("Slot {date} {time} is full ({capacity} of {capacity})")]
    SlotFull {
        /// Slot date
        date: NaiveDate,
        /// Slot time
        time: NaiveTime,
        /// Slot capacity
        capacity: u32,
    },

    /// Backend failure.
    #[error("Ledger storage failure: {0}")]
    Storage(String),
}

impl From<LedgerError> for BookingError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::SlotFull { date, time, .. } => Self::SlotUnavailable { date, time },
            LedgerError::Storage(message) => Self::Storage(message),
        }
    }
}
