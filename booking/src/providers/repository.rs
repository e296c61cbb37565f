//! Booking repository trait.

use crate::error::Result;
use crate::state::{Booking, BookingDraft, BookingId, BookingStatus, UserId};
use chrono::NaiveDate;
use futures::future::BoxFuture;

/// Booking record storage.
///
/// Failures are reported as `BookingError::Persistence`.
pub trait BookingRepository: Send + Sync {
    /// Save a new booking and assign its id.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` if the write fails.
    fn insert(&self, draft: BookingDraft) -> BoxFuture<'_, Result<Booking>>;

    /// Persist a changed booking (status and notes), provided its stored
    /// status is still `expected`.
    ///
    /// The check and the write are one atomic step, so of two writers that
    /// read the same status only one succeeds.
    ///
    /// # Errors
    ///
    /// - `BookingError::NotFound` if the booking does not exist
    /// - `BookingError::InvalidTransition` (from the stored status to
    ///   `booking.status`) if the stored status is no longer `expected`
    /// - `BookingError::Persistence` if the write fails
    fn update(&self, booking: Booking, expected: BookingStatus) -> BoxFuture<'_, Result<()>>;

    /// Load one booking.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` if the read fails.
    fn find(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>>>;

    /// Bookings owned by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` if the read fails.
    fn list_for_user(&self, user_id: UserId) -> BoxFuture<'_, Result<Vec<Booking>>>;

    /// Every booking on a date, in any status.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` if the read fails.
    fn list_for_date(&self, date: NaiveDate) -> BoxFuture<'_, Result<Vec<Booking>>>;

    /// Every booking.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` if the read fails.
    fn list_all(&self) -> BoxFuture<'_, Result<Vec<Booking>>>;
}
