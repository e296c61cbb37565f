//! Payment-status bridge.

use crate::error::Result;
use crate::payment::PaymentOutcome;
use crate::state::{Booking, BookingId};
use futures::future::BoxFuture;

/// Contract through which payment verification drives booking confirmation.
///
/// - `Valid` on a pending booking confirms it
/// - `Valid` on a confirmed, in-progress or completed booking changes nothing
/// - `Valid` on a cancelled booking is `BookingError::InvalidTransition`
/// - `Invalid` changes nothing and leaves the reservation in place so the
///   customer can pay again
pub trait PaymentStatusBridge: Send + Sync {
    /// Deliver a verification outcome for a booking's payment.
    ///
    /// # Errors
    ///
    /// - `BookingError::NotFound` for an unknown booking
    /// - `BookingError::InvalidTransition` for a valid payment on a cancelled booking
    /// - `BookingError::Persistence` if confirming could not be saved
    fn on_payment_verified(
        &self,
        booking_id: BookingId,
        outcome: PaymentOutcome,
    ) -> BoxFuture<'_, Result<Booking>>;
}
