//! Payment desk.
//!
//! Records one payment per booking and applies the method-specific
//! verification rules. Cash and card payments are settled at the counter and
//! count as verified immediately; transfers and e-wallet payments wait for an
//! admin to check the uploaded proof. Every verification outcome is delivered
//! to the booking lifecycle through a [`PaymentStatusBridge`].

use crate::error::{BookingError, Result};
use crate::providers::{BookingRepository, PaymentStatusBridge};
use crate::state::{Booking, BookingId, BookingStatus};
use carwash_core::environment::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result of checking a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    /// Payment accepted.
    Valid,
    /// Payment rejected; the customer may pay again.
    Invalid,
}

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash at the counter.
    Cash,
    /// Bank transfer with uploaded proof.
    Transfer,
    /// Credit or debit card at the counter.
    Card,
    /// E-wallet with uploaded proof.
    EWallet,
}

impl PaymentMethod {
    /// Human-readable label.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Cash => "Cash Payment",
            Self::Transfer => "Bank Transfer",
            Self::Card => "Credit/Debit Card",
            Self::EWallet => "E-Wallet",
        }
    }

    /// Settled on the spot, no proof to review.
    #[must_use]
    pub const fn is_instant(self) -> bool {
        match self {
            Self::Cash | Self::Card => true,
            Self::Transfer | Self::EWallet => false,
        }
    }
}

/// Verification status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Waiting for review.
    Pending,
    /// Verified.
    Valid,
    /// Rejected.
    Invalid,
}

/// A recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Booking paid for.
    pub booking_id: BookingId,
    /// Payment method.
    pub method: PaymentMethod,
    /// Amount in minor currency units.
    pub amount: u64,
    /// Opaque reference to the uploaded proof.
    pub proof: Option<String>,
    /// Verification status.
    pub status: PaymentStatus,
    /// Note left by the reviewer.
    pub admin_note: Option<String>,
    /// When the payment (or latest proof) was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When the payment was verified or rejected.
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Payment counts and revenue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStats {
    /// All payments.
    pub total: usize,
    /// Awaiting review.
    pub pending: usize,
    /// Verified.
    pub valid: usize,
    /// Rejected.
    pub invalid: usize,
    /// Sum of verified amounts.
    pub revenue: u64,
}

/// Records payments and forwards verification outcomes to the lifecycle.
#[derive(Clone)]
pub struct PaymentDesk {
    records: Arc<Mutex<HashMap<BookingId, PaymentRecord>>>,
    bridge: Arc<dyn PaymentStatusBridge>,
    bookings: Arc<dyn BookingRepository>,
    clock: Arc<dyn Clock>,
}

impl PaymentDesk {
    /// Create a desk that checks bookings in `bookings` and delivers
    /// outcomes to `bridge`.
    #[must_use]
    pub fn new(
        bridge: Arc<dyn PaymentStatusBridge>,
        bookings: Arc<dyn BookingRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            bridge,
            bookings,
            clock,
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<BookingId, PaymentRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a payment for a booking.
    ///
    /// Cash and card payments are verified on the spot and confirm the
    /// booking; the others stay pending until reviewed.
    ///
    /// # Errors
    ///
    /// - `BookingError::NotFound` if the booking does not exist
    /// - `BookingError::InvalidTransition` if the booking is cancelled
    /// - `BookingError::PaymentExists` if the booking already has a payment
    /// - `BookingError::Persistence` if the booking could not be read
    /// - any error from delivering the outcome, in which case nothing is recorded
    #[tracing::instrument(skip(self, proof), fields(booking_id = %booking_id))]
    pub async fn submit(
        &self,
        booking_id: BookingId,
        method: PaymentMethod,
        amount: u64,
        proof: Option<String>,
    ) -> Result<PaymentRecord> {
        let booking = self
            .bookings
            .find(booking_id)
            .await?
            .ok_or(BookingError::NotFound(booking_id))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::InvalidTransition {
                from: BookingStatus::Cancelled,
                to: BookingStatus::Confirmed,
            });
        }

        let now = self.clock.now();
        let record = {
            let mut records = self.records();
            if records.contains_key(&booking_id) {
                return Err(BookingError::PaymentExists(booking_id));
            }
            let instant = method.is_instant();
            let record = PaymentRecord {
                booking_id,
                method,
                amount,
                proof,
                status: if instant {
                    PaymentStatus::Valid
                } else {
                    PaymentStatus::Pending
                },
                admin_note: None,
                submitted_at: now,
                reviewed_at: instant.then_some(now),
            };
            records.insert(booking_id, record.clone());
            record
        };

        if record.status == PaymentStatus::Valid {
            if let Err(error) = self.bridge.on_payment_verified(booking_id, PaymentOutcome::Valid).await {
                self.records().remove(&booking_id);
                return Err(error);
            }
        }

        tracing::info!(method = method.display_name(), status = ?record.status, "Payment recorded");
        Ok(record)
    }

    /// Mark a payment verified and confirm the booking.
    ///
    /// # Errors
    ///
    /// - `BookingError::PaymentNotFound` if no payment was recorded
    /// - `BookingError::PaymentAlreadyValid` if it was verified before
    /// - any error from delivering the outcome, in which case the payment
    ///   keeps its previous status
    #[tracing::instrument(skip(self, note), fields(booking_id = %booking_id))]
    pub async fn verify(&self, booking_id: BookingId, note: Option<String>) -> Result<(PaymentRecord, Booking)> {
        self.review(booking_id, PaymentOutcome::Valid, note).await
    }

    /// Mark a payment invalid. The booking keeps its status and slot.
    ///
    /// # Errors
    ///
    /// - `BookingError::PaymentNotFound` if no payment was recorded
    /// - `BookingError::PaymentAlreadyValid` if it was verified before
    #[tracing::instrument(skip(self, note), fields(booking_id = %booking_id))]
    pub async fn reject(&self, booking_id: BookingId, note: Option<String>) -> Result<(PaymentRecord, Booking)> {
        self.review(booking_id, PaymentOutcome::Invalid, note).await
    }

    async fn review(
        &self,
        booking_id: BookingId,
        outcome: PaymentOutcome,
        note: Option<String>,
    ) -> Result<(PaymentRecord, Booking)> {
        let now = self.clock.now();
        let (previous, updated) = {
            let mut records = self.records();
            let record = records
                .get_mut(&booking_id)
                .ok_or(BookingError::PaymentNotFound(booking_id))?;
            if record.status == PaymentStatus::Valid {
                return Err(BookingError::PaymentAlreadyValid(booking_id));
            }
            let previous = record.clone();
            record.status = match outcome {
                PaymentOutcome::Valid => PaymentStatus::Valid,
                PaymentOutcome::Invalid => PaymentStatus::Invalid,
            };
            record.admin_note = note;
            record.reviewed_at = Some(now);
            (previous, record.clone())
        };

        match self.bridge.on_payment_verified(booking_id, outcome).await {
            Ok(booking) => {
                tracing::info!(?outcome, "Payment reviewed");
                Ok((updated, booking))
            },
            Err(error) => {
                self.records().insert(booking_id, previous);
                Err(error)
            },
        }
    }

    /// Replace the proof of an unverified payment and send it back to review.
    ///
    /// # Errors
    ///
    /// - `BookingError::PaymentNotFound` if no payment was recorded
    /// - `BookingError::PaymentAlreadyValid` if it was verified
    pub fn reupload_proof(&self, booking_id: BookingId, proof: impl Into<String>) -> Result<PaymentRecord> {
        let now = self.clock.now();
        let mut records = self.records();
        let record = records
            .get_mut(&booking_id)
            .ok_or(BookingError::PaymentNotFound(booking_id))?;
        if record.status == PaymentStatus::Valid {
            return Err(BookingError::PaymentAlreadyValid(booking_id));
        }

        record.proof = Some(proof.into());
        record.status = PaymentStatus::Pending;
        record.submitted_at = now;
        record.reviewed_at = None;
        Ok(record.clone())
    }

    /// The payment recorded for a booking.
    #[must_use]
    pub fn get(&self, booking_id: BookingId) -> Option<PaymentRecord> {
        self.records().get(&booking_id).cloned()
    }

    /// Payments awaiting review, oldest submission first.
    #[must_use]
    pub fn pending_review(&self) -> Vec<PaymentRecord> {
        let mut pending: Vec<_> = self
            .records()
            .values()
            .filter(|record| record.status == PaymentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|record| record.submitted_at);
        pending
    }

    /// Counts per status and verified revenue.
    #[must_use]
    pub fn stats(&self) -> PaymentStats {
        self.records()
            .values()
            .fold(PaymentStats::default(), |mut stats, record| {
                stats.total += 1;
                match record.status {
                    PaymentStatus::Pending => stats.pending += 1,
                    PaymentStatus::Valid => {
                        stats.valid += 1;
                        stats.revenue += record.amount;
                    },
                    PaymentStatus::Invalid => stats.invalid += 1,
                }
                stats
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::{BookingRequest, ServiceId, UserId};
    use crate::stores::memory::InMemoryBookingRepository;
    use carwash_testing::test_clock;
    use chrono::{NaiveDate, NaiveTime};
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Confirms on `Valid` without saving; refuses everything when told to.
    struct RecordingBridge {
        bookings: InMemoryBookingRepository,
        delivered: Mutex<Vec<(BookingId, PaymentOutcome)>>,
        refuse: AtomicBool,
    }

    impl PaymentStatusBridge for RecordingBridge {
        fn on_payment_verified(
            &self,
            booking_id: BookingId,
            outcome: PaymentOutcome,
        ) -> BoxFuture<'_, Result<Booking>> {
            Box::pin(async move {
                if self.refuse.load(Ordering::SeqCst) {
                    return Err(BookingError::InvalidTransition {
                        from: BookingStatus::Cancelled,
                        to: BookingStatus::Confirmed,
                    });
                }
                self.delivered.lock().unwrap().push((booking_id, outcome));
                let mut booking = self
                    .bookings
                    .find(booking_id)
                    .await?
                    .ok_or(BookingError::NotFound(booking_id))?;
                if outcome == PaymentOutcome::Valid {
                    booking.status = BookingStatus::Confirmed;
                }
                Ok(booking)
            })
        }
    }

    /// A desk over three pending bookings, ids 1 to 3.
    async fn desk() -> (PaymentDesk, Arc<RecordingBridge>, InMemoryBookingRepository) {
        let bookings = InMemoryBookingRepository::new();
        for user in 1..=3 {
            bookings
                .insert(
                    BookingRequest::new(
                        UserId::new(user),
                        ServiceId::new(1),
                        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    )
                    .into_draft(Utc::now()),
                )
                .await
                .unwrap();
        }
        let bridge = Arc::new(RecordingBridge {
            bookings: bookings.clone(),
            delivered: Mutex::new(Vec::new()),
            refuse: AtomicBool::new(false),
        });
        let desk = PaymentDesk::new(
            bridge.clone(),
            Arc::new(bookings.clone()),
            Arc::new(test_clock()),
        );
        (desk, bridge, bookings)
    }

    #[tokio::test]
    async fn cash_is_valid_immediately_and_confirms() {
        let (desk, bridge, _) = desk().await;
        let record = desk
            .submit(BookingId::new(1), PaymentMethod::Cash, 50_000, None)
            .await
            .unwrap();

        assert_eq!(record.status, PaymentStatus::Valid);
        assert!(record.reviewed_at.is_some());
        assert_eq!(
            *bridge.delivered.lock().unwrap(),
            vec![(BookingId::new(1), PaymentOutcome::Valid)]
        );
    }

    #[tokio::test]
    async fn transfer_waits_for_review() {
        let (desk, bridge, _) = desk().await;
        let record = desk
            .submit(BookingId::new(1), PaymentMethod::Transfer, 50_000, Some("proof-1".into()))
            .await
            .unwrap();

        assert_eq!(record.status, PaymentStatus::Pending);
        assert!(bridge.delivered.lock().unwrap().is_empty());
        assert_eq!(desk.pending_review().len(), 1);

        let (record, booking) = desk.verify(BookingId::new(1), Some("ok".into())).await.unwrap();
        assert_eq!(record.status, PaymentStatus::Valid);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(desk.pending_review().is_empty());
    }

    #[tokio::test]
    async fn clones_share_the_same_records() {
        let (desk, _, _) = desk().await;
        let other = desk.clone();

        desk.submit(BookingId::new(1), PaymentMethod::Transfer, 10, None)
            .await
            .unwrap();
        let (record, _) = other.verify(BookingId::new(1), None).await.unwrap();

        assert_eq!(record.status, PaymentStatus::Valid);
        assert_eq!(desk.get(BookingId::new(1)), Some(record));
    }

    #[tokio::test]
    async fn second_payment_for_same_booking_is_refused() {
        let (desk, _, _) = desk().await;
        desk.submit(BookingId::new(1), PaymentMethod::Transfer, 10, None)
            .await
            .unwrap();
        let error = desk
            .submit(BookingId::new(1), PaymentMethod::Cash, 10, None)
            .await
            .unwrap_err();
        assert_eq!(error, BookingError::PaymentExists(BookingId::new(1)));
    }

    #[tokio::test]
    async fn payment_needs_a_live_booking() {
        let (desk, bridge, bookings) = desk().await;

        assert_eq!(
            desk.submit(BookingId::new(999), PaymentMethod::Transfer, 1, None)
                .await
                .unwrap_err(),
            BookingError::NotFound(BookingId::new(999))
        );

        let mut cancelled = bookings.find(BookingId::new(3)).await.unwrap().unwrap();
        cancelled.status = BookingStatus::Cancelled;
        bookings
            .update(cancelled, BookingStatus::Pending)
            .await
            .unwrap();
        for method in [PaymentMethod::EWallet, PaymentMethod::Cash] {
            assert_eq!(
                desk.submit(BookingId::new(3), method, 1, None).await.unwrap_err(),
                BookingError::InvalidTransition {
                    from: BookingStatus::Cancelled,
                    to: BookingStatus::Confirmed,
                }
            );
        }

        assert!(desk.get(BookingId::new(999)).is_none());
        assert!(desk.get(BookingId::new(3)).is_none());
        assert!(bridge.delivered.lock().unwrap().is_empty());
        assert_eq!(desk.stats(), PaymentStats::default());
    }

    #[tokio::test]
    async fn rejected_payment_can_be_reuploaded_but_verified_cannot() {
        let (desk, bridge, _) = desk().await;
        let id = BookingId::new(2);
        desk.submit(id, PaymentMethod::EWallet, 10, Some("a".into()))
            .await
            .unwrap();

        let (record, booking) = desk.reject(id, Some("blurry".into())).await.unwrap();
        assert_eq!(record.status, PaymentStatus::Invalid);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(
            bridge.delivered.lock().unwrap().last(),
            Some(&(id, PaymentOutcome::Invalid))
        );

        let record = desk.reupload_proof(id, "b").unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
        assert_eq!(record.proof.as_deref(), Some("b"));

        desk.verify(id, None).await.unwrap();
        assert_eq!(
            desk.reupload_proof(id, "c").unwrap_err(),
            BookingError::PaymentAlreadyValid(id)
        );
        assert_eq!(
            desk.reject(id, None).await.unwrap_err(),
            BookingError::PaymentAlreadyValid(id)
        );
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let (desk, _, _) = desk().await;
        assert_eq!(
            desk.verify(BookingId::new(2), None).await.unwrap_err(),
            BookingError::PaymentNotFound(BookingId::new(2))
        );
        assert!(desk.get(BookingId::new(2)).is_none());
    }

    #[tokio::test]
    async fn refused_delivery_leaves_no_trace() {
        let (desk, bridge, _) = desk().await;
        let id = BookingId::new(3);

        bridge.refuse.store(true, Ordering::SeqCst);
        assert!(desk.submit(id, PaymentMethod::Card, 10, None).await.is_err());
        assert!(desk.get(id).is_none());

        desk.submit(id, PaymentMethod::Transfer, 10, None)
            .await
            .unwrap();
        assert!(desk.verify(id, None).await.is_err());
        assert_eq!(desk.get(id).unwrap().status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn stats_sum_verified_revenue_only() {
        let (desk, _, _) = desk().await;
        desk.submit(BookingId::new(1), PaymentMethod::Cash, 30, None).await.unwrap();
        desk.submit(BookingId::new(2), PaymentMethod::Transfer, 70, None).await.unwrap();

        let stats = desk.stats();
        assert_eq!((stats.total, stats.valid, stats.pending), (2, 1, 1));
        assert_eq!(stats.revenue, 30);
    }
}
