//! Booking service.
//!
//! Request/response facade over the lifecycle [`Store`]. Each command is
//! sent with a fresh [`RequestId`] and the call waits for the outcome
//! action carrying that id, so concurrent callers never see each other's
//! results.
//!
//! Reads go straight to the repository and the ledger. Several services may
//! share one set of backends; none of them keeps its own copy of a booking.

use crate::actions::BookingAction;
use crate::allocator::SlotAllocator;
use crate::config::BookingConfig;
use crate::environment::BookingEnvironment;
use crate::error::{BookingError, Result};
use crate::payment::{PaymentDesk, PaymentOutcome};
use crate::providers::PaymentStatusBridge;
use crate::reducers::BookingReducer;
use crate::state::{
    Actor, Booking, BookingId, BookingRequest, BookingState, BookingStats, BookingStatus,
    RequestId, Slot, SlotView, UserId,
};
use crate::stores::memory::{InMemoryBookingRepository, InMemorySlotLedger};
use carwash_core::environment::Clock;
use carwash_runtime::Store;
use chrono::{NaiveDate, NaiveTime};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Outcome buffer per store; sized for bursts of concurrent requests.
const ACTION_BUFFER: usize = 1024;

type BookingStore = Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>;

/// Send a command and wait for its outcome.
async fn dispatch(store: &BookingStore, request_id: RequestId, command: BookingAction) -> Result<Booking> {
    let outcome = store
        .send_and_wait_for(
            command,
            move |action| action.is_outcome_for(request_id),
            store.environment().config.request_timeout,
        )
        .await?;

    outcome
        .into_result()
        .unwrap_or_else(|| Err(BookingError::Runtime("unexpected outcome action".to_string())))
}

/// Delivers payment outcomes into the lifecycle store.
#[derive(Clone)]
struct LifecycleBridge {
    store: BookingStore,
}

impl PaymentStatusBridge for LifecycleBridge {
    fn on_payment_verified(
        &self,
        booking_id: BookingId,
        outcome: PaymentOutcome,
    ) -> BoxFuture<'_, Result<Booking>> {
        Box::pin(async move {
            let request_id = RequestId::new();
            dispatch(
                &self.store,
                request_id,
                BookingAction::ApplyPaymentOutcome {
                    request_id,
                    booking_id,
                    outcome,
                },
            )
            .await
        })
    }
}

/// Booking operations for the presentation layer.
#[derive(Clone)]
pub struct BookingService {
    store: BookingStore,
    payments: PaymentDesk,
}

impl BookingService {
    /// Create a service over the given backends.
    #[must_use]
    pub fn new(environment: BookingEnvironment) -> Self {
        let repository = Arc::clone(&environment.repository);
        let clock = Arc::clone(&environment.clock);
        let store = Store::with_broadcast_capacity(
            BookingState::default(),
            BookingReducer::new(),
            environment,
            ACTION_BUFFER,
        );
        let bridge = Arc::new(LifecycleBridge {
            store: store.clone(),
        });

        Self {
            store,
            payments: PaymentDesk::new(bridge, repository, clock),
        }
    }

    /// Create a service backed by in-memory storage.
    #[must_use]
    pub fn in_memory(config: BookingConfig, clock: Arc<dyn Clock>) -> Self {
        let ledger = Arc::new(InMemorySlotLedger::new(config.capacity));
        let repository = Arc::new(InMemoryBookingRepository::new());
        Self::new(BookingEnvironment::new(ledger, repository, clock, config))
    }

    /// Injected dependencies.
    #[must_use]
    pub fn environment(&self) -> &BookingEnvironment {
        self.store.environment()
    }

    /// The slot allocator behind this service.
    #[must_use]
    pub fn allocator(&self) -> &SlotAllocator {
        &self.environment().allocator
    }

    /// The payment desk delivering outcomes to this service.
    ///
    /// Every handle shares one set of payment records.
    #[must_use]
    pub fn payment_desk(&self) -> PaymentDesk {
        self.payments.clone()
    }

    async fn dispatch(&self, request_id: RequestId, command: BookingAction) -> Result<Booking> {
        dispatch(&self.store, request_id, command).await
    }

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Create a booking.
    ///
    /// The slot is reserved before the booking is saved; if saving fails the
    /// reservation is released again and the save error is returned.
    ///
    /// # Errors
    ///
    /// - `BookingError::PastDate` if the date is before today
    /// - `BookingError::OutOfHours` if the time is outside business hours
    /// - `BookingError::SlotUnavailable` if the slot is full
    /// - `BookingError::Persistence` or `BookingError::Storage` on backend failure
    /// - `BookingError::Timeout` if no outcome arrives in time
    #[tracing::instrument(
        skip(self, request),
        fields(user_id = %request.user_id, date = %request.date, time = %request.time, method = request.method.as_str())
    )]
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking> {
        let request_id = RequestId::new();
        self.dispatch(
            request_id,
            BookingAction::CreateBooking {
                request_id,
                request,
            },
        )
        .await
    }

    /// Register a walk-in. It starts confirmed and records who created it.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_booking`].
    pub async fn create_walk_in(
        &self,
        request: BookingRequest,
        employee_name: impl Into<String>,
    ) -> Result<Booking> {
        self.create_booking(request.walk_in(employee_name)).await
    }

    /// Cancel a booking and release its slot.
    ///
    /// # Errors
    ///
    /// - `BookingError::NotFound` for an unknown booking
    /// - `BookingError::Authorization` unless the actor owns the booking or is an admin
    /// - `BookingError::InvalidTransition` unless the booking is pending or confirmed
    /// - `BookingError::PastDate` if the booking date has passed
    /// - `BookingError::InvalidTransition` also when another caller changed
    ///   the booking first
    /// - `BookingError::Persistence` if the change could not be saved
    #[tracing::instrument(skip(self, reason), fields(booking_id = %booking_id, role = ?actor.role))]
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Booking> {
        let request_id = RequestId::new();
        self.dispatch(
            request_id,
            BookingAction::CancelBooking {
                request_id,
                booking_id,
                actor,
                reason,
            },
        )
        .await
    }

    /// Move a booking one step forward (confirm, start, complete).
    ///
    /// # Errors
    ///
    /// - `BookingError::NotFound` for an unknown booking
    /// - `BookingError::Authorization` if the actor is a customer
    /// - `BookingError::InvalidTransition` unless `target` is the next status
    /// - `BookingError::Persistence` if the change could not be saved
    #[tracing::instrument(skip(self), fields(booking_id = %booking_id, role = ?actor.role, target = %target))]
    pub async fn advance_booking(
        &self,
        booking_id: BookingId,
        actor: Actor,
        target: BookingStatus,
    ) -> Result<Booking> {
        let request_id = RequestId::new();
        self.dispatch(
            request_id,
            BookingAction::AdvanceBooking {
                request_id,
                booking_id,
                actor,
                target,
            },
        )
        .await
    }

    // ═══════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════

    /// Bookable times on `date`.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn available_times(&self, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        self.allocator().available_times(date).await
    }

    /// Occupancy of every slot on `date`.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn slot_snapshot(&self, date: NaiveDate) -> Result<Vec<SlotView>> {
        self.allocator().slot_snapshot(date).await
    }

    /// Look up one booking.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` if the repository fails.
    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        self.environment().repository.find(booking_id).await
    }

    /// A user's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` if the repository fails.
    pub async fn bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        self.environment().repository.list_for_user(user_id).await
    }

    /// Every booking on `date`.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` if the repository fails.
    pub async fn bookings_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>> {
        self.environment().repository.list_for_date(date).await
    }

    /// Booking counts per status.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` if the repository fails.
    pub async fn stats(&self) -> Result<BookingStats> {
        let bookings = self.environment().repository.list_all().await?;
        Ok(BookingStats::from_bookings(&bookings))
    }

    // ═══════════════════════════════════════════════════════════
    // Maintenance
    // ═══════════════════════════════════════════════════════════

    /// Recompute occupancy on `date` from the bookings that hold capacity and
    /// overwrite the ledger counts. Returns the slots that changed.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Persistence` or `BookingError::Storage` on backend failure.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_slots(&self, date: NaiveDate) -> Result<Vec<Slot>> {
        let bookings = self.bookings_for_date(date).await?;
        let mut expected: BTreeMap<NaiveTime, u32> = BTreeMap::new();
        for booking in bookings.iter().filter(|b| b.status.holds_capacity()) {
            *expected.entry(booking.time).or_default() += 1;
        }

        let allocator = self.allocator();
        let stored: BTreeMap<NaiveTime, u32> = allocator
            .stored_slots(date)
            .await?
            .into_iter()
            .map(|slot| (slot.time, slot.occupied))
            .collect();
        for time in stored.keys() {
            expected.entry(*time).or_default();
        }

        let mut changed = Vec::new();
        for (time, occupied) in expected {
            let before = stored.get(&time).copied();
            if before == Some(occupied) {
                continue;
            }
            let after = allocator.overwrite_occupancy(date, time, occupied).await?;
            tracing::warn!(%time, ?before, after = after.occupied, "Slot occupancy corrected");
            changed.push(after);
        }
        Ok(changed)
    }

    /// Materialize slots for the configured provisioning horizon.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn provision(&self) -> Result<usize> {
        let days = self.environment().config.provision_days;
        self.allocator().initialize_next_days(days).await
    }

    /// Stop accepting commands and wait for running effects.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Runtime` if effects are still running at the timeout.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        Ok(self.store.shutdown(timeout).await?)
    }
}
