//! Booking lifecycle reducer.
//!
//! ```text
//!  create ──▶ PENDING ──▶ CONFIRMED ──▶ IN_PROGRESS ──▶ COMPLETED
//!  walk-in ──────────────▶    │
//!               │             │
//!               └─────┬───────┘
//!                     ▼
//!                 CANCELLED  (slot released)
//! ```
//!
//! Creation runs as a short saga: validate, reserve the slot, save the
//! booking. If saving fails the reservation is given back before the
//! request is rejected.
//!
//! Status changes read the booking from the repository, decide on that copy
//! and save it only if the stored status is still the one that was read. A
//! cancellation releases its slot after that save succeeds, so two instances
//! cancelling the same booking release at most once.

use crate::actions::{BookingAction, Transition};
use crate::environment::BookingEnvironment;
use crate::error::BookingError;
use crate::payment::PaymentOutcome;
use crate::state::{
    Actor, Booking, BookingId, BookingRequest, BookingState, BookingStatus, RequestId, Role,
};
use carwash_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

/// Reducer for the booking lifecycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Effect that immediately feeds `action` back.
    fn emit(action: BookingAction) -> Effect<BookingAction> {
        Effect::future(async move { Some(action) })
    }

    fn reject_creation(request_id: RequestId, error: BookingError) -> Effect<BookingAction> {
        Self::emit(BookingAction::CreationRejected { request_id, error })
    }

    fn reject_transition(request_id: RequestId, error: BookingError) -> Effect<BookingAction> {
        Self::emit(BookingAction::TransitionRejected { request_id, error })
    }

    /// Creation preconditions, first failure wins.
    fn validate_creation(
        request: &BookingRequest,
        env: &BookingEnvironment,
    ) -> Result<(), BookingError> {
        if request.date < env.clock.today() {
            return Err(BookingError::PastDate { date: request.date });
        }

        let hours = env.config.hours;
        if !hours.contains(request.time) {
            return Err(BookingError::OutOfHours {
                time: request.time,
                opening: hours.opening,
                closing: hours.closing,
            });
        }

        Ok(())
    }

    /// Who may cancel, what may be cancelled, and until when.
    fn validate_cancel(
        booking: &Booking,
        actor: &Actor,
        env: &BookingEnvironment,
    ) -> Result<(), BookingError> {
        if !actor.may_cancel_for(booking.user_id) {
            return Err(BookingError::unauthorized(
                "only the owner or an admin may cancel this booking",
            ));
        }

        if !booking.status.is_cancellable() {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Cancelled,
            });
        }

        let today = env.clock.today();
        if !booking.can_be_cancelled(today) {
            return Err(BookingError::PastDate { date: booking.date });
        }

        Ok(())
    }

    fn validate_advance(
        booking: &Booking,
        actor: &Actor,
        target: BookingStatus,
    ) -> Result<(), BookingError> {
        if !actor.may_advance() {
            return Err(BookingError::unauthorized(
                "only staff may move bookings forward",
            ));
        }

        if booking.status.next() != Some(target) {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: target,
            });
        }

        Ok(())
    }

    fn cancellation_note(role: Role, reason: Option<&str>) -> String {
        let by = match role {
            Role::Customer => "customer",
            Role::Employee => "employee",
            Role::Admin => "admin",
        };
        match reason.map(str::trim).filter(|reason| !reason.is_empty()) {
            Some(reason) => format!("Cancelled by {by}: {reason}"),
            None => format!("Cancelled by {by}"),
        }
    }

    /// Read the booking a transition applies to.
    fn load(
        state: &mut BookingState,
        request_id: RequestId,
        booking_id: BookingId,
        transition: Transition,
        env: &BookingEnvironment,
    ) -> SmallVec<[Effect<BookingAction>; 4]> {
        if !state.in_flight.insert(request_id) {
            tracing::debug!(%request_id, "Duplicate transition request ignored");
            return SmallVec::new();
        }

        let repository = env.repository.clone();
        smallvec![Effect::future(async move {
            Some(match repository.find(booking_id).await {
                Ok(Some(booking)) => BookingAction::BookingLoaded {
                    request_id,
                    booking,
                    transition,
                },
                Ok(None) => BookingAction::TransitionRejected {
                    request_id,
                    error: BookingError::NotFound(booking_id),
                },
                Err(error) => BookingAction::TransitionRejected { request_id, error },
            })
        })]
    }

    /// Decide a transition against the persisted booking.
    ///
    /// `Ok(None)` means nothing needs to be written.
    fn decide(
        booking: &Booking,
        transition: Transition,
        env: &BookingEnvironment,
    ) -> Result<Option<Booking>, BookingError> {
        let mut updated = booking.clone();
        match transition {
            Transition::Cancel { actor, reason } => {
                Self::validate_cancel(booking, &actor, env)?;
                updated.status = BookingStatus::Cancelled;
                updated.append_note(&Self::cancellation_note(actor.role, reason.as_deref()));
            },
            Transition::Advance { actor, target } => {
                Self::validate_advance(booking, &actor, target)?;
                updated.status = target;
            },
            Transition::Payment(outcome) => match (outcome, booking.status) {
                (PaymentOutcome::Valid, BookingStatus::Pending) => {
                    updated.status = BookingStatus::Confirmed;
                },
                (PaymentOutcome::Valid, BookingStatus::Cancelled) => {
                    return Err(BookingError::InvalidTransition {
                        from: BookingStatus::Cancelled,
                        to: BookingStatus::Confirmed,
                    });
                },
                (
                    PaymentOutcome::Valid,
                    BookingStatus::Confirmed | BookingStatus::InProgress | BookingStatus::Completed,
                )
                | (PaymentOutcome::Invalid, _) => {
                    tracing::debug!(booking_id = %booking.id, ?outcome, status = %booking.status, "Payment outcome changes nothing");
                    return Ok(None);
                },
            },
        }
        Ok(Some(updated))
    }

    /// Save a decided change, guarded by the status it was decided on.
    ///
    /// A cancellation releases the slot only once the save has gone through.
    fn persist_change(
        request_id: RequestId,
        read_status: BookingStatus,
        updated: Booking,
        env: &BookingEnvironment,
    ) -> Effect<BookingAction> {
        let repository = env.repository.clone();
        let allocator = env.allocator.clone();

        Effect::future(async move {
            if let Err(error) = repository.update(updated.clone(), read_status).await {
                if matches!(error, BookingError::InvalidTransition { .. }) {
                    tracing::info!(booking_id = %updated.id, %error, "Booking changed concurrently");
                } else {
                    tracing::error!(booking_id = %updated.id, %error, "Status change not persisted");
                }
                return Some(BookingAction::TransitionRejected { request_id, error });
            }

            tracing::debug!(
                booking_id = %updated.id,
                from = %read_status,
                to = %updated.status,
                "Status changed"
            );

            if updated.status == BookingStatus::Cancelled {
                match allocator.release(updated.date, updated.time).await {
                    Ok(true) => {},
                    Ok(false) => tracing::warn!(
                        booking_id = %updated.id,
                        date = %updated.date,
                        time = %updated.time,
                        "Cancelled booking held no capacity"
                    ),
                    Err(error) => tracing::warn!(
                        booking_id = %updated.id,
                        %error,
                        "Slot release after cancellation failed"
                    ),
                }
                metrics::counter!("booking.cancelled").increment(1);
            }

            Some(BookingAction::BookingUpdated {
                request_id,
                booking: updated,
            })
        })
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per lifecycle step
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Create: validate, then reserve ==========
            BookingAction::CreateBooking {
                request_id,
                request,
            } => {
                if !state.in_flight.insert(request_id) {
                    tracing::debug!(%request_id, "Duplicate creation request ignored");
                    return SmallVec::new();
                }

                if let Err(error) = Self::validate_creation(&request, env) {
                    return smallvec![Self::reject_creation(request_id, error)];
                }

                let allocator = env.allocator.clone();
                smallvec![Effect::future(async move {
                    let (date, time) = (request.date, request.time);
                    let outcome = match allocator.is_available(date, time).await {
                        Ok(true) => allocator.reserve(date, time).await,
                        other => other,
                    };

                    Some(match outcome {
                        Ok(true) => BookingAction::SlotReserved {
                            request_id,
                            request,
                        },
                        Ok(false) => BookingAction::CreationRejected {
                            request_id,
                            error: BookingError::SlotUnavailable { date, time },
                        },
                        Err(error) => BookingAction::CreationRejected { request_id, error },
                    })
                })]
            },

            // ========== Create: slot held, save the booking ==========
            BookingAction::SlotReserved {
                request_id,
                request,
            } => {
                let repository = env.repository.clone();
                let draft = request.clone().into_draft(env.clock.now());

                smallvec![Effect::future(async move {
                    Some(match repository.insert(draft).await {
                        Ok(booking) => BookingAction::BookingCreated {
                            request_id,
                            booking,
                        },
                        Err(error) => BookingAction::PersistenceFailed {
                            request_id,
                            request,
                            error,
                        },
                    })
                })]
            },

            // ========== Create: save failed, give the slot back ==========
            BookingAction::PersistenceFailed {
                request_id,
                request,
                error,
            } => {
                tracing::error!(%request_id, %error, "Booking not saved, releasing slot");
                let allocator = env.allocator.clone();

                smallvec![Effect::future(async move {
                    match allocator.release(request.date, request.time).await {
                        Ok(true) => metrics::counter!("booking.compensated").increment(1),
                        Ok(false) => tracing::warn!(
                            date = %request.date,
                            time = %request.time,
                            "Compensating release found nothing to release"
                        ),
                        Err(release_error) => tracing::warn!(
                            date = %request.date,
                            time = %request.time,
                            error = %release_error,
                            "Compensating release failed"
                        ),
                    }
                    Some(BookingAction::CreationRejected { request_id, error })
                })]
            },

            BookingAction::BookingCreated {
                request_id,
                booking,
            } => {
                state.in_flight.remove(&request_id);
                metrics::counter!("booking.created").increment(1);
                tracing::info!(
                    booking_id = %booking.id,
                    reference = %booking.reference(),
                    status = %booking.status,
                    "Booking created"
                );
                SmallVec::new()
            },

            BookingAction::CreationRejected { request_id, error } => {
                state.in_flight.remove(&request_id);
                tracing::debug!(%request_id, %error, "Booking creation rejected");
                state.last_error = Some(error);
                SmallVec::new()
            },

            // ========== Transitions: read the booking first ==========
            BookingAction::CancelBooking {
                request_id,
                booking_id,
                actor,
                reason,
            } => Self::load(
                state,
                request_id,
                booking_id,
                Transition::Cancel { actor, reason },
                env,
            ),

            BookingAction::AdvanceBooking {
                request_id,
                booking_id,
                actor,
                target,
            } => Self::load(
                state,
                request_id,
                booking_id,
                Transition::Advance { actor, target },
                env,
            ),

            BookingAction::ApplyPaymentOutcome {
                request_id,
                booking_id,
                outcome,
            } => Self::load(
                state,
                request_id,
                booking_id,
                Transition::Payment(outcome),
                env,
            ),

            // ========== Transitions: decide on the persisted copy ==========
            BookingAction::BookingLoaded {
                request_id,
                booking,
                transition,
            } => match Self::decide(&booking, transition, env) {
                Ok(Some(updated)) => {
                    smallvec![Self::persist_change(request_id, booking.status, updated, env)]
                },
                Ok(None) => smallvec![Self::emit(BookingAction::BookingUpdated {
                    request_id,
                    booking,
                })],
                Err(error) => smallvec![Self::reject_transition(request_id, error)],
            },

            BookingAction::BookingUpdated { request_id, .. } => {
                state.in_flight.remove(&request_id);
                SmallVec::new()
            },

            BookingAction::TransitionRejected { request_id, error } => {
                state.in_flight.remove(&request_id);
                tracing::debug!(%request_id, %error, "Transition rejected");
                state.last_error = Some(error);
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::BookingConfig;
    use crate::mocks::FailingBookingRepository;
    use crate::providers::{BookingRepository, SlotLedger};
    use crate::state::{ServiceId, UserId};
    use crate::stores::memory::{InMemoryBookingRepository, InMemorySlotLedger};
    use carwash_testing::{FixedClock, ReducerTest, assertions, effects::collect_actions};
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    struct Fixture {
        env: BookingEnvironment,
        ledger: Arc<InMemorySlotLedger>,
        repository: Arc<dyn BookingRepository>,
    }

    impl Fixture {
        /// Save a booking for user 1 at 09:00 in `status`, holding one unit
        /// of capacity when the status does.
        async fn seed(&self, status: BookingStatus, date: NaiveDate) -> Booking {
            let mut booking = self
                .repository
                .insert(request(date, nine()).into_draft(self.env.clock.now()))
                .await
                .unwrap();
            if status != BookingStatus::Pending {
                booking.status = status;
                self.repository
                    .update(booking.clone(), BookingStatus::Pending)
                    .await
                    .unwrap();
            }
            if status.holds_capacity() {
                self.ledger.upsert_increment(date, nine()).await.unwrap();
            }
            booking
        }
    }

    fn fixture_with(repository: Arc<dyn BookingRepository>) -> Fixture {
        let ledger = Arc::new(InMemorySlotLedger::new(10));
        let env = BookingEnvironment::new(
            ledger.clone(),
            repository.clone(),
            Arc::new(FixedClock::on_date(today())),
            BookingConfig::default(),
        );
        Fixture {
            env,
            ledger,
            repository,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(InMemoryBookingRepository::new()))
    }

    fn request(date: NaiveDate, time: NaiveTime) -> BookingRequest {
        BookingRequest::new(UserId::new(1), ServiceId::new(1), date, time)
    }

    async fn occupied(ledger: &InMemorySlotLedger, date: NaiveDate, time: NaiveTime) -> u32 {
        ledger
            .get(date, time)
            .await
            .unwrap()
            .map_or(0, |slot| slot.occupied)
    }

    fn single(mut actions: Vec<BookingAction>) -> BookingAction {
        assert_eq!(actions.len(), 1, "expected one action, got {actions:?}");
        actions.remove(0)
    }

    /// Feed every produced action back until the command's final outcome.
    async fn drive(fx: &Fixture, state: &mut BookingState, command: BookingAction) -> BookingAction {
        let id = command.request_id();
        let reducer = BookingReducer::new();
        let mut pending = vec![command];
        let mut outcome = None;
        while let Some(action) = pending.pop() {
            if action.is_outcome_for(id) {
                outcome = Some(action.clone());
            }
            let effects = reducer.reduce(state, action, &fx.env);
            pending.extend(collect_actions(effects).await);
        }
        outcome.expect("command produced no outcome")
    }

    fn cancel(booking_id: BookingId, actor: Actor, reason: Option<&str>) -> BookingAction {
        BookingAction::CancelBooking {
            request_id: RequestId::new(),
            booking_id,
            actor,
            reason: reason.map(str::to_string),
        }
    }

    // ========== Creation ==========

    #[tokio::test]
    async fn past_date_is_rejected_without_touching_the_ledger() {
        let fx = fixture();
        let yesterday = today().pred_opt().unwrap();
        let id = RequestId::new();

        let (state, effects) = ReducerTest::new(BookingReducer::new())
            .with_env(fx.env.clone())
            .given_state(BookingState::default())
            .when_action(BookingAction::CreateBooking {
                request_id: id,
                request: request(yesterday, nine()),
            })
            .then_effects(|effects| assertions::assert_has_future_effect(effects))
            .run_into_parts();

        assert!(state.in_flight.contains(&id));
        let action = single(collect_actions(effects).await);
        assert_eq!(
            action,
            BookingAction::CreationRejected {
                request_id: id,
                error: BookingError::PastDate { date: yesterday },
            }
        );
        assert!(fx.ledger.list_for_date(yesterday).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_hours_is_rejected() {
        let fx = fixture();
        let late = NaiveTime::from_hms_opt(19, 0, 0).unwrap();

        let (_, effects) = ReducerTest::new(BookingReducer::new())
            .with_env(fx.env.clone())
            .given_state(BookingState::default())
            .when_action(BookingAction::CreateBooking {
                request_id: RequestId::new(),
                request: request(today(), late),
            })
            .run_into_parts();

        let action = single(collect_actions(effects).await);
        assert!(matches!(
            action,
            BookingAction::CreationRejected {
                error: BookingError::OutOfHours { .. },
                ..
            }
        ));
        assert_eq!(occupied(&fx.ledger, today(), late).await, 0);
    }

    #[tokio::test]
    async fn full_slot_is_unavailable_and_left_unchanged() {
        let fx = fixture();
        fx.ledger.set_occupied(today(), nine(), 10).await.unwrap();

        let (_, effects) = ReducerTest::new(BookingReducer::new())
            .with_env(fx.env.clone())
            .given_state(BookingState::default())
            .when_action(BookingAction::CreateBooking {
                request_id: RequestId::new(),
                request: request(today(), nine()),
            })
            .run_into_parts();

        let action = single(collect_actions(effects).await);
        assert!(matches!(
            action,
            BookingAction::CreationRejected {
                error: BookingError::SlotUnavailable { .. },
                ..
            }
        ));
        assert_eq!(occupied(&fx.ledger, today(), nine()).await, 10);
    }

    #[tokio::test]
    async fn creation_reserves_then_saves() {
        let fx = fixture();
        let id = RequestId::new();
        let mut state = BookingState::default();
        let reducer = BookingReducer::new();

        let effects = reducer.reduce(
            &mut state,
            BookingAction::CreateBooking {
                request_id: id,
                request: request(today(), nine()),
            },
            &fx.env,
        );
        let reserved = single(collect_actions(effects).await);
        assert!(matches!(reserved, BookingAction::SlotReserved { .. }));
        assert_eq!(occupied(&fx.ledger, today(), nine()).await, 1);

        let effects = reducer.reduce(&mut state, reserved, &fx.env);
        let created = single(collect_actions(effects).await);
        let BookingAction::BookingCreated { ref booking, .. } = created else {
            panic!("expected BookingCreated, got {created:?}");
        };
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.created_at, fx.env.clock.now());

        let effects = reducer.reduce(&mut state, created, &fx.env);
        assertions::assert_no_effects(&effects);
        assert!(state.in_flight.is_empty());
        assert_eq!(fx.repository.list_all().await.unwrap().len(), 1);
    }

    #[test]
    fn duplicate_request_id_is_ignored() {
        let fx = fixture();
        let id = RequestId::new();
        let command = BookingAction::CreateBooking {
            request_id: id,
            request: request(today(), nine()),
        };

        ReducerTest::new(BookingReducer::new())
            .with_env(fx.env)
            .given_state(BookingState::default())
            .when_action(command.clone())
            .when_action(command)
            .then_effects(|effects| assertions::assert_effects_count(effects, 0))
            .run();
    }

    #[tokio::test]
    async fn failed_save_releases_the_slot() {
        let failing = Arc::new(FailingBookingRepository::new());
        failing.fail_inserts(true);
        let fx = fixture_with(failing);
        let mut state = BookingState::default();

        let outcome = drive(
            &fx,
            &mut state,
            BookingAction::CreateBooking {
                request_id: RequestId::new(),
                request: request(today(), nine()),
            },
        )
        .await;

        assert!(matches!(
            outcome,
            BookingAction::CreationRejected {
                error: BookingError::Persistence(_),
                ..
            }
        ));
        assert_eq!(occupied(&fx.ledger, today(), nine()).await, 0);
        assert!(state.in_flight.is_empty());
        assert!(fx.repository.list_all().await.unwrap().is_empty());
    }

    // ========== Cancellation ==========

    #[tokio::test]
    async fn cancel_reads_the_booking_before_deciding() {
        let fx = fixture();
        let b = fx.seed(BookingStatus::Confirmed, today()).await;
        let command = cancel(b.id, Actor::customer(b.user_id), None);
        let id = command.request_id();

        let (state, effects) = ReducerTest::new(BookingReducer::new())
            .with_env(fx.env.clone())
            .given_state(BookingState::default())
            .when_action(command)
            .run_into_parts();

        assert!(state.in_flight.contains(&id));
        let loaded = single(collect_actions(effects).await);
        assert_eq!(
            loaded,
            BookingAction::BookingLoaded {
                request_id: id,
                booking: b,
                transition: Transition::Cancel {
                    actor: Actor::customer(UserId::new(1)),
                    reason: None,
                },
            }
        );
    }

    #[tokio::test]
    async fn owner_cancels_and_slot_is_released() {
        let fx = fixture();
        let b = fx.seed(BookingStatus::Pending, today()).await;
        let mut state = BookingState::default();

        let outcome = drive(
            &fx,
            &mut state,
            cancel(b.id, Actor::customer(b.user_id), Some("Change of plans")),
        )
        .await;

        let cancelled = outcome.into_result().unwrap().unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.notes.as_deref(), Some("Cancelled by customer: Change of plans"));
        assert_eq!(fx.repository.find(b.id).await.unwrap(), Some(cancelled));
        assert_eq!(occupied(&fx.ledger, today(), nine()).await, 0);
        assert!(state.in_flight.is_empty());
    }

    #[tokio::test]
    async fn decision_made_on_a_stale_read_is_refused_and_releases_nothing() {
        let fx = fixture();
        let b = fx.seed(BookingStatus::Confirmed, today()).await;
        // A second booking keeps the slot occupied after the first cancel.
        fx.seed(BookingStatus::Confirmed, today()).await;
        let reducer = BookingReducer::new();
        let mut state = BookingState::default();

        // Read CONFIRMED here, then let someone else cancel first.
        let command = cancel(b.id, Actor::customer(b.user_id), None);
        let id = command.request_id();
        let loaded = single(collect_actions(reducer.reduce(&mut state, command, &fx.env)).await);
        drive(&fx, &mut BookingState::default(), cancel(b.id, Actor::admin(UserId::new(9)), None))
            .await
            .into_result()
            .unwrap()
            .unwrap();
        assert_eq!(occupied(&fx.ledger, today(), nine()).await, 1);

        let outcome = single(collect_actions(reducer.reduce(&mut state, loaded, &fx.env)).await);
        assert_eq!(
            outcome,
            BookingAction::TransitionRejected {
                request_id: id,
                error: BookingError::InvalidTransition {
                    from: BookingStatus::Cancelled,
                    to: BookingStatus::Cancelled,
                },
            }
        );
        assert_eq!(occupied(&fx.ledger, today(), nine()).await, 1);
    }

    #[tokio::test]
    async fn other_customer_may_not_cancel() {
        let fx = fixture();
        let b = fx.seed(BookingStatus::Pending, today()).await;

        let outcome = drive(
            &fx,
            &mut BookingState::default(),
            cancel(b.id, Actor::customer(UserId::new(2)), None),
        )
        .await;

        assert!(matches!(
            outcome,
            BookingAction::TransitionRejected {
                error: BookingError::Authorization { .. },
                ..
            }
        ));
        assert_eq!(fx.repository.find(b.id).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn completed_and_cancelled_cannot_be_cancelled() {
        for status in [BookingStatus::Completed, BookingStatus::Cancelled, BookingStatus::InProgress] {
            let fx = fixture();
            let b = fx.seed(status, today()).await;

            let outcome = drive(
                &fx,
                &mut BookingState::default(),
                cancel(b.id, Actor::admin(UserId::new(9)), None),
            )
            .await;

            assert_eq!(
                outcome.into_result(),
                Some(Err(BookingError::InvalidTransition {
                    from: status,
                    to: BookingStatus::Cancelled,
                }))
            );
        }
    }

    #[tokio::test]
    async fn past_booking_cannot_be_cancelled() {
        let fx = fixture();
        let yesterday = today().pred_opt().unwrap();
        let b = fx.seed(BookingStatus::Confirmed, yesterday).await;

        let outcome = drive(
            &fx,
            &mut BookingState::default(),
            cancel(b.id, Actor::customer(b.user_id), None),
        )
        .await;

        assert_eq!(
            outcome.into_result(),
            Some(Err(BookingError::PastDate { date: yesterday }))
        );
    }

    #[tokio::test]
    async fn failed_cancel_persist_keeps_booking_and_slot() {
        let failing = Arc::new(FailingBookingRepository::new());
        let fx = fixture_with(failing.clone());
        let b = fx.seed(BookingStatus::Pending, today()).await;
        failing.fail_updates(true);
        let mut state = BookingState::default();

        let outcome = drive(&fx, &mut state, cancel(b.id, Actor::admin(UserId::new(5)), None)).await;

        assert!(matches!(
            outcome.into_result(),
            Some(Err(BookingError::Persistence(_)))
        ));
        assert!(matches!(state.last_error, Some(BookingError::Persistence(_))));
        assert_eq!(fx.repository.find(b.id).await.unwrap(), Some(b));
        assert_eq!(occupied(&fx.ledger, today(), nine()).await, 1);
    }

    #[tokio::test]
    async fn unknown_booking_is_not_found() {
        let fx = fixture();

        let outcome = drive(
            &fx,
            &mut BookingState::default(),
            cancel(BookingId::new(404), Actor::admin(UserId::new(1)), None),
        )
        .await;

        assert_eq!(
            outcome.into_result(),
            Some(Err(BookingError::NotFound(BookingId::new(404))))
        );
    }

    #[test]
    fn cancellation_note_names_the_role() {
        assert_eq!(
            BookingReducer::cancellation_note(Role::Customer, Some("  ")),
            "Cancelled by customer"
        );
        assert_eq!(
            BookingReducer::cancellation_note(Role::Admin, Some("Duplicate")),
            "Cancelled by admin: Duplicate"
        );
    }

    // ========== Advance ==========

    #[tokio::test]
    async fn staff_advance_one_step_at_a_time() {
        let fx = fixture();
        let b = fx.seed(BookingStatus::Confirmed, today()).await;
        let staff = Actor::employee(UserId::new(5));
        let advance = |target| BookingAction::AdvanceBooking {
            request_id: RequestId::new(),
            booking_id: b.id,
            actor: staff,
            target,
        };

        let skipped = drive(&fx, &mut BookingState::default(), advance(BookingStatus::Completed)).await;
        assert_eq!(
            skipped.into_result(),
            Some(Err(BookingError::InvalidTransition {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Completed,
            }))
        );

        let started = drive(&fx, &mut BookingState::default(), advance(BookingStatus::InProgress)).await;
        assert_eq!(
            started.into_result().unwrap().unwrap().status,
            BookingStatus::InProgress
        );
        assert_eq!(
            fx.repository.find(b.id).await.unwrap().unwrap().status,
            BookingStatus::InProgress
        );
    }

    #[tokio::test]
    async fn customers_cannot_advance() {
        let fx = fixture();
        let b = fx.seed(BookingStatus::Pending, today()).await;

        let outcome = drive(
            &fx,
            &mut BookingState::default(),
            BookingAction::AdvanceBooking {
                request_id: RequestId::new(),
                booking_id: b.id,
                actor: Actor::customer(b.user_id),
                target: BookingStatus::Confirmed,
            },
        )
        .await;

        assert!(matches!(
            outcome.into_result(),
            Some(Err(BookingError::Authorization { .. }))
        ));
    }

    // ========== Payment ==========

    fn payment(booking_id: BookingId, outcome: PaymentOutcome) -> BookingAction {
        BookingAction::ApplyPaymentOutcome {
            request_id: RequestId::new(),
            booking_id,
            outcome,
        }
    }

    #[tokio::test]
    async fn valid_payment_confirms_pending() {
        let fx = fixture();
        let b = fx.seed(BookingStatus::Pending, today()).await;

        let outcome = drive(&fx, &mut BookingState::default(), payment(b.id, PaymentOutcome::Valid)).await;

        let booking = outcome.into_result().unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(fx.repository.find(b.id).await.unwrap(), Some(booking));
    }

    #[tokio::test]
    async fn payment_outcomes_that_change_nothing() {
        let cases = [
            (PaymentOutcome::Valid, BookingStatus::Confirmed),
            (PaymentOutcome::Valid, BookingStatus::Completed),
            (PaymentOutcome::Invalid, BookingStatus::Pending),
        ];
        for (outcome, status) in cases {
            let fx = fixture();
            let b = fx.seed(status, today()).await;

            let result = drive(&fx, &mut BookingState::default(), payment(b.id, outcome)).await;

            assert_eq!(result.into_result(), Some(Ok(b.clone())));
            assert_eq!(fx.repository.find(b.id).await.unwrap(), Some(b));
        }
    }

    #[tokio::test]
    async fn valid_payment_on_cancelled_is_invalid_transition() {
        let fx = fixture();
        let b = fx.seed(BookingStatus::Cancelled, today()).await;

        let outcome = drive(&fx, &mut BookingState::default(), payment(b.id, PaymentOutcome::Valid)).await;

        assert_eq!(
            outcome.into_result(),
            Some(Err(BookingError::InvalidTransition {
                from: BookingStatus::Cancelled,
                to: BookingStatus::Confirmed,
            }))
        );
    }

    #[tokio::test]
    async fn transitions_leave_no_booking_in_the_store() {
        let fx = fixture();
        let b = fx.seed(BookingStatus::Pending, today()).await;
        let mut state = BookingState::default();

        drive(&fx, &mut state, payment(b.id, PaymentOutcome::Valid)).await;
        drive(&fx, &mut state, cancel(b.id, Actor::customer(b.user_id), None)).await;

        assert!(state.in_flight.is_empty());
        assert_eq!(
            fx.repository.find(b.id).await.unwrap().unwrap().status,
            BookingStatus::Cancelled
        );
    }
}
