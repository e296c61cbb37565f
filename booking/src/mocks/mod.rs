//! Failure-injecting providers for testing.
//!
//! Both wrap the in-memory backends and fail selected operations on demand,
//! so compensation and revert paths can be exercised without a database.

use crate::error::{BookingError, LedgerError, Result};
use crate::providers::{BookingRepository, SlotLedger};
use crate::state::{Booking, BookingDraft, BookingId, BookingStatus, Slot, UserId};
use crate::stores::memory::{InMemoryBookingRepository, InMemorySlotLedger};
use chrono::{NaiveDate, NaiveTime};
use futures::future::{self, BoxFuture};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Booking repository whose writes can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct FailingBookingRepository {
    inner: InMemoryBookingRepository,
    fail_inserts: Arc<AtomicBool>,
    fail_updates: Arc<AtomicBool>,
}

impl FailingBookingRepository {
    /// Create a repository that succeeds until told otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `insert` fail (or succeed again).
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make `update` fail (or succeed again).
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

impl BookingRepository for FailingBookingRepository {
    fn insert(&self, draft: BookingDraft) -> BoxFuture<'_, Result<Booking>> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Box::pin(future::ready(Err(BookingError::Persistence(
                "insert refused".to_string(),
            ))));
        }
        self.inner.insert(draft)
    }

    fn update(&self, booking: Booking, expected: BookingStatus) -> BoxFuture<'_, Result<()>> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Box::pin(future::ready(Err(BookingError::Persistence(
                "update refused".to_string(),
            ))));
        }
        self.inner.update(booking, expected)
    }

    fn find(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>>> {
        self.inner.find(id)
    }

    fn list_for_user(&self, user_id: UserId) -> BoxFuture<'_, Result<Vec<Booking>>> {
        self.inner.list_for_user(user_id)
    }

    fn list_for_date(&self, date: NaiveDate) -> BoxFuture<'_, Result<Vec<Booking>>> {
        self.inner.list_for_date(date)
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<Booking>>> {
        self.inner.list_all()
    }
}

/// Slot ledger whose releases can be made to fail.
#[derive(Debug, Clone)]
pub struct FlakySlotLedger {
    inner: InMemorySlotLedger,
    fail_decrements: Arc<AtomicBool>,
}

impl FlakySlotLedger {
    /// Wrap a fresh in-memory ledger with the given capacity.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            inner: InMemorySlotLedger::new(capacity),
            fail_decrements: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make `decrement` fail (or succeed again).
    pub fn fail_decrements(&self, fail: bool) {
        self.fail_decrements.store(fail, Ordering::SeqCst);
    }
}

impl SlotLedger for FlakySlotLedger {
    fn capacity(&self) -> u32 {
        self.inner.capacity()
    }

    fn get(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, std::result::Result<Option<Slot>, LedgerError>> {
        self.inner.get(date, time)
    }

    fn upsert_increment(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, std::result::Result<Slot, LedgerError>> {
        self.inner.upsert_increment(date, time)
    }

    fn decrement(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, std::result::Result<Option<Slot>, LedgerError>> {
        if self.fail_decrements.load(Ordering::SeqCst) {
            return Box::pin(future::ready(Err(LedgerError::Storage(
                "decrement refused".to_string(),
            ))));
        }
        self.inner.decrement(date, time)
    }

    fn materialize<'a>(
        &'a self,
        date: NaiveDate,
        times: &'a [NaiveTime],
    ) -> BoxFuture<'a, std::result::Result<usize, LedgerError>> {
        self.inner.materialize(date, times)
    }

    fn list_for_date(
        &self,
        date: NaiveDate,
    ) -> BoxFuture<'_, std::result::Result<Vec<Slot>, LedgerError>> {
        self.inner.list_for_date(date)
    }

    fn purge_before(&self, date: NaiveDate) -> BoxFuture<'_, std::result::Result<u64, LedgerError>> {
        self.inner.purge_before(date)
    }

    fn set_occupied(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        occupied: u32,
    ) -> BoxFuture<'_, std::result::Result<Slot, LedgerError>> {
        self.inner.set_occupied(date, time, occupied)
    }
}
