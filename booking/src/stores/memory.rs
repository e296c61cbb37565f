//! In-memory backends.
//!
//! Each operation holds the map's lock only for its own read-modify-write,
//! which makes increment and decrement atomic per key.

use crate::error::{BookingError, LedgerError, Result};
use crate::providers::{BookingRepository, SlotLedger};
use crate::state::{Booking, BookingDraft, BookingId, BookingStatus, Slot, UserId};
use chrono::{NaiveDate, NaiveTime};
use futures::future::{self, BoxFuture};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type SlotKey = (NaiveDate, NaiveTime);

/// Slot ledger backed by an ordered map.
#[derive(Debug, Clone)]
pub struct InMemorySlotLedger {
    slots: Arc<Mutex<BTreeMap<SlotKey, Slot>>>,
    capacity: u32,
}

impl InMemorySlotLedger {
    /// Create an empty ledger whose slots hold `capacity` bookings.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: Arc::new(Mutex::new(BTreeMap::new())),
            capacity,
        }
    }

    fn lock(&self) -> std::result::Result<MutexGuard<'_, BTreeMap<SlotKey, Slot>>, LedgerError> {
        self.slots
            .lock()
            .map_err(|_| LedgerError::Storage("slot ledger lock poisoned".to_string()))
    }

    fn upsert_increment_now(&self, date: NaiveDate, time: NaiveTime) -> std::result::Result<Slot, LedgerError> {
        let mut slots = self.lock()?;
        let slot = slots
            .entry((date, time))
            .or_insert_with(|| Slot::empty(date, time, self.capacity));

        if !slot.is_available() {
            return Err(LedgerError::SlotFull {
                date,
                time,
                capacity: slot.capacity,
            });
        }
        slot.occupied += 1;
        Ok(*slot)
    }

    fn decrement_now(&self, date: NaiveDate, time: NaiveTime) -> std::result::Result<Option<Slot>, LedgerError> {
        let mut slots = self.lock()?;
        Ok(slots.get_mut(&(date, time)).and_then(|slot| {
            (slot.occupied > 0).then(|| {
                slot.occupied -= 1;
                *slot
            })
        }))
    }

    fn materialize_now(&self, date: NaiveDate, times: &[NaiveTime]) -> std::result::Result<usize, LedgerError> {
        let mut slots = self.lock()?;
        let mut created = 0;
        for &time in times {
            slots.entry((date, time)).or_insert_with(|| {
                created += 1;
                Slot::empty(date, time, self.capacity)
            });
        }
        Ok(created)
    }

    fn list_now(&self, date: NaiveDate) -> std::result::Result<Vec<Slot>, LedgerError> {
        let slots = self.lock()?;
        Ok(slots
            .range((date, NaiveTime::MIN)..)
            .take_while(|((slot_date, _), _)| *slot_date == date)
            .map(|(_, slot)| *slot)
            .collect())
    }

    fn purge_now(&self, date: NaiveDate) -> std::result::Result<u64, LedgerError> {
        let mut slots = self.lock()?;
        let kept = slots.split_off(&(date, NaiveTime::MIN));
        let purged = u64::try_from(slots.len()).unwrap_or(u64::MAX);
        *slots = kept;
        Ok(purged)
    }

    fn set_occupied_now(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        occupied: u32,
    ) -> std::result::Result<Slot, LedgerError> {
        let mut slots = self.lock()?;
        let slot = slots
            .entry((date, time))
            .or_insert_with(|| Slot::empty(date, time, self.capacity));
        slot.occupied = occupied.min(slot.capacity);
        Ok(*slot)
    }
}

impl SlotLedger for InMemorySlotLedger {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn get(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, std::result::Result<Option<Slot>, LedgerError>> {
        let result = self.lock().map(|slots| slots.get(&(date, time)).copied());
        Box::pin(future::ready(result))
    }

    fn upsert_increment(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, std::result::Result<Slot, LedgerError>> {
        Box::pin(future::ready(self.upsert_increment_now(date, time)))
    }

    fn decrement(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, std::result::Result<Option<Slot>, LedgerError>> {
        Box::pin(future::ready(self.decrement_now(date, time)))
    }

    fn materialize<'a>(
        &'a self,
        date: NaiveDate,
        times: &'a [NaiveTime],
    ) -> BoxFuture<'a, std::result::Result<usize, LedgerError>> {
        Box::pin(future::ready(self.materialize_now(date, times)))
    }

    fn list_for_date(&self, date: NaiveDate) -> BoxFuture<'_, std::result::Result<Vec<Slot>, LedgerError>> {
        Box::pin(future::ready(self.list_now(date)))
    }

    fn purge_before(&self, date: NaiveDate) -> BoxFuture<'_, std::result::Result<u64, LedgerError>> {
        Box::pin(future::ready(self.purge_now(date)))
    }

    fn set_occupied(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        occupied: u32,
    ) -> BoxFuture<'_, std::result::Result<Slot, LedgerError>> {
        Box::pin(future::ready(self.set_occupied_now(date, time, occupied)))
    }
}

/// Booking repository backed by a hash map. Ids start at 1.
#[derive(Debug, Clone)]
pub struct InMemoryBookingRepository {
    bookings: Arc<Mutex<HashMap<BookingId, Booking>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryBookingRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bookings: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<BookingId, Booking>>> {
        self.bookings
            .lock()
            .map_err(|_| BookingError::Persistence("booking store lock poisoned".to_string()))
    }

    fn select(&self, keep: impl Fn(&Booking) -> bool) -> Result<Vec<Booking>> {
        let bookings = self.lock()?;
        let mut selected: Vec<Booking> = bookings.values().filter(|b| keep(b)).cloned().collect();
        selected.sort_by_key(|booking| booking.id);
        Ok(selected)
    }

    fn insert_now(&self, draft: BookingDraft) -> Result<Booking> {
        let mut bookings = self.lock()?;
        let id = BookingId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let booking = draft.with_id(id);
        bookings.insert(id, booking.clone());
        Ok(booking)
    }

    fn update_now(&self, booking: Booking, expected: BookingStatus) -> Result<()> {
        let mut bookings = self.lock()?;
        let stored = bookings
            .get_mut(&booking.id)
            .ok_or(BookingError::NotFound(booking.id))?;
        if stored.status != expected {
            return Err(BookingError::InvalidTransition {
                from: stored.status,
                to: booking.status,
            });
        }
        *stored = booking;
        Ok(())
    }
}

impl Default for InMemoryBookingRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingRepository for InMemoryBookingRepository {
    fn insert(&self, draft: BookingDraft) -> BoxFuture<'_, Result<Booking>> {
        Box::pin(future::ready(self.insert_now(draft)))
    }

    fn update(&self, booking: Booking, expected: BookingStatus) -> BoxFuture<'_, Result<()>> {
        Box::pin(future::ready(self.update_now(booking, expected)))
    }

    fn find(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>>> {
        let result = self.lock().map(|bookings| bookings.get(&id).cloned());
        Box::pin(future::ready(result))
    }

    fn list_for_user(&self, user_id: UserId) -> BoxFuture<'_, Result<Vec<Booking>>> {
        let result = self.select(|b| b.user_id == user_id).map(|mut bookings| {
            bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            bookings
        });
        Box::pin(future::ready(result))
    }

    fn list_for_date(&self, date: NaiveDate) -> BoxFuture<'_, Result<Vec<Booking>>> {
        Box::pin(future::ready(self.select(|b| b.date == date)))
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<Booking>>> {
        Box::pin(future::ready(self.select(|_| true)))
    }
}
