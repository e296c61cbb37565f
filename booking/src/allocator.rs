//! Slot allocator.
//!
//! Business-facing availability and reservation API on top of a
//! [`SlotLedger`]. Read operations never write: slots are only created by
//! [`SlotAllocator::ensure_materialized`] (directly or through the range
//! initializers) and by the first reservation of a key.

use crate::config::BookingConfig;
use crate::error::{LedgerError, Result};
use crate::providers::SlotLedger;
use crate::state::{Slot, SlotView};
use carwash_core::environment::Clock;
use chrono::{Days, NaiveDate, NaiveTime};
use std::sync::Arc;

/// Availability, reservation and provisioning of booking slots.
#[derive(Clone)]
pub struct SlotAllocator {
    ledger: Arc<dyn SlotLedger>,
    config: Arc<BookingConfig>,
    clock: Arc<dyn Clock>,
}

impl SlotAllocator {
    /// Create an allocator over a ledger.
    #[must_use]
    pub fn new(ledger: Arc<dyn SlotLedger>, config: Arc<BookingConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            config,
            clock,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// Whether the slot can take another booking. An absent slot is available.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn is_available(&self, date: NaiveDate, time: NaiveTime) -> Result<bool> {
        let slot = self.ledger.get(date, time).await?;
        Ok(slot.is_none_or(|slot| slot.is_available()))
    }

    /// Take one unit of capacity.
    ///
    /// Returns `false` when the slot is full; a full slot is an expected
    /// outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn reserve(&self, date: NaiveDate, time: NaiveTime) -> Result<bool> {
        match self.ledger.upsert_increment(date, time).await {
            Ok(slot) => {
                tracing::debug!(occupied = slot.occupied, capacity = slot.capacity, "Slot reserved");
                metrics::counter!("booking.slot.reserved").increment(1);
                Ok(true)
            },
            Err(LedgerError::SlotFull { .. }) => {
                tracing::debug!("Slot full");
                metrics::counter!("booking.slot.rejected").increment(1);
                Ok(false)
            },
            Err(error) => Err(error.into()),
        }
    }

    /// Give back one unit of capacity. Returns whether anything was released.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn release(&self, date: NaiveDate, time: NaiveTime) -> Result<bool> {
        let released = self.ledger.decrement(date, time).await?.is_some();
        if released {
            metrics::counter!("booking.slot.released").increment(1);
        } else {
            tracing::debug!("Release on empty or absent slot ignored");
        }
        Ok(released)
    }

    /// Create empty slots for every canonical time on `date`.
    ///
    /// Returns how many slots were created.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn ensure_materialized(&self, date: NaiveDate) -> Result<usize> {
        Ok(self.ledger.materialize(date, &self.config.slot_times).await?)
    }

    /// Canonical times on `date` that can take another booking, in order.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn available_times(&self, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        self.ensure_materialized(date).await?;
        let slots = self.ledger.list_for_date(date).await?;

        Ok(self
            .config
            .slot_times
            .iter()
            .copied()
            .filter(|time| {
                slots
                    .iter()
                    .find(|slot| slot.time == *time)
                    .is_none_or(Slot::is_available)
            })
            .collect())
    }

    /// Occupancy of every slot on `date`, ordered by time.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn slot_snapshot(&self, date: NaiveDate) -> Result<Vec<SlotView>> {
        self.ensure_materialized(date).await?;
        let slots = self.ledger.list_for_date(date).await?;
        Ok(slots.iter().map(SlotView::from).collect())
    }

    /// Materialize canonical slots for each date in `start..=end`.
    ///
    /// Does nothing when `end` is before `start`. Returns how many slots
    /// were created.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    #[tracing::instrument(skip(self))]
    pub async fn initialize_range(&self, start: NaiveDate, end: NaiveDate) -> Result<usize> {
        let mut created = 0;
        for date in start.iter_days().take_while(|date| *date <= end) {
            created += self.ensure_materialized(date).await?;
        }
        tracing::info!(created, "Slots initialized");
        Ok(created)
    }

    /// Materialize canonical slots for today and the following `days` days.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn initialize_next_days(&self, days: u32) -> Result<usize> {
        let start = self.clock.today();
        let end = start
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        self.initialize_range(start, end).await
    }

    /// Delete slots strictly before `date`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    #[tracing::instrument(skip(self))]
    pub async fn purge_before(&self, date: NaiveDate) -> Result<u64> {
        let purged = self.ledger.purge_before(date).await?;
        tracing::info!(purged, "Old slots purged");
        Ok(purged)
    }

    /// Number of stored slots on `date` with spare capacity.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn count_available(&self, date: NaiveDate) -> Result<usize> {
        let slots = self.ledger.list_for_date(date).await?;
        Ok(slots.iter().filter(|slot| slot.is_available()).count())
    }

    /// Overwrite occupancy of one slot (reconciliation only).
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn overwrite_occupancy(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        occupied: u32,
    ) -> Result<Slot> {
        Ok(self.ledger.set_occupied(date, time, occupied).await?)
    }

    /// Stored slots on `date`, ordered by time, without materializing.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Storage` if the ledger fails.
    pub async fn stored_slots(&self, date: NaiveDate) -> Result<Vec<Slot>> {
        Ok(self.ledger.list_for_date(date).await?)
    }
}
