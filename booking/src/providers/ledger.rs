//! Slot ledger trait.

use crate::error::LedgerError;
use crate::state::Slot;
use chrono::{NaiveDate, NaiveTime};
use futures::future::BoxFuture;

/// Durable occupancy counters keyed by `(date, time)`.
///
/// # Atomicity
///
/// `upsert_increment` and `decrement` must each be a single atomic
/// read-modify-write against one key: a conditional update in a database,
/// or a lock held only for the duration of the change in memory. For one
/// key, successful increments and decrements are linearizable, so two
/// concurrent increments can never both take the last unit of capacity.
pub trait SlotLedger: Send + Sync {
    /// Capacity given to slots this ledger creates.
    fn capacity(&self) -> u32;

    /// Current state of a slot, `None` when it was never materialized.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the backend fails.
    fn get(&self, date: NaiveDate, time: NaiveTime)
    -> BoxFuture<'_, Result<Option<Slot>, LedgerError>>;

    /// Create the slot if absent, then take one unit of capacity.
    ///
    /// # Errors
    ///
    /// - `LedgerError::SlotFull` if the slot was already at capacity
    ///   (nothing is changed)
    /// - `LedgerError::Storage` if the backend fails
    fn upsert_increment(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, Result<Slot, LedgerError>>;

    /// Give back one unit of capacity.
    ///
    /// Returns `None` without changing anything when the slot is absent or
    /// already empty, so repeated releases are harmless.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the backend fails.
    fn decrement(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, Result<Option<Slot>, LedgerError>>;

    /// Insert empty slots for every missing `(date, time)`.
    ///
    /// Existing slots are left untouched. Returns how many were created.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the backend fails.
    fn materialize<'a>(
        &'a self,
        date: NaiveDate,
        times: &'a [NaiveTime],
    ) -> BoxFuture<'a, Result<usize, LedgerError>>;

    /// Every stored slot for a date, ordered by time.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the backend fails.
    fn list_for_date(&self, date: NaiveDate) -> BoxFuture<'_, Result<Vec<Slot>, LedgerError>>;

    /// Delete every slot strictly before `date`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the backend fails.
    fn purge_before(&self, date: NaiveDate) -> BoxFuture<'_, Result<u64, LedgerError>>;

    /// Overwrite a slot's occupancy, clamped to `[0, capacity]`.
    ///
    /// Only used by reconciliation; normal traffic goes through
    /// `upsert_increment` and `decrement`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the backend fails.
    fn set_occupied(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        occupied: u32,
    ) -> BoxFuture<'_, Result<Slot, LedgerError>>;
}
