//! `PostgreSQL` slot ledger.
//!
//! Increment and decrement are each one conditional statement, so the row
//! lock taken by the update is the only synchronization needed.

use crate::error::LedgerError;
use crate::providers::SlotLedger;
use crate::state::Slot;
use chrono::{NaiveDate, NaiveTime};
use futures::future::BoxFuture;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Slot ledger stored in the `booking_slots` table.
#[derive(Clone)]
pub struct PostgresSlotLedger {
    pool: PgPool,
    capacity: u32,
}

fn storage(error: &sqlx::Error) -> LedgerError {
    LedgerError::Storage(error.to_string())
}

fn to_db(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn row_to_slot(row: &PgRow) -> Result<Slot, LedgerError> {
    let occupied: i32 = row.try_get("occupied").map_err(|e| storage(&e))?;
    let capacity: i32 = row.try_get("capacity").map_err(|e| storage(&e))?;
    Ok(Slot {
        date: row.try_get("slot_date").map_err(|e| storage(&e))?,
        time: row.try_get("slot_time").map_err(|e| storage(&e))?,
        occupied: u32::try_from(occupied).unwrap_or(0),
        capacity: u32::try_from(capacity).unwrap_or(0),
    })
}

impl PostgresSlotLedger {
    /// Create a ledger whose new slots hold `capacity` bookings.
    #[must_use]
    pub const fn new(pool: PgPool, capacity: u32) -> Self {
        Self { pool, capacity }
    }

    async fn fetch(&self, date: NaiveDate, time: NaiveTime) -> Result<Option<Slot>, LedgerError> {
        let row = sqlx::query(
            r"
            SELECT slot_date, slot_time, occupied, capacity
            FROM booking_slots
            WHERE slot_date = $1 AND slot_time = $2
            ",
        )
        .bind(date)
        .bind(time)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage(&e))?;

        row.as_ref().map(row_to_slot).transpose()
    }

    async fn increment(&self, date: NaiveDate, time: NaiveTime) -> Result<Slot, LedgerError> {
        if self.capacity == 0 {
            return Err(LedgerError::SlotFull {
                date,
                time,
                capacity: 0,
            });
        }

        // No row back means the conflicting row was already full.
        let row = sqlx::query(
            r"
            INSERT INTO booking_slots (slot_date, slot_time, occupied, capacity)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (slot_date, slot_time) DO UPDATE
                SET occupied = booking_slots.occupied + 1
                WHERE booking_slots.occupied < booking_slots.capacity
            RETURNING slot_date, slot_time, occupied, capacity
            ",
        )
        .bind(date)
        .bind(time)
        .bind(to_db(self.capacity))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage(&e))?;

        match row {
            Some(row) => row_to_slot(&row),
            None => {
                let capacity = self
                    .fetch(date, time)
                    .await?
                    .map_or(self.capacity, |slot| slot.capacity);
                Err(LedgerError::SlotFull {
                    date,
                    time,
                    capacity,
                })
            },
        }
    }

    async fn decrement_row(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Slot>, LedgerError> {
        let row = sqlx::query(
            r"
            UPDATE booking_slots
            SET occupied = occupied - 1
            WHERE slot_date = $1 AND slot_time = $2 AND occupied > 0
            RETURNING slot_date, slot_time, occupied, capacity
            ",
        )
        .bind(date)
        .bind(time)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage(&e))?;

        row.as_ref().map(row_to_slot).transpose()
    }

    async fn materialize_rows(
        &self,
        date: NaiveDate,
        times: &[NaiveTime],
    ) -> Result<usize, LedgerError> {
        let result = sqlx::query(
            r"
            INSERT INTO booking_slots (slot_date, slot_time, occupied, capacity)
            SELECT $1, t, 0, $2 FROM UNNEST($3::time[]) AS t
            ON CONFLICT (slot_date, slot_time) DO NOTHING
            ",
        )
        .bind(date)
        .bind(to_db(self.capacity))
        .bind(times.to_vec())
        .execute(&self.pool)
        .await
        .map_err(|e| storage(&e))?;

        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }

    async fn list_rows(&self, date: NaiveDate) -> Result<Vec<Slot>, LedgerError> {
        let rows = sqlx::query(
            r"
            SELECT slot_date, slot_time, occupied, capacity
            FROM booking_slots
            WHERE slot_date = $1
            ORDER BY slot_time ASC
            ",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage(&e))?;

        rows.iter().map(row_to_slot).collect()
    }

    async fn purge_rows(&self, date: NaiveDate) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM booking_slots WHERE slot_date < $1")
            .bind(date)
            .execute(&self.pool)
            .await
            .map_err(|e| storage(&e))?;
        Ok(result.rows_affected())
    }

    async fn overwrite(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        occupied: u32,
    ) -> Result<Slot, LedgerError> {
        let row = sqlx::query(
            r"
            INSERT INTO booking_slots (slot_date, slot_time, occupied, capacity)
            VALUES ($1, $2, LEAST($3, $4), $4)
            ON CONFLICT (slot_date, slot_time) DO UPDATE
                SET occupied = LEAST($3, booking_slots.capacity)
            RETURNING slot_date, slot_time, occupied, capacity
            ",
        )
        .bind(date)
        .bind(time)
        .bind(to_db(occupied))
        .bind(to_db(self.capacity))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage(&e))?;

        row_to_slot(&row)
    }
}

impl SlotLedger for PostgresSlotLedger {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn get(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, Result<Option<Slot>, LedgerError>> {
        Box::pin(self.fetch(date, time))
    }

    fn upsert_increment(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, Result<Slot, LedgerError>> {
        Box::pin(self.increment(date, time))
    }

    fn decrement(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BoxFuture<'_, Result<Option<Slot>, LedgerError>> {
        Box::pin(self.decrement_row(date, time))
    }

    fn materialize<'a>(
        &'a self,
        date: NaiveDate,
        times: &'a [NaiveTime],
    ) -> BoxFuture<'a, Result<usize, LedgerError>> {
        Box::pin(self.materialize_rows(date, times))
    }

    fn list_for_date(&self, date: NaiveDate) -> BoxFuture<'_, Result<Vec<Slot>, LedgerError>> {
        Box::pin(self.list_rows(date))
    }

    fn purge_before(&self, date: NaiveDate) -> BoxFuture<'_, Result<u64, LedgerError>> {
        Box::pin(self.purge_rows(date))
    }

    fn set_occupied(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        occupied: u32,
    ) -> BoxFuture<'_, Result<Slot, LedgerError>> {
        Box::pin(self.overwrite(date, time, occupied))
    }
}
