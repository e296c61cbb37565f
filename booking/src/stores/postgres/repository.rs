//! `PostgreSQL` booking repository.

use crate::error::{BookingError, Result};
use crate::providers::BookingRepository;
use crate::state::{
    Booking, BookingDraft, BookingId, BookingMethod, BookingStatus, ServiceId, UserId,
    VehicleDetails,
};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const COLUMNS: &str = "id, user_id, service_id, booking_date, booking_time, status, method, \
     notes, vehicle_type, vehicle_brand, vehicle_model, license_plate, vehicle_color, created_at";

/// Booking records stored in the `bookings` table.
#[derive(Clone)]
pub struct PostgresBookingRepository {
    pool: PgPool,
}

fn persistence(error: impl std::fmt::Display) -> BookingError {
    BookingError::Persistence(error.to_string())
}

fn to_db(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(persistence)
}

fn from_db(id: i64) -> Result<u64> {
    u64::try_from(id).map_err(persistence)
}

fn row_to_booking(row: &PgRow) -> Result<Booking> {
    let status: String = row.try_get("status").map_err(persistence)?;
    let method: String = row.try_get("method").map_err(persistence)?;

    Ok(Booking {
        id: BookingId::new(from_db(row.try_get("id").map_err(persistence)?)?),
        user_id: UserId::new(from_db(row.try_get("user_id").map_err(persistence)?)?),
        service_id: ServiceId::new(from_db(row.try_get("service_id").map_err(persistence)?)?),
        date: row.try_get("booking_date").map_err(persistence)?,
        time: row.try_get("booking_time").map_err(persistence)?,
        status: status.parse::<BookingStatus>().map_err(persistence)?,
        method: method.parse::<BookingMethod>().map_err(persistence)?,
        notes: row.try_get("notes").map_err(persistence)?,
        vehicle: VehicleDetails {
            vehicle_type: row.try_get("vehicle_type").map_err(persistence)?,
            brand: row.try_get("vehicle_brand").map_err(persistence)?,
            model: row.try_get("vehicle_model").map_err(persistence)?,
            license_plate: row.try_get("license_plate").map_err(persistence)?,
            color: row.try_get("vehicle_color").map_err(persistence)?,
        },
        created_at: row.try_get("created_at").map_err(persistence)?,
    })
}

impl PostgresBookingRepository {
    /// Create a repository over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_row(&self, draft: BookingDraft) -> Result<Booking> {
        let row = sqlx::query(
            r"
            INSERT INTO bookings (
                user_id, service_id, booking_date, booking_time, status, method, notes,
                vehicle_type, vehicle_brand, vehicle_model, license_plate, vehicle_color,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            ",
        )
        .bind(to_db(draft.user_id.get())?)
        .bind(to_db(draft.service_id.get())?)
        .bind(draft.date)
        .bind(draft.time)
        .bind(draft.status.as_str())
        .bind(draft.method.as_str())
        .bind(draft.notes.as_deref())
        .bind(draft.vehicle.vehicle_type.as_deref())
        .bind(draft.vehicle.brand.as_deref())
        .bind(draft.vehicle.model.as_deref())
        .bind(draft.vehicle.license_plate.as_deref())
        .bind(draft.vehicle.color.as_deref())
        .bind(draft.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(persistence)?;

        let id: i64 = row.try_get("id").map_err(persistence)?;
        Ok(draft.with_id(BookingId::new(from_db(id)?)))
    }

    async fn update_row(&self, booking: Booking, expected: BookingStatus) -> Result<()> {
        let id = to_db(booking.id.get())?;
        let result = sqlx::query(
            "UPDATE bookings SET status = $1, notes = $2 WHERE id = $3 AND status = $4",
        )
        .bind(booking.status.as_str())
        .bind(booking.notes.as_deref())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing matched: tell a missing row from a status that moved on.
        let current: Option<String> = sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?;
        match current {
            None => Err(BookingError::NotFound(booking.id)),
            Some(status) => Err(BookingError::InvalidTransition {
                from: status.parse::<BookingStatus>().map_err(persistence)?,
                to: booking.status,
            }),
        }
    }

    async fn find_row(&self, id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM bookings WHERE id = $1"))
            .bind(to_db(id.get())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?;

        row.as_ref().map(row_to_booking).transpose()
    }

    async fn select(&self, filter: &str, bind: Option<Filter>) -> Result<Vec<Booking>> {
        let sql = format!("SELECT {COLUMNS} FROM bookings {filter}");
        let query = sqlx::query(&sql);
        let query = match bind {
            Some(Filter::User(user_id)) => query.bind(to_db(user_id.get())?),
            Some(Filter::Date(date)) => query.bind(date),
            None => query,
        };

        let rows = query.fetch_all(&self.pool).await.map_err(persistence)?;
        rows.iter().map(row_to_booking).collect()
    }
}

enum Filter {
    User(UserId),
    Date(NaiveDate),
}

impl BookingRepository for PostgresBookingRepository {
    fn insert(&self, draft: BookingDraft) -> BoxFuture<'_, Result<Booking>> {
        Box::pin(self.insert_row(draft))
    }

    fn update(&self, booking: Booking, expected: BookingStatus) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.update_row(booking, expected))
    }

    fn find(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>>> {
        Box::pin(self.find_row(id))
    }

    fn list_for_user(&self, user_id: UserId) -> BoxFuture<'_, Result<Vec<Booking>>> {
        Box::pin(self.select(
            "WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            Some(Filter::User(user_id)),
        ))
    }

    fn list_for_date(&self, date: NaiveDate) -> BoxFuture<'_, Result<Vec<Booking>>> {
        Box::pin(self.select(
            "WHERE booking_date = $1 ORDER BY id ASC",
            Some(Filter::Date(date)),
        ))
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<Booking>>> {
        Box::pin(self.select("ORDER BY id ASC", None))
    }
}
