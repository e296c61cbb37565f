//! `PostgreSQL` backends.
//!
//! # Example
//!
//! ```no_run
//! use carwash_booking::stores::postgres::{migrate, PostgresBookingRepository, PostgresSlotLedger};
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/carwash").await?;
//! migrate(&pool).await?;
//! let ledger = PostgresSlotLedger::new(pool.clone(), 10);
//! let repository = PostgresBookingRepository::new(pool);
//! # Ok(())
//! # }
//! ```

pub mod ledger;
pub mod repository;

pub use ledger::PostgresSlotLedger;
pub use repository::PostgresBookingRepository;

use crate::error::{BookingError, Result};
use sqlx::PgPool;

/// Create or upgrade the `booking_slots` and `bookings` tables.
///
/// # Errors
///
/// Returns `BookingError::Storage` if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| BookingError::Storage(format!("Migration failed: {e}")))?;
    Ok(())
}
