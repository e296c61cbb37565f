//! Storage backends for the slot ledger and booking repository.
//!
//! - [`memory`]: process-local maps, used by default and in tests
//! - `postgres`: `PostgreSQL` tables (feature `postgres`)

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{InMemoryBookingRepository, InMemorySlotLedger};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresBookingRepository, PostgresSlotLedger};
