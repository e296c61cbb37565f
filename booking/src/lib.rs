//! # Carwash Booking
//!
//! Booking-slot capacity allocation and the booking status lifecycle for a
//! car-wash appointment platform.
//!
//! ## Architecture
//!
//! - **Slot Ledger** ([`providers::SlotLedger`]): per `(date, time)` occupancy
//!   counters with atomic increment and decrement
//! - **Slot Allocator** ([`SlotAllocator`]): availability, reserve, release and
//!   explicit slot materialization on top of the ledger
//! - **Booking Lifecycle** ([`reducers::BookingReducer`]): the status state
//!   machine and its coupling to reservations, executed by a
//!   [`carwash_runtime::Store`]
//! - **Payment-Status Bridge** ([`providers::PaymentStatusBridge`]): payment
//!   verification outcomes driving confirmation
//! - **Payment Desk** ([`PaymentDesk`]): per-booking payment records and the
//!   method-specific verification rules
//! - **Service** ([`BookingService`]): the request/response facade
//!
//! ## Example
//!
//! ```no_run
//! use carwash_booking::{BookingConfig, BookingRequest, BookingService, ServiceId, UserId};
//! use carwash_core::environment::SystemClock;
//! use chrono::{NaiveDate, NaiveTime};
//! use std::sync::Arc;
//!
//! # async fn example() -> carwash_booking::Result<()> {
//! let service = BookingService::in_memory(BookingConfig::default(), Arc::new(SystemClock));
//!
//! let date = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap_or_default();
//! let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
//! let booking = service
//!     .create_booking(BookingRequest::new(UserId::new(1), ServiceId::new(3), date, time))
//!     .await?;
//!
//! println!("{} is {}", booking.reference(), booking.status);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod actions;
pub mod allocator;
pub mod config;
pub mod environment;
pub mod error;
pub mod payment;
pub mod providers;
pub mod reducers;
pub mod service;
pub mod state;
pub mod stores;

// Mock implementations for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::{BookingAction, Transition};
pub use allocator::SlotAllocator;
pub use config::{BookingConfig, BusinessHours};
pub use environment::BookingEnvironment;
pub use error::{BookingError, LedgerError, Result};
pub use payment::{
    PaymentDesk, PaymentMethod, PaymentOutcome, PaymentRecord, PaymentStats, PaymentStatus,
};
pub use service::BookingService;
pub use state::{
    Actor, Booking, BookingId, BookingMethod, BookingRequest, BookingState, BookingStats,
    BookingStatus, RequestId, Role, ServiceId, Slot, SlotView, UserId, VehicleDetails,
};
