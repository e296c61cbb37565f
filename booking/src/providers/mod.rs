//! Booking providers.
//!
//! Traits for the collaborators the lifecycle depends on. Reducers and the
//! allocator only see these traits; concrete backends live in
//! [`crate::stores`] and [`crate::mocks`].
//!
//! ```text
//! ┌────────────────┐  reserve/release  ┌───────────────┐
//! │ BookingReducer │ ────────────────▶ │ SlotAllocator │ ──▶ SlotLedger
//! │  (lifecycle)   │                   └───────────────┘
//! │                │  insert/update    ┌───────────────────┐
//! │                │ ────────────────▶ │ BookingRepository │
//! └────────────────┘                   └───────────────────┘
//!         ▲
//!         │ on_payment_verified
//! ┌─────────────────────┐
//! │ PaymentStatusBridge │
//! └─────────────────────┘
//! ```
//!
//! Methods return boxed futures so backends can be injected as trait
//! objects (`Arc<dyn SlotLedger>`).

pub mod bridge;
pub mod ledger;
pub mod repository;

pub use bridge::PaymentStatusBridge;
pub use ledger::SlotLedger;
pub use repository::BookingRepository;
