//! Booking reducers.
//!
//! The lifecycle reducer owns booking status. It validates creation requests
//! up front, decides status changes on the booking as read from the
//! repository, and returns effects that talk to the allocator and repository.
//! Every effect ends in an outcome action carrying the command's correlation id.

pub mod lifecycle;

pub use lifecycle::BookingReducer;
