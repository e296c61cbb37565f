//! Domain types and the lifecycle store state.

use crate::error::BookingError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw id.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// The raw id.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Booking identifier, issued by the booking repository.
    BookingId
);
numeric_id!(
    /// Owning user.
    UserId
);
numeric_id!(
    /// Wash service (package) reference.
    ServiceId
);

/// Correlates a command with the outcome action it eventually produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Status, method, role
// ═══════════════════════════════════════════════════════════════════════

/// Booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Created, awaiting payment or admin confirmation.
    Pending,
    /// Confirmed, waiting for the appointment.
    Confirmed,
    /// The wash is under way.
    InProgress,
    /// Finished.
    Completed,
    /// Cancelled (terminal).
    Cancelled,
}

impl BookingStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Storage form (`PENDING`, `IN_PROGRESS`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// The single forward step from this status, if any.
    ///
    /// Cancellation is not a forward step; it has its own transition.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::InProgress),
            Self::InProgress => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    /// Whether a booking in this status may be cancelled.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        match self {
            Self::Pending | Self::Confirmed => true,
            Self::InProgress | Self::Completed | Self::Cancelled => false,
        }
    }

    /// Whether a booking in this status still counts against slot capacity.
    #[must_use]
    pub const fn holds_capacity(self) -> bool {
        match self {
            Self::Pending | Self::Confirmed | Self::InProgress | Self::Completed => true,
            Self::Cancelled => false,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown booking status: {s}"))
    }
}

/// How the booking was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingMethod {
    /// Scheduled by the customer ahead of time.
    #[default]
    Booking,
    /// Registered at the counter by staff.
    #[serde(rename = "WALKIN")]
    WalkIn,
}

impl BookingMethod {
    /// Storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booking => "BOOKING",
            Self::WalkIn => "WALKIN",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Booking => "Booking",
            Self::WalkIn => "Walk-in",
        }
    }
}

impl FromStr for BookingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOOKING" => Ok(Self::Booking),
            "WALKIN" => Ok(Self::WalkIn),
            other => Err(format!("unknown booking method: {other}")),
        }
    }
}

/// Role of the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Books and cancels their own appointments.
    Customer,
    /// Runs the wash bay: walk-ins, start, complete.
    Employee,
    /// Full control.
    Admin,
}

/// The user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Acting user.
    pub user_id: UserId,
    /// Their role.
    pub role: Role,
}

impl Actor {
    /// A customer.
    #[must_use]
    pub const fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    /// An employee.
    #[must_use]
    pub const fn employee(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Employee,
        }
    }

    /// An admin.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    /// Whether the actor may cancel a booking owned by `owner`.
    ///
    /// Owners and admins may; staff only cancel their own bookings.
    #[must_use]
    pub fn may_cancel_for(&self, owner: UserId) -> bool {
        match self.role {
            Role::Customer | Role::Employee => self.user_id == owner,
            Role::Admin => true,
        }
    }

    /// Whether the actor may move bookings forward (confirm, start, complete).
    #[must_use]
    pub const fn may_advance(&self) -> bool {
        match self.role {
            Role::Customer => false,
            Role::Employee | Role::Admin => true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Bookings
// ═══════════════════════════════════════════════════════════════════════

/// Optional vehicle descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDetails {
    /// Car, motorcycle, ...
    pub vehicle_type: Option<String>,
    /// Manufacturer.
    pub brand: Option<String>,
    /// Model.
    pub model: Option<String>,
    /// License plate.
    pub license_plate: Option<String>,
    /// Color.
    pub color: Option<String>,
}

impl VehicleDetails {
    /// Brand and model joined by a space, blank parts skipped.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.brand.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// A request to create a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Owning user.
    pub user_id: UserId,
    /// Requested service.
    pub service_id: ServiceId,
    /// Appointment date.
    pub date: NaiveDate,
    /// Appointment time.
    pub time: NaiveTime,
    /// Scheduled booking or walk-in.
    pub method: BookingMethod,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Staff member registering a walk-in.
    pub created_by: Option<String>,
    /// Vehicle descriptor.
    pub vehicle: VehicleDetails,
}

impl BookingRequest {
    /// A scheduled booking request without notes or vehicle details.
    #[must_use]
    pub fn new(user_id: UserId, service_id: ServiceId, date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            user_id,
            service_id,
            date,
            time,
            method: BookingMethod::Booking,
            notes: None,
            created_by: None,
            vehicle: VehicleDetails::default(),
        }
    }

    /// Attach notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Attach vehicle details.
    #[must_use]
    pub fn with_vehicle(mut self, vehicle: VehicleDetails) -> Self {
        self.vehicle = vehicle;
        self
    }

    /// Turn into a walk-in registered by `employee_name`.
    #[must_use]
    pub fn walk_in(mut self, employee_name: impl Into<String>) -> Self {
        self.method = BookingMethod::WalkIn;
        self.created_by = Some(employee_name.into());
        self
    }

    /// Status a booking created from this request starts in.
    #[must_use]
    pub const fn initial_status(&self) -> BookingStatus {
        match self.method {
            BookingMethod::Booking => BookingStatus::Pending,
            BookingMethod::WalkIn => BookingStatus::Confirmed,
        }
    }

    /// Notes as stored on the booking (walk-ins record who created them).
    #[must_use]
    pub fn stored_notes(&self) -> Option<String> {
        match (self.method, &self.created_by) {
            (BookingMethod::WalkIn, Some(employee)) => Some(match &self.notes {
                Some(notes) => format!("{notes} (Created by: {employee})"),
                None => format!("Created by: {employee}"),
            }),
            _ => self.notes.clone(),
        }
    }

    /// Build the unsaved booking record.
    #[must_use]
    pub fn into_draft(self, created_at: DateTime<Utc>) -> BookingDraft {
        BookingDraft {
            status: self.initial_status(),
            notes: self.stored_notes(),
            user_id: self.user_id,
            service_id: self.service_id,
            date: self.date,
            time: self.time,
            method: self.method,
            vehicle: self.vehicle,
            created_at,
        }
    }
}

/// A booking record before the repository assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDraft {
    /// Owning user.
    pub user_id: UserId,
    /// Service.
    pub service_id: ServiceId,
    /// Appointment date.
    pub date: NaiveDate,
    /// Appointment time.
    pub time: NaiveTime,
    /// Initial status.
    pub status: BookingStatus,
    /// Creation method.
    pub method: BookingMethod,
    /// Notes.
    pub notes: Option<String>,
    /// Vehicle descriptor.
    pub vehicle: VehicleDetails,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl BookingDraft {
    /// Attach the id issued by the repository.
    #[must_use]
    pub fn with_id(self, id: BookingId) -> Booking {
        Booking {
            id,
            user_id: self.user_id,
            service_id: self.service_id,
            date: self.date,
            time: self.time,
            status: self.status,
            method: self.method,
            notes: self.notes,
            vehicle: self.vehicle,
            created_at: self.created_at,
        }
    }
}

/// A booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Identifier.
    pub id: BookingId,
    /// Owning user.
    pub user_id: UserId,
    /// Service.
    pub service_id: ServiceId,
    /// Appointment date.
    pub date: NaiveDate,
    /// Appointment time.
    pub time: NaiveTime,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Creation method.
    pub method: BookingMethod,
    /// Notes, newline separated when appended to.
    pub notes: Option<String>,
    /// Vehicle descriptor.
    pub vehicle: VehicleDetails,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Year-prefixed human reference, e.g. `CW-2025-00042`.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("CW-{:04}-{:05}", self.created_at.year(), self.id.get())
    }

    /// Brand and model of the vehicle, if known.
    #[must_use]
    pub fn vehicle_display_name(&self) -> Option<String> {
        self.vehicle.display_name()
    }

    /// Completed bookings may be reviewed.
    #[must_use]
    pub const fn is_reviewable(&self) -> bool {
        matches!(self.status, BookingStatus::Completed)
    }

    /// Whether the booking may still be cancelled on `today`.
    ///
    /// Pending and confirmed bookings whose date has not passed.
    #[must_use]
    pub fn can_be_cancelled(&self, today: NaiveDate) -> bool {
        self.status.is_cancellable() && self.date >= today
    }

    /// Append a line to the notes.
    pub fn append_note(&mut self, line: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{line}"),
            _ => line.to_string(),
        });
    }
}

/// Booking counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStats {
    /// All bookings.
    pub total: usize,
    /// Pending.
    pub pending: usize,
    /// Confirmed.
    pub confirmed: usize,
    /// In progress.
    pub in_progress: usize,
    /// Completed.
    pub completed: usize,
    /// Cancelled.
    pub cancelled: usize,
}

impl BookingStats {
    /// Count bookings by status.
    pub fn from_bookings<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        bookings
            .into_iter()
            .fold(Self::default(), |mut stats, booking| {
                stats.total += 1;
                match booking.status {
                    BookingStatus::Pending => stats.pending += 1,
                    BookingStatus::Confirmed => stats.confirmed += 1,
                    BookingStatus::InProgress => stats.in_progress += 1,
                    BookingStatus::Completed => stats.completed += 1,
                    BookingStatus::Cancelled => stats.cancelled += 1,
                }
                stats
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Slots
// ═══════════════════════════════════════════════════════════════════════

/// Occupancy of one `(date, time)` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot date.
    pub date: NaiveDate,
    /// Slot time.
    pub time: NaiveTime,
    /// Bookings holding capacity.
    pub occupied: u32,
    /// Maximum concurrent bookings.
    pub capacity: u32,
}

impl Slot {
    /// A slot with nothing booked.
    #[must_use]
    pub const fn empty(date: NaiveDate, time: NaiveTime, capacity: u32) -> Self {
        Self {
            date,
            time,
            occupied: 0,
            capacity,
        }
    }

    /// Whether another booking fits.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.occupied < self.capacity
    }

    /// Remaining capacity.
    #[must_use]
    pub const fn available_spots(&self) -> u32 {
        self.capacity.saturating_sub(self.occupied)
    }

    /// Occupancy as a percentage of capacity.
    #[must_use]
    pub fn occupancy_rate(&self) -> f64 {
        if self.capacity == 0 {
            return 100.0;
        }
        f64::from(self.occupied) * 100.0 / f64::from(self.capacity)
    }
}

/// Presentation row for a slot board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    /// Time of day.
    pub time: NaiveTime,
    /// Bookings holding capacity.
    pub occupied: u32,
    /// Maximum concurrent bookings.
    pub capacity: u32,
}

impl From<&Slot> for SlotView {
    fn from(slot: &Slot) -> Self {
        Self {
            time: slot.time,
            occupied: slot.occupied,
            capacity: slot.capacity,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Store state
// ═══════════════════════════════════════════════════════════════════════

/// State owned by the lifecycle store.
///
/// Bookings themselves are not held here: the repository is the only record
/// of a booking, and every transition reads it afresh.
#[derive(Debug, Clone, Default)]
pub struct BookingState {
    /// Requests that have passed the store and await their outcome.
    pub in_flight: HashSet<RequestId>,
    /// Last error produced by the reducer.
    pub last_error: Option<BookingError>,
}
