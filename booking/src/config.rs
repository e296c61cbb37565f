//! Booking configuration.
//!
//! Capacity, the canonical slot times and business hours are injected as a
//! value so tests and deployments can vary them. `from_env` reads overrides
//! from environment variables and falls back to the defaults below.

use chrono::NaiveTime;
use std::env;
use std::time::Duration;

/// Default number of concurrent bookings a slot accepts.
pub const DEFAULT_CAPACITY: u32 = 10;

/// Default number of days pre-provisioned after today by `initialize_next_days`.
pub const DEFAULT_PROVISION_DAYS: u32 = 30;

/// Hours of the canonical slots (midday gap at 12:00).
const DEFAULT_SLOT_HOURS: [u32; 10] = [8, 9, 10, 11, 13, 14, 15, 16, 17, 18];

fn at_hour(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Opening and closing time, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    /// First bookable time.
    pub opening: NaiveTime,
    /// Last bookable time.
    pub closing: NaiveTime,
}

impl BusinessHours {
    /// Create business hours.
    #[must_use]
    pub const fn new(opening: NaiveTime, closing: NaiveTime) -> Self {
        Self { opening, closing }
    }

    /// Whether `time` falls within the hours (inclusive on both ends).
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.opening && time <= self.closing
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self::new(at_hour(8), at_hour(18))
    }
}

/// Configuration for slot allocation and the booking lifecycle.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Concurrent bookings per slot.
    ///
    /// Default: 10
    pub capacity: u32,

    /// Canonical bookable times of day, kept sorted.
    ///
    /// Default: hourly 08:00 to 18:00 without 12:00
    pub slot_times: Vec<NaiveTime>,

    /// Business hours used to validate requested times.
    ///
    /// Default: 08:00 to 18:00
    pub hours: BusinessHours,

    /// Days pre-provisioned after today; today itself is always included.
    ///
    /// Default: 30
    pub provision_days: u32,

    /// How long a request waits for its outcome.
    ///
    /// Default: 5 seconds
    pub request_timeout: Duration,

    /// `PostgreSQL` connection URL, when the database backend is used.
    pub database_url: Option<String>,
}

impl BookingConfig {
    /// Set slot capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Replace the canonical slot times. Duplicates are removed and the list sorted.
    #[must_use]
    pub fn with_slot_times(mut self, mut times: Vec<NaiveTime>) -> Self {
        times.sort_unstable();
        times.dedup();
        self.slot_times = times;
        self
    }

    /// Set business hours.
    #[must_use]
    pub const fn with_business_hours(mut self, hours: BusinessHours) -> Self {
        self.hours = hours;
        self
    }

    /// Set the pre-provisioning horizon.
    #[must_use]
    pub const fn with_provision_days(mut self, days: u32) -> Self {
        self.provision_days = days;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the database URL.
    #[must_use]
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `CARWASH_SLOT_CAPACITY` | bookings per slot |
    /// | `CARWASH_SLOT_TIMES` | comma-separated `HH:MM` list |
    /// | `CARWASH_OPENING_TIME` / `CARWASH_CLOSING_TIME` | `HH:MM` |
    /// | `CARWASH_PROVISION_DAYS` | pre-provisioning horizon |
    /// | `CARWASH_REQUEST_TIMEOUT_MS` | request timeout |
    /// | `DATABASE_URL` | `PostgreSQL` URL |
    ///
    /// Unparseable values are ignored in favor of the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let slot_times = env::var("CARWASH_SLOT_TIMES")
            .ok()
            .map(|raw| raw.split(',').filter_map(parse_time).collect::<Vec<_>>())
            .filter(|times| !times.is_empty())
            .unwrap_or(defaults.slot_times);

        let hours = BusinessHours::new(
            env::var("CARWASH_OPENING_TIME")
                .ok()
                .and_then(|s| parse_time(&s))
                .unwrap_or(defaults.hours.opening),
            env::var("CARWASH_CLOSING_TIME")
                .ok()
                .and_then(|s| parse_time(&s))
                .unwrap_or(defaults.hours.closing),
        );

        Self {
            capacity: env::var("CARWASH_SLOT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.capacity),
            slot_times: Vec::new(),
            hours,
            provision_days: env::var("CARWASH_PROVISION_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.provision_days),
            request_timeout: env::var("CARWASH_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.request_timeout, Duration::from_millis),
            database_url: env::var("DATABASE_URL").ok(),
        }
        .with_slot_times(slot_times)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            slot_times: DEFAULT_SLOT_HOURS.into_iter().map(at_hour).collect(),
            hours: BusinessHours::default(),
            provision_days: DEFAULT_PROVISION_DAYS,
            request_timeout: Duration::from_secs(5),
            database_url: None,
        }
    }
}
