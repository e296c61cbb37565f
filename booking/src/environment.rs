//! Booking lifecycle environment.

use crate::allocator::SlotAllocator;
use crate::config::BookingConfig;
use crate::providers::{BookingRepository, SlotLedger};
use carwash_core::environment::Clock;
use std::sync::Arc;

/// Dependencies injected into the lifecycle reducer.
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Slot reservations.
    pub allocator: SlotAllocator,
    /// Booking records.
    pub repository: Arc<dyn BookingRepository>,
    /// Time source for past-date checks and timestamps.
    pub clock: Arc<dyn Clock>,
    /// Capacity, times and business hours.
    pub config: Arc<BookingConfig>,
}

impl BookingEnvironment {
    /// Wire an environment from its backends.
    ///
    /// The ledger enforces capacity, so `config.capacity` is set to the
    /// ledger's value when the two differ.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn SlotLedger>,
        repository: Arc<dyn BookingRepository>,
        clock: Arc<dyn Clock>,
        mut config: BookingConfig,
    ) -> Self {
        let capacity = ledger.capacity();
        if config.capacity != capacity {
            tracing::warn!(
                configured = config.capacity,
                ledger = capacity,
                "Configured capacity differs from the ledger; using the ledger's"
            );
            config.capacity = capacity;
        }

        let config = Arc::new(config);
        Self {
            allocator: SlotAllocator::new(ledger, Arc::clone(&config), Arc::clone(&clock)),
            repository,
            clock,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::{InMemoryBookingRepository, InMemorySlotLedger};
    use carwash_testing::test_clock;

    #[test]
    fn config_capacity_follows_the_ledger() {
        let env = BookingEnvironment::new(
            Arc::new(InMemorySlotLedger::new(4)),
            Arc::new(InMemoryBookingRepository::new()),
            Arc::new(test_clock()),
            BookingConfig::default().with_capacity(12),
        );

        assert_eq!(env.config.capacity, 4);
        assert_eq!(env.allocator.config().capacity, 4);
    }
}
