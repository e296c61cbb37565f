//! Slot board demo
//!
//! Provisions slots, books a few appointments, cancels one, settles a
//! transfer payment and prints the board after each step.
//!
//! Configuration comes from `CARWASH_*` environment variables (a `.env`
//! file is honored). Built with `--features postgres` and with
//! `DATABASE_URL` set, the demo runs against `PostgreSQL`.

use anyhow::Context;
use carwash_booking::{
    Actor, BookingConfig, BookingService, BookingRequest, BookingStatus, PaymentMethod, ServiceId,
    SlotView, UserId,
};
use carwash_core::environment::{Clock, SystemClock};
use chrono::{Days, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BAR_WIDTH: u32 = 10;

fn render(date: NaiveDate, board: &[SlotView]) {
    println!("\n  Slots on {date}");
    for view in board {
        let filled = if view.capacity == 0 {
            BAR_WIDTH
        } else {
            view.occupied * BAR_WIDTH / view.capacity
        };
        let bar: String = (0..BAR_WIDTH)
            .map(|i| if i < filled { '#' } else { '.' })
            .collect();
        println!(
            "  {}  [{bar}]  {:>2}/{}",
            view.time.format("%H:%M"),
            view.occupied,
            view.capacity
        );
    }
}

#[cfg(feature = "postgres")]
async fn connect(config: BookingConfig, clock: Arc<dyn Clock>) -> anyhow::Result<BookingService> {
    use carwash_booking::BookingEnvironment;
    use carwash_booking::stores::postgres::{migrate, PostgresBookingRepository, PostgresSlotLedger};

    let Some(url) = config.database_url.clone() else {
        return Ok(BookingService::in_memory(config, clock));
    };

    let pool = sqlx::PgPool::connect(&url)
        .await
        .context("connecting to DATABASE_URL")?;
    migrate(&pool).await?;
    tracing::info!("Using PostgreSQL backend");

    Ok(BookingService::new(BookingEnvironment::new(
        Arc::new(PostgresSlotLedger::new(pool.clone(), config.capacity)),
        Arc::new(PostgresBookingRepository::new(pool)),
        clock,
        config,
    )))
}

#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
async fn connect(config: BookingConfig, clock: Arc<dyn Clock>) -> anyhow::Result<BookingService> {
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL ignored; rebuild with --features postgres");
    }
    Ok(BookingService::in_memory(config, clock))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slot_board=info,carwash_booking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Car Wash Slot Board ===");

    let config = BookingConfig::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let date = clock
        .today()
        .checked_add_days(Days::new(1))
        .context("date out of range")?;
    let first_time = *config.slot_times.first().context("no slot times configured")?;

    let service = connect(config, clock).await?;
    let provisioned = service.provision().await?;
    println!("Provisioned {provisioned} slots");

    // Three customers book the first slot of tomorrow, staff adds a walk-in.
    let mut booked = Vec::new();
    for user in 1..=3 {
        let request = BookingRequest::new(UserId::new(user), ServiceId::new(1), date, first_time);
        let booking = service.create_booking(request).await?;
        println!(">>> {} booked by user {user} ({})", booking.reference(), booking.status);
        booked.push(booking);
    }
    let walk_in = service
        .create_walk_in(
            BookingRequest::new(UserId::new(4), ServiceId::new(2), date, first_time),
            "Front desk",
        )
        .await?;
    println!(">>> {} walk-in ({})", walk_in.reference(), walk_in.status);
    render(date, &service.slot_snapshot(date).await?);

    // User 1 cancels; user 2 pays by transfer and an admin verifies it.
    let cancelled = service
        .cancel_booking(
            booked[0].id,
            Actor::customer(UserId::new(1)),
            Some("Rescheduling".to_string()),
        )
        .await?;
    println!("\n>>> {} is now {}", cancelled.reference(), cancelled.status);

    let desk = service.payment_desk();
    desk.submit(booked[1].id, PaymentMethod::Transfer, 50_000, Some("transfer-proof.jpg".into()))
        .await?;
    let (payment, confirmed) = desk.verify(booked[1].id, Some("Matched statement".into())).await?;
    println!(
        ">>> {} paid via {} ({:?}), booking {}",
        confirmed.reference(),
        payment.method.display_name(),
        payment.status,
        confirmed.status
    );

    // Staff runs the walk-in through the bay.
    let staff = Actor::employee(UserId::new(100));
    for target in [BookingStatus::InProgress, BookingStatus::Completed] {
        service.advance_booking(walk_in.id, staff, target).await?;
    }

    render(date, &service.slot_snapshot(date).await?);

    let stats = service.stats().await?;
    println!(
        "\nBookings: {} total, {} pending, {} confirmed, {} completed, {} cancelled",
        stats.total, stats.pending, stats.confirmed, stats.completed, stats.cancelled
    );
    println!("Open times tomorrow: {}", service.available_times(date).await?.len());

    service.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}
