//! Concurrent requests against one slot.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use carwash_booking::{
    Actor, BookingConfig, BookingError, BookingRequest, BookingService, BookingStatus, ServiceId,
    UserId,
};
use carwash_testing::mocks::FixedClock;
use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use std::sync::Arc;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn time() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).unwrap()
}

fn service() -> BookingService {
    carwash_testing::init_tracing();
    let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    BookingService::in_memory(BookingConfig::default(), Arc::new(FixedClock::on_date(today)))
}

async fn occupied(service: &BookingService) -> u32 {
    service
        .slot_snapshot(date())
        .await
        .unwrap()
        .into_iter()
        .find(|view| view.time == time())
        .map_or(0, |view| view.occupied)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn eleven_racing_requests_fill_ten_spots() {
    let service = service();

    let attempts = (0..11).map(|user| {
        let service = service.clone();
        async move {
            service
                .create_booking(BookingRequest::new(
                    UserId::new(user),
                    ServiceId::new(1),
                    date(),
                    time(),
                ))
                .await
        }
    });
    let results = join_all(attempts).await;

    let created = results.iter().filter(|r| r.is_ok()).count();
    let refused: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(created, 10);
    assert_eq!(
        refused,
        vec![&BookingError::SlotUnavailable {
            date: date(),
            time: time()
        }]
    );
    assert_eq!(occupied(&service).await, 10);
    assert_eq!(service.bookings_for_date(date()).await.unwrap().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_on_spawned_tasks_never_overfill() {
    let service = service();

    let handles: Vec<_> = (0..25)
        .map(|user| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .create_booking(BookingRequest::new(
                        UserId::new(user),
                        ServiceId::new(1),
                        date(),
                        time(),
                    ))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            created += 1;
        }
    }

    assert_eq!(created, 10);
    assert_eq!(occupied(&service).await, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn double_cancel_releases_the_spot_once() {
    let service = service();
    let booking = service
        .create_booking(BookingRequest::new(UserId::new(7), ServiceId::new(1), date(), time()))
        .await
        .unwrap();
    service
        .create_booking(BookingRequest::new(UserId::new(8), ServiceId::new(1), date(), time()))
        .await
        .unwrap();
    assert_eq!(occupied(&service).await, 2);

    let owner = Actor::customer(UserId::new(7));
    let (first, second) = tokio::join!(
        service.cancel_booking(booking.id, owner, None),
        service.cancel_booking(booking.id, owner, None),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(BookingError::InvalidTransition {
            from: BookingStatus::Cancelled,
            ..
        })
    )));
    assert_eq!(occupied(&service).await, 1);
}
