//! Contended reservations against shared inventory.
//!
//! These tests spawn the real coordinators concurrently over the in-memory
//! store with the chaos injector installed, so write conflicts and retries
//! happen for real. The invariants hold on every interleaving: a limited
//! batch never oversells and never goes negative, and the seats released by
//! expiry add back up.

#![allow(clippy::unwrap_used)] // Test code fails loudly instead of propagating

use course_booking_core::booking::BookingStatus;
use course_booking_core::error::BookingError;
use course_booking_core::service::BookingService;
use course_booking_testing::{fixtures, ChaosDelay, InMemoryBookingStore};
use std::sync::Arc;
use std::time::Duration;

fn chaotic_service(store: InMemoryBookingStore) -> Arc<BookingService<InMemoryBookingStore>> {
    course_booking_testing::init_tracing();
    Arc::new(
        BookingService::new(store)
            .with_fault_injector(Arc::new(ChaosDelay::new(2, Duration::from_millis(20)))),
    )
}

#[tokio::test]
async fn limited_batch_never_oversells_under_contention() {
    let (store, course, batch) = fixtures::seeded_store(5, 5);
    let service = chaotic_service(store.clone());

    // Creation leaves the seats untouched, so every contender gets a booking.
    let mut bookings = Vec::new();
    for _ in 0..20 {
        bookings.push(
            service
                .create_booking(course.id, batch.id, fixtures::customer())
                .await
                .unwrap(),
        );
    }

    let mut tasks = Vec::new();
    for booking in &bookings {
        let service = Arc::clone(&service);
        let id = booking.id;
        tasks.push(tokio::spawn(async move { service.reserve_booking(id).await }));
    }

    let mut won = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(booking) => {
                assert_eq!(booking.status, BookingStatus::Reserved);
                won += 1;
            }
            Err(err) => assert!(
                matches!(err, BookingError::ClassSoldOut | BookingError::NotEnoughSeats),
                "unexpected loser error: {err}"
            ),
        }
    }

    assert_eq!(won, 5);
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 0);

    let reserved = bookings
        .iter()
        .filter(|b| store.booking_snapshot(b.id).unwrap().status == BookingStatus::Reserved)
        .count();
    assert_eq!(reserved, 5);
}

#[tokio::test]
async fn last_seat_goes_to_exactly_one_contender() {
    let (store, course, batch) = fixtures::seeded_store(1, 1);
    let service = chaotic_service(store.clone());

    let first = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();
    let second = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();

    let a = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.reserve_booking(first.id).await }
    });
    let b = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.reserve_booking(second.id).await }
    });

    let results = [a.await.unwrap(), b.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 0);
}

#[tokio::test]
async fn unlimited_batch_admits_every_contender() {
    let (store, course, batch) = fixtures::seeded_store(0, 0);
    let service = chaotic_service(store.clone());

    // Keep the contender count below the retry budget so a task cannot be
    // starved out by the others' version bumps alone.
    let mut bookings = Vec::new();
    for _ in 0..5 {
        bookings.push(
            service
                .create_booking(course.id, batch.id, fixtures::customer())
                .await
                .unwrap(),
        );
    }

    let mut tasks = Vec::new();
    for booking in &bookings {
        let service = Arc::clone(&service);
        let id = booking.id;
        tasks.push(tokio::spawn(async move { service.reserve_booking(id).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // No seat accounting on an unlimited batch.
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 0);
}

#[tokio::test]
async fn concurrent_expiry_returns_every_seat() {
    let (store, course, batch) = fixtures::seeded_store(3, 3);
    let service = chaotic_service(store.clone());

    let mut bookings = Vec::new();
    for _ in 0..3 {
        let booking = service
            .create_booking(course.id, batch.id, fixtures::customer())
            .await
            .unwrap();
        service.reserve_booking(booking.id).await.unwrap();
        bookings.push(booking);
    }
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 0);

    let mut tasks = Vec::new();
    for booking in &bookings {
        let service = Arc::clone(&service);
        let id = booking.id;
        tasks.push(tokio::spawn(async move { service.expire_booking(id).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 3);
    for booking in &bookings {
        assert_eq!(
            store.booking_snapshot(booking.id).unwrap().status,
            BookingStatus::Expired
        );
    }
}
