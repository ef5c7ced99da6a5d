//! End-to-end booking lifecycle over the in-memory store.
//!
//! These tests drive the real coordinators through the full state machine:
//! create, reserve, expire, and the payment transitions, asserting inventory
//! and version effects in the store after each step.

#![allow(clippy::unwrap_used)] // Test code fails loudly instead of propagating

use chrono::{Duration, Utc};
use course_booking_core::booking::{hold_duration, BookingStatus};
use course_booking_core::error::BookingError;
use course_booking_core::service::BookingService;
use course_booking_core::store::BookingFilter;
use course_booking_testing::{fixtures, FixedClock, InMemoryBookingStore};
use std::sync::Arc;

fn service(store: InMemoryBookingStore) -> BookingService<InMemoryBookingStore> {
    course_booking_testing::init_tracing();
    BookingService::new(store)
}

#[tokio::test]
async fn reserve_sets_hold_window_and_bumps_versions() {
    let (store, course, batch) = fixtures::seeded_store(10, 10);
    let now = Utc::now();
    let service = service(store.clone()).with_clock(Arc::new(FixedClock::new(now)));

    let created = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();
    assert_eq!(created.status, BookingStatus::Created);
    assert_eq!(created.version.as_i64(), 0);
    assert_eq!(created.price, batch.price);
    assert_eq!(created.currency, batch.currency);

    let reserved = service.reserve_booking(created.id).await.unwrap();
    assert_eq!(reserved.status, BookingStatus::Reserved);
    assert_eq!(reserved.version.as_i64(), 1);
    assert_eq!(reserved.reserved_at, Some(now));
    assert_eq!(reserved.expired_at, Some(now + hold_duration()));
    assert_eq!(reserved.expired_at.unwrap() - reserved.reserved_at.unwrap(), Duration::minutes(10));

    let stored_batch = store.batch_snapshot(batch.id).unwrap();
    assert_eq!(stored_batch.available_seats, 9);
    assert_eq!(stored_batch.version.as_i64(), 1);
    // The persisted modification time comes from the coordinator's clock.
    assert_eq!(stored_batch.updated_at, now);
}

#[tokio::test]
async fn create_booking_rejects_sold_out_batch() {
    let (store, course, batch) = fixtures::seeded_store(10, 0);
    let service = service(store);

    let err = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ClassSoldOut));
}

#[tokio::test]
async fn create_booking_rejects_batch_past_sale_window() {
    let store = InMemoryBookingStore::new();
    let course = fixtures::published_course();
    let mut batch = fixtures::published_batch(course.id, 10, 10);
    batch.end_date = Some(Utc::now() - Duration::days(1));
    store.insert_course(course.clone());
    store.insert_batch(batch.clone());
    let service = service(store);

    let err = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ClassNotAvailableForSale));
}

#[tokio::test]
async fn reserve_fails_once_seats_run_out() {
    // Creation does not take the seat, so both bookings can be created
    // against a one-seat batch; only one reservation can then win.
    let (store, course, batch) = fixtures::seeded_store(1, 1);
    let service = service(store.clone());

    let first = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();
    let second = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();

    service.reserve_booking(first.id).await.unwrap();
    let err = service.reserve_booking(second.id).await.unwrap_err();
    assert!(matches!(err, BookingError::ClassSoldOut));

    // The loser left no trace: its booking is still Created at version 0.
    let loser = store.booking_snapshot(second.id).unwrap();
    assert_eq!(loser.status, BookingStatus::Created);
    assert_eq!(loser.version.as_i64(), 0);
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 0);
}

#[tokio::test]
async fn unlimited_batch_reserves_without_touching_seats() {
    let (store, course, batch) = fixtures::seeded_store(0, 0);
    let service = service(store.clone());

    let booking = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();
    let reserved = service.reserve_booking(booking.id).await.unwrap();

    assert_eq!(reserved.status, BookingStatus::Reserved);
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 0);
}

#[tokio::test]
async fn expire_returns_the_seat_and_marks_expired() {
    let (store, course, batch) = fixtures::seeded_store(10, 10);
    let service = service(store.clone());

    let booking = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();
    service.reserve_booking(booking.id).await.unwrap();
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 9);

    service.expire_booking(booking.id).await.unwrap();

    let expired = store.booking_snapshot(booking.id).unwrap();
    assert_eq!(expired.status, BookingStatus::Expired);
    assert_eq!(expired.version.as_i64(), 2);
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 10);
}

#[tokio::test]
async fn expire_twice_is_already_expired() {
    let (store, course, batch) = fixtures::seeded_store(10, 10);
    let service = service(store.clone());

    let booking = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();
    service.reserve_booking(booking.id).await.unwrap();
    service.expire_booking(booking.id).await.unwrap();

    let err = service.expire_booking(booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::AlreadyExpired));

    // No double release.
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 10);
}

#[tokio::test]
async fn expire_of_paid_booking_is_rejected_and_inventory_untouched() {
    let (store, course, batch) = fixtures::seeded_store(10, 10);
    let service = service(store.clone());

    let booking = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();
    service.reserve_booking(booking.id).await.unwrap();
    service.complete_payment(booking.id, Utc::now()).await.unwrap();

    let err = service.expire_booking(booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidStateTransition(_)));

    let stored = store.booking_snapshot(booking.id).unwrap();
    assert_eq!(stored.status, BookingStatus::Completed);
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 9);
}

#[tokio::test]
async fn expire_of_never_reserved_booking_releases_no_seat() {
    let (store, course, batch) = fixtures::seeded_store(10, 10);
    let service = service(store.clone());

    let booking = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();
    service.expire_booking(booking.id).await.unwrap();

    let expired = store.booking_snapshot(booking.id).unwrap();
    assert_eq!(expired.status, BookingStatus::Expired);
    // The booking never held a seat, so nothing comes back.
    assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 10);
    assert_eq!(store.batch_snapshot(batch.id).unwrap().version.as_i64(), 0);
}

#[tokio::test]
async fn payment_marks_clear_each_other() {
    let (store, course, batch) = fixtures::seeded_store(10, 10);
    let service = service(store);

    let booking = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();
    service.reserve_booking(booking.id).await.unwrap();

    let failed_at = Utc::now();
    let failed = service.fail_payment(booking.id, failed_at).await.unwrap();
    assert_eq!(failed.status, BookingStatus::Failed);
    assert_eq!(failed.failed_at, Some(failed_at));
    assert!(failed.paid_at.is_none());

    // The gateway retried and the charge went through.
    let paid_at = Utc::now();
    let paid = service.complete_payment(booking.id, paid_at).await.unwrap();
    assert_eq!(paid.status, BookingStatus::Completed);
    assert_eq!(paid.paid_at, Some(paid_at));
    assert!(paid.failed_at.is_none());
    assert_eq!(paid.version.as_i64(), 3);
}

#[tokio::test]
async fn update_payment_switches_method_and_voids_invoice() {
    let (store, course, batch) = fixtures::seeded_store(10, 10);
    let service = service(store.clone());

    let booking = service
        .create_booking(course.id, batch.id, fixtures::customer())
        .await
        .unwrap();

    let mut invoiced = store.booking_snapshot(booking.id).unwrap();
    invoiced.payment_type = Some("invoice".to_string());
    invoiced.invoice_number = Some("INV-2026-001".to_string());
    store.insert_booking(invoiced);

    let updated = service
        .update_payment(booking.id, "card".to_string())
        .await
        .unwrap();
    assert_eq!(updated.payment_type.as_deref(), Some("card"));
    assert!(updated.invoice_number.is_none());
    assert_eq!(updated.version.as_i64(), 1);
}

#[tokio::test]
async fn get_booking_reports_not_found() {
    let (store, _, _) = fixtures::seeded_store(10, 10);
    let service = service(store);

    let err = service
        .get_booking(course_booking_core::types::BookingId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound { entity: "booking", .. }));
}

#[tokio::test]
async fn list_bookings_filters_by_status_and_pages() {
    let (store, course, batch) = fixtures::seeded_store(20, 20);
    let service = service(store);

    let mut reserved_ids = Vec::new();
    for i in 0..7 {
        let booking = service
            .create_booking(course.id, batch.id, fixtures::customer())
            .await
            .unwrap();
        // Reserve every other booking, leave the rest in Created.
        if i % 2 == 0 {
            service.reserve_booking(booking.id).await.unwrap();
            reserved_ids.push(booking.id);
        }
    }

    let reserved = service
        .list_bookings(&BookingFilter {
            status: Some(BookingStatus::Reserved),
            ..BookingFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(reserved.len(), 4);
    assert!(reserved.iter().all(|b| b.status == BookingStatus::Reserved));

    // The default page size caps an unfiltered listing at five rows.
    let page = service.list_bookings(&BookingFilter::default()).await.unwrap();
    assert_eq!(page.len(), 5);

    let rest = service
        .list_bookings(&BookingFilter {
            offset: 5,
            ..BookingFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(rest.len(), 2);
}
