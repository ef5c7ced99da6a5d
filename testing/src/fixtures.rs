//! Fixture builders for bookable courses and batches.

use chrono::{Duration, Utc};
use course_booking_core::batch::{Batch, BatchStatus};
use course_booking_core::catalog::{Course, CourseStatus};
use course_booking_core::types::{BatchId, CourseId, Customer, Version};

use crate::mocks::InMemoryBookingStore;

/// A published course ready to take bookings.
#[must_use]
pub fn published_course() -> Course {
    Course {
        id: CourseId::new(),
        name: "Intro to Databases".to_string(),
        slug: "intro-to-databases".to_string(),
        description: "Transactions, indexes, and why versions matter".to_string(),
        status: CourseStatus::Published,
        published_at: Some(Utc::now() - Duration::days(30)),
    }
}

/// A published batch for `course_id` with the given capacity, selling for
/// another 30 days. `max_seats <= 0` makes it unlimited.
#[must_use]
pub fn published_batch(course_id: CourseId, max_seats: i32, available_seats: i32) -> Batch {
    let now = Utc::now();
    Batch {
        id: BatchId::new(),
        course_id,
        name: "march intake".to_string(),
        max_seats,
        available_seats,
        price: 150.0,
        currency: "USD".to_string(),
        status: BatchStatus::Published,
        start_date: Some(now - Duration::days(7)),
        end_date: Some(now + Duration::days(30)),
        created_at: now,
        updated_at: now,
        deleted_at: None,
        version: Version::new(0),
    }
}

/// A throwaway customer.
#[must_use]
pub fn customer() -> Customer {
    Customer::new("Ada Lovelace", "ada@example.com", Some("555-0100".to_string()))
}

/// An in-memory store pre-seeded with one published course and one published
/// batch of the given capacity.
#[must_use]
pub fn seeded_store(max_seats: i32, available_seats: i32) -> (InMemoryBookingStore, Course, Batch) {
    let store = InMemoryBookingStore::new();
    let course = published_course();
    let batch = published_batch(course.id, max_seats, available_seats);
    store.insert_course(course.clone());
    store.insert_batch(batch.clone());
    (store, course, batch)
}
