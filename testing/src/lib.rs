//! # Course Booking Testing
//!
//! Deterministic test doubles and fixtures for the course-booking core.
//!
//! This crate provides:
//! - [`mocks::InMemoryBookingStore`]: the store contract over shared hash
//!   maps, with version compare-and-set writes and transactional undo
//! - [`clock::FixedClock`]: pinnable time for hold-window assertions
//! - [`chaos::ChaosDelay`]: the fault injector that widens race windows
//! - [`fixtures`]: published course/batch builders
//!
//! ## Example
//!
//! ```ignore
//! use course_booking_core::service::BookingService;
//! use course_booking_testing::fixtures;
//!
//! #[tokio::test]
//! async fn reserve_takes_a_seat() {
//!     let (store, course, batch) = fixtures::seeded_store(5, 5);
//!     let service = BookingService::new(store.clone());
//!
//!     let booking = service
//!         .create_booking(course.id, batch.id, fixtures::customer())
//!         .await
//!         .unwrap();
//!     service.reserve_booking(booking.id).await.unwrap();
//!
//!     assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 4);
//! }
//! ```

pub mod chaos;
pub mod clock;
pub mod fixtures;
pub mod mocks;

pub use chaos::ChaosDelay;
pub use clock::FixedClock;
pub use mocks::{InMemoryBookingStore, InMemoryTx};

/// Install a fmt tracing subscriber honoring `RUST_LOG`, once per process.
///
/// Safe to call from every test; subsequent calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
