//! # Course Booking Core
//!
//! The reservation consistency engine: booking state machine, seat-inventory
//! aggregate, and the transactional optimistic-concurrency retry protocol that
//! keeps the two in sync under concurrent access.
//!
//! ## Architecture
//!
//! - [`batch`]: seat inventory and sale-window rules for one scheduled course
//!   instance — the contended row.
//! - [`booking`]: the reservation's state machine and billing metadata.
//! - [`store`]: the Optimistic Store contract — conditional reads and
//!   version-guarded writes that report affected-row counts.
//! - [`service`]: the reservation and release coordinators, each running
//!   inside one transaction with bounded retry on write conflict.
//! - [`environment`]: clock and fault-injection seams.
//!
//! ## Consistency model
//!
//! All consistency is local to a single relational store's transactions.
//! Conflicts are detected by per-row version counters checked at write time;
//! there is no pessimistic locking and no in-process mutex around a batch or
//! booking. A rolled-back transaction leaves no partial state behind.
//!
//! ## Example
//!
//! ```ignore
//! use course_booking_core::service::BookingService;
//! use course_booking_core::types::Customer;
//!
//! let service = BookingService::new(store);
//! let booking = service
//!     .create_booking(course_id, batch_id, Customer::new("Ada", "ada@example.com", None))
//!     .await?;
//! let reserved = service.reserve_booking(booking.id).await?;
//! ```

pub mod batch;
pub mod booking;
pub mod catalog;
pub mod environment;
pub mod error;
pub mod service;
pub mod store;
pub mod types;

pub use batch::{Batch, BatchStatus};
pub use booking::{Booking, BookingStatus};
pub use catalog::{Course, CourseStatus};
pub use environment::{Clock, FaultInjector, FaultPoint, SystemClock};
pub use error::BookingError;
pub use service::{BookingService, MAX_RELEASE_RETRIES, MAX_RESERVATION_RETRIES};
pub use store::{BookingFilter, BookingStore, StoreError, StoreTx};
pub use types::{BatchId, BookingId, CourseId, Customer, Version};
