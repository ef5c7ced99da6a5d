//! Persistence contract for the booking core.
//!
//! The store exposes conditional reads and writes keyed by id. Every update is
//! version-guarded: the implementation must compare the row's `version` column
//! against the aggregate's expected version and report the affected-row count.
//! Zero affected rows signals an optimistic conflict; the write must then have
//! mutated nothing.
//!
//! # Implementations
//!
//! - `PostgresBookingStore` (in `course-booking-postgres`): production store
//! - `InMemoryBookingStore` (in `course-booking-testing`): deterministic tests
//!
//! # Transactions
//!
//! [`BookingStore::begin`] opens a [`StoreTx`] session. All reads through the
//! session observe the transaction's own writes and are never cache-served.
//! The session is consumed by `commit` or `rollback`; dropping it without
//! committing must discard every write.

use crate::batch::Batch;
use crate::booking::{Booking, BookingStatus};
use crate::catalog::Course;
use crate::types::{BatchId, BookingId, CourseId};
use thiserror::Error;

/// Failures raised by store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested row does not exist (or is soft-deleted).
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind (`"booking"`, `"batch"`, `"course"`).
        entity: &'static str,
        /// Identifier that missed.
        id: String,
    },

    /// An insert collided with an existing primary key.
    #[error("{entity} {id} already exists")]
    Duplicate {
        /// Entity kind.
        entity: &'static str,
        /// Conflicting identifier.
        id: String,
    },

    /// Opaque backend failure (connection loss, malformed row, ...).
    #[error("database error: {0}")]
    Database(String),
}

/// Filter for listing bookings. Pagination is a peripheral concern; the core
/// only guarantees that returned bookings reflect committed state.
#[derive(Clone, Debug, Default)]
pub struct BookingFilter {
    /// Restrict to a single status.
    pub status: Option<BookingStatus>,
    /// Match an exact invoice number.
    pub invoice_number: Option<String>,
    /// Page size; `None` uses the store default of 5 rows.
    pub limit: Option<i64>,
    /// Rows to skip.
    pub offset: i64,
}

impl BookingFilter {
    /// Default page size applied when no limit is given.
    pub const DEFAULT_LIMIT: i64 = 5;

    /// Effective page size.
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

/// Pool-scoped store operations plus the entry point into a transaction.
pub trait BookingStore: Send + Sync {
    /// Transaction session type.
    type Tx: StoreTx;

    /// Open a new transaction. All coordinator work happens inside one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the backend cannot start one.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    /// Insert a new booking row at version 0.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Duplicate`] if the id already exists
    /// - [`StoreError::Database`] on backend failure
    fn create_booking(&self, booking: &Booking) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Load a booking by id from committed state.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the row is absent or soft-deleted.
    fn find_booking(&self, id: BookingId) -> impl Future<Output = Result<Booking, StoreError>> + Send;

    /// Load a published course by id.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the course is absent or unpublished.
    fn find_course(&self, id: CourseId) -> impl Future<Output = Result<Course, StoreError>> + Send;

    /// Load a published batch by id.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the batch is absent or unpublished.
    fn find_batch(&self, id: BatchId) -> impl Future<Output = Result<Batch, StoreError>> + Send;

    /// List bookings matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on backend failure.
    fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> impl Future<Output = Result<Vec<Booking>, StoreError>> + Send;
}

/// One open transaction against the store.
///
/// Conditional updates return the affected-row count: `1` when the version
/// guard matched, `0` on conflict. Implementations must never partially apply
/// a conditional write.
pub trait StoreTx: Send {
    /// Load a booking by id inside this transaction, bypassing any cache.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the row is absent or soft-deleted.
    fn find_booking(&mut self, id: BookingId) -> impl Future<Output = Result<Booking, StoreError>> + Send;

    /// Load the current batch row for `batch_id` belonging to `course_id`,
    /// fresh from the transaction's view of the table.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the pair does not match a published batch.
    fn find_batch_for_course(
        &mut self,
        batch_id: BatchId,
        course_id: CourseId,
    ) -> impl Future<Output = Result<Batch, StoreError>> + Send;

    /// Load a published course by id inside this transaction.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the course is absent or unpublished.
    fn find_course(&mut self, id: CourseId) -> impl Future<Output = Result<Course, StoreError>> + Send;

    /// Load a published batch by id inside this transaction.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the batch is absent or unpublished.
    fn find_batch(&mut self, id: BatchId) -> impl Future<Output = Result<Batch, StoreError>> + Send;

    /// Conditionally persist the booking's status columns
    /// (`WHERE id = $id AND version = $expected`), writing `version + 1`.
    ///
    /// Returns the affected-row count; `0` means the version guard failed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on backend failure.
    fn update_booking_status(
        &mut self,
        booking: &Booking,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Conditionally persist the booking's payment columns, same guard as
    /// [`Self::update_booking_status`].
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on backend failure.
    fn update_booking_payment(
        &mut self,
        booking: &Booking,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Conditionally persist the batch's `available_seats`
    /// (`WHERE id = $id AND version = $expected`), writing `version + 1`.
    ///
    /// Returns the affected-row count; `0` means a concurrent reservation won.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on backend failure.
    fn update_batch_available_seats(
        &mut self,
        batch: &Batch,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Commit every write performed through this session.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] if the backend rejects the commit; the
    /// transaction is rolled back in that case.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Discard every write performed through this session.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on backend failure.
    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
