//! In-memory booking store with transactional undo semantics.
//!
//! Conditional writes are applied immediately under one lock as a
//! compare-and-set on the row's version, and every applied write records a
//! pre-image in the transaction's undo log. `rollback` (or dropping the
//! session) restores a pre-image only if the row still carries the version
//! this session wrote; once a later session has bumped the row further, the
//! pre-image is stale and the row is left alone, so a rollback can never
//! erase another session's committed write. `commit` discards the undo log.
//!
//! This write-through model makes uncommitted writes visible to concurrent
//! sessions, which real read-committed isolation would hide. For the
//! coordinator laws that is the conservative direction: it can only produce
//! more conflicts than `PostgreSQL` would, never fewer.

use course_booking_core::batch::{Batch, BatchStatus};
use course_booking_core::booking::Booking;
use course_booking_core::catalog::{Course, CourseStatus};
use course_booking_core::store::{BookingFilter, BookingStore, StoreError, StoreTx};
use course_booking_core::types::{BatchId, BookingId, CourseId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    batches: HashMap<Uuid, Batch>,
    courses: HashMap<Uuid, Course>,
}

fn lock(tables: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
    tables.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deterministic in-memory implementation of the booking store contract.
///
/// Cloning shares the underlying tables, so a service and a test can observe
/// the same state.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryBookingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a course row.
    pub fn insert_course(&self, course: Course) {
        lock(&self.tables).courses.insert(course.id.as_uuid(), course);
    }

    /// Seed a batch row.
    pub fn insert_batch(&self, batch: Batch) {
        lock(&self.tables).batches.insert(batch.id.as_uuid(), batch);
    }

    /// Seed a booking row directly, bypassing the service.
    pub fn insert_booking(&self, booking: Booking) {
        lock(&self.tables).bookings.insert(booking.id.as_uuid(), booking);
    }

    /// Snapshot a batch row regardless of status (for assertions).
    #[must_use]
    pub fn batch_snapshot(&self, id: BatchId) -> Option<Batch> {
        lock(&self.tables).batches.get(&id.as_uuid()).cloned()
    }

    /// Snapshot a booking row regardless of status (for assertions).
    #[must_use]
    pub fn booking_snapshot(&self, id: BookingId) -> Option<Booking> {
        lock(&self.tables).bookings.get(&id.as_uuid()).cloned()
    }
}

impl BookingStore for InMemoryBookingStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(InMemoryTx {
            tables: Arc::clone(&self.tables),
            undo: Vec::new(),
        })
    }

    async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut tables = lock(&self.tables);
        if tables.bookings.contains_key(&booking.id.as_uuid()) {
            return Err(StoreError::Duplicate {
                entity: "booking",
                id: booking.id.to_string(),
            });
        }
        tables.bookings.insert(booking.id.as_uuid(), booking.clone());
        Ok(())
    }

    async fn find_booking(&self, id: BookingId) -> Result<Booking, StoreError> {
        lock(&self.tables)
            .bookings
            .get(&id.as_uuid())
            .filter(|b| b.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "booking",
                id: id.to_string(),
            })
    }

    async fn find_course(&self, id: CourseId) -> Result<Course, StoreError> {
        lock(&self.tables)
            .courses
            .get(&id.as_uuid())
            .filter(|c| c.status == CourseStatus::Published)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "course",
                id: id.to_string(),
            })
    }

    async fn find_batch(&self, id: BatchId) -> Result<Batch, StoreError> {
        lock(&self.tables)
            .batches
            .get(&id.as_uuid())
            .filter(|b| b.status == BatchStatus::Published && b.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "batch",
                id: id.to_string(),
            })
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let tables = lock(&self.tables);
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.deleted_at.is_none())
            .filter(|b| filter.status.is_none_or(|status| b.status == status))
            .filter(|b| {
                filter
                    .invoice_number
                    .as_ref()
                    .is_none_or(|invoice| b.invoice_number.as_ref() == Some(invoice))
            })
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = usize::try_from(filter.offset).unwrap_or(0);
        let limit = usize::try_from(filter.effective_limit()).unwrap_or(usize::MAX);
        Ok(bookings.into_iter().skip(offset).take(limit).collect())
    }
}

enum Undo {
    Booking(Uuid, Booking),
    Batch(Uuid, Batch),
}

/// One open transaction against the in-memory store.
pub struct InMemoryTx {
    tables: Arc<Mutex<Tables>>,
    undo: Vec<Undo>,
}

impl InMemoryTx {
    // Undo a write only while this session's version is still the current
    // one. Once a later session has built on the row and bumped it further,
    // the pre-image is stale and re-inserting it would un-commit that
    // session's write; the row stays put and the version guard arbitrates.
    fn restore(&mut self) {
        let mut tables = lock(&self.tables);
        for undo in self.undo.drain(..).rev() {
            match undo {
                Undo::Booking(id, booking) => {
                    let written = booking.version.next();
                    if tables.bookings.get(&id).is_some_and(|b| b.version == written) {
                        tables.bookings.insert(id, booking);
                    }
                }
                Undo::Batch(id, batch) => {
                    let written = batch.version.next();
                    if tables.batches.get(&id).is_some_and(|b| b.version == written) {
                        tables.batches.insert(id, batch);
                    }
                }
            }
        }
    }
}

impl Drop for InMemoryTx {
    // An uncommitted session discards its writes, like a dropped sqlx
    // transaction.
    fn drop(&mut self) {
        self.restore();
    }
}

impl StoreTx for InMemoryTx {
    async fn find_booking(&mut self, id: BookingId) -> Result<Booking, StoreError> {
        lock(&self.tables)
            .bookings
            .get(&id.as_uuid())
            .filter(|b| b.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "booking",
                id: id.to_string(),
            })
    }

    async fn find_batch_for_course(
        &mut self,
        batch_id: BatchId,
        course_id: CourseId,
    ) -> Result<Batch, StoreError> {
        lock(&self.tables)
            .batches
            .get(&batch_id.as_uuid())
            .filter(|b| {
                b.course_id == course_id
                    && b.status == BatchStatus::Published
                    && b.deleted_at.is_none()
            })
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "batch",
                id: batch_id.to_string(),
            })
    }

    async fn find_course(&mut self, id: CourseId) -> Result<Course, StoreError> {
        lock(&self.tables)
            .courses
            .get(&id.as_uuid())
            .filter(|c| c.status == CourseStatus::Published)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "course",
                id: id.to_string(),
            })
    }

    async fn find_batch(&mut self, id: BatchId) -> Result<Batch, StoreError> {
        lock(&self.tables)
            .batches
            .get(&id.as_uuid())
            .filter(|b| b.status == BatchStatus::Published && b.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "batch",
                id: id.to_string(),
            })
    }

    async fn update_booking_status(&mut self, booking: &Booking) -> Result<u64, StoreError> {
        let mut tables = lock(&self.tables);
        let Some(stored) = tables.bookings.get_mut(&booking.id.as_uuid()) else {
            return Ok(0);
        };
        if stored.version != booking.version {
            return Ok(0);
        }
        self.undo.push(Undo::Booking(booking.id.as_uuid(), stored.clone()));

        stored.status = booking.status;
        stored.reserved_at = booking.reserved_at;
        stored.expired_at = booking.expired_at;
        stored.paid_at = booking.paid_at;
        stored.failed_at = booking.failed_at;
        stored.invoice_number = booking.invoice_number.clone();
        stored.updated_at = booking.updated_at;
        stored.version = booking.version.next();
        Ok(1)
    }

    async fn update_booking_payment(&mut self, booking: &Booking) -> Result<u64, StoreError> {
        let mut tables = lock(&self.tables);
        let Some(stored) = tables.bookings.get_mut(&booking.id.as_uuid()) else {
            return Ok(0);
        };
        if stored.version != booking.version {
            return Ok(0);
        }
        self.undo.push(Undo::Booking(booking.id.as_uuid(), stored.clone()));

        stored.paid_at = booking.paid_at;
        stored.invoice_number = booking.invoice_number.clone();
        stored.payment_type = booking.payment_type.clone();
        stored.updated_at = booking.updated_at;
        stored.version = booking.version.next();
        Ok(1)
    }

    async fn update_batch_available_seats(&mut self, batch: &Batch) -> Result<u64, StoreError> {
        let mut tables = lock(&self.tables);
        let Some(stored) = tables.batches.get_mut(&batch.id.as_uuid()) else {
            return Ok(0);
        };
        if stored.version != batch.version {
            return Ok(0);
        }
        self.undo.push(Undo::Batch(batch.id.as_uuid(), stored.clone()));

        stored.available_seats = batch.available_seats;
        stored.updated_at = batch.updated_at;
        stored.version = batch.version.next();
        Ok(1)
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.undo.clear();
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.restore();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn rollback_restores_rows_no_one_else_touched() {
        let (store, course, batch) = fixtures::seeded_store(10, 10);

        let mut tx = store.begin().await.unwrap();
        let mut seen = tx.find_batch_for_course(batch.id, course.id).await.unwrap();
        seen.available_seats -= 1;
        assert_eq!(tx.update_batch_available_seats(&seen).await.unwrap(), 1);
        tx.rollback().await.unwrap();

        let current = store.batch_snapshot(batch.id).unwrap();
        assert_eq!(current.available_seats, 10);
        assert_eq!(current.version.as_i64(), 0);
    }

    #[tokio::test]
    async fn dropped_session_discards_its_writes() {
        let (store, course, batch) = fixtures::seeded_store(10, 10);

        {
            let mut tx = store.begin().await.unwrap();
            let mut seen = tx.find_batch_for_course(batch.id, course.id).await.unwrap();
            seen.available_seats -= 1;
            assert_eq!(tx.update_batch_available_seats(&seen).await.unwrap(), 1);
        }

        assert_eq!(store.batch_snapshot(batch.id).unwrap().available_seats, 10);
    }

    #[tokio::test]
    async fn rollback_leaves_later_committed_writes_alone() {
        let (store, course, batch) = fixtures::seeded_store(10, 10);

        // Session A writes the batch but stays open.
        let mut tx_a = store.begin().await.unwrap();
        let mut seen_a = tx_a.find_batch_for_course(batch.id, course.id).await.unwrap();
        seen_a.available_seats -= 1;
        assert_eq!(tx_a.update_batch_available_seats(&seen_a).await.unwrap(), 1);

        // Session B builds on A's write and commits first.
        let mut tx_b = store.begin().await.unwrap();
        let mut seen_b = tx_b.find_batch_for_course(batch.id, course.id).await.unwrap();
        assert_eq!(seen_b.version.as_i64(), 1);
        seen_b.available_seats -= 1;
        assert_eq!(tx_b.update_batch_available_seats(&seen_b).await.unwrap(), 1);
        tx_b.commit().await.unwrap();

        // A's rollback must not un-commit B's write.
        tx_a.rollback().await.unwrap();

        let current = store.batch_snapshot(batch.id).unwrap();
        assert_eq!(current.version.as_i64(), 2);
        assert_eq!(current.available_seats, 8);
    }

    #[tokio::test]
    async fn catalog_lookups_work_inside_a_transaction() {
        let (store, course, batch) = fixtures::seeded_store(10, 10);

        let mut tx = store.begin().await.unwrap();
        let found_course = tx.find_course(course.id).await.unwrap();
        assert_eq!(found_course.id, course.id);

        let mut found_batch = tx.find_batch(batch.id).await.unwrap();
        found_batch.available_seats -= 1;
        assert_eq!(tx.update_batch_available_seats(&found_batch).await.unwrap(), 1);

        // The session observes its own uncommitted write.
        assert_eq!(tx.find_batch(batch.id).await.unwrap().available_seats, 9);
        tx.rollback().await.unwrap();

        assert!(matches!(
            tx_missing_course(&store).await,
            Err(StoreError::NotFound { entity: "course", .. })
        ));
    }

    async fn tx_missing_course(store: &InMemoryBookingStore) -> Result<Course, StoreError> {
        let mut tx = store.begin().await.unwrap();
        tx.find_course(CourseId::new()).await
    }
}
