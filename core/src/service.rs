//! Booking service: the reservation and release coordinators.
//!
//! Each operation runs to completion inside one short-lived store transaction.
//! Concurrency safety is delegated entirely to the optimistic version tokens
//! checked by the store's conditional writes; there is no in-process locking.
//!
//! # Reservation protocol
//!
//! 1. Load the booking inside the transaction.
//! 2. Load the current batch row fresh.
//! 3. Run `booking.reserve(&mut batch)` in memory; any state-machine failure
//!    aborts and rolls back.
//! 4. Conditionally update the batch's seats. Zero affected rows means a
//!    concurrent reservation won: reload the batch and repeat from step 3, up
//!    to [`MAX_RESERVATION_RETRIES`] retries.
//! 5. Conditionally update the booking's status, single attempt. Booking rows
//!    are low-contention, so a conflict here is surfaced to the caller as
//!    [`BookingError::OptimisticConflict`] instead of burning retry budget.
//! 6. Commit only if both conditional updates succeeded.
//!
//! The release coordinator mirrors this for giving a seat back on expiry.

use crate::booking::Booking;
use crate::environment::{Clock, FaultInjector, FaultPoint, SystemClock};
use crate::error::BookingError;
use crate::store::{BookingFilter, BookingStore, StoreTx};
use crate::types::{BatchId, BookingId, CourseId, Customer};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Conflict-triggered re-attempts allowed within one reservation (6 total
/// attempts including the first).
pub const MAX_RESERVATION_RETRIES: u32 = 5;

/// Conflict-triggered re-attempts allowed within one seat release.
pub const MAX_RELEASE_RETRIES: u32 = 5;

/// Orchestrates booking operations over an optimistic [`BookingStore`].
pub struct BookingService<S> {
    store: S,
    clock: Arc<dyn Clock>,
    fault: Option<Arc<dyn FaultInjector>>,
}

impl<S: BookingStore> BookingService<S> {
    /// Create a service over `store` with the system clock and no faults.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            fault: None,
        }
    }

    /// Replace the clock (tests pin time to verify the hold window).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Install a fault injector. Test harnesses only; production leaves the
    /// hook empty and the coordinators never delay on their own.
    #[must_use]
    pub fn with_fault_injector(mut self, fault: Arc<dyn FaultInjector>) -> Self {
        self.fault = Some(fault);
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    async fn inject_fault(&self, point: FaultPoint) {
        if let Some(fault) = &self.fault {
            fault.inject(point).await;
        }
    }

    /// Create a booking for one seat in `batch_id` of `course_id`.
    ///
    /// The availability gate runs up front so customers are not handed
    /// bookings for classes that cannot sell, but the seat itself is only
    /// taken later by [`Self::reserve_booking`].
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] if the course or batch is absent
    /// - [`BookingError::ClassSoldOut`] / [`BookingError::ClassNotAvailableForSale`]
    ///   if the batch cannot currently sell
    pub async fn create_booking(
        &self,
        course_id: CourseId,
        batch_id: BatchId,
        customer: Customer,
    ) -> Result<Booking, BookingError> {
        let course = self.store.find_course(course_id).await?;
        let batch = self.store.find_batch(batch_id).await?;

        let now = self.clock.now();
        batch.available(now)?;

        let booking = Booking::for_batch(&course, &batch, now).with_customer(customer);
        self.store.create_booking(&booking).await?;

        tracing::info!(
            booking_id = %booking.id,
            course_id = %course_id,
            batch_id = %batch_id,
            "booking created"
        );
        Ok(booking)
    }

    /// Reserve the seat for `booking_id`.
    ///
    /// Runs the full reservation protocol (see module docs) inside one
    /// transaction and returns the booking with its bumped version.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] if the booking or its batch is absent
    /// - [`BookingError::NotEnoughSeats`] / [`BookingError::ClassSoldOut`] /
    ///   [`BookingError::ClassNotAvailableForSale`] from the inventory rules
    /// - [`BookingError::ReservationRetryBudgetExceeded`] after 6 conflicting
    ///   attempts on the batch row
    /// - [`BookingError::OptimisticConflict`] if the booking row itself was
    ///   concurrently modified
    pub async fn reserve_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;
        match self.reserve_in_tx(&mut tx, booking_id).await {
            Ok(booking) => {
                tx.commit().await?;
                tracing::info!(booking_id = %booking_id, version = %booking.version, "booking reserved");
                Ok(booking)
            }
            Err(err) => {
                rollback_quietly(tx, "reserve_booking").await;
                Err(err)
            }
        }
    }

    async fn reserve_in_tx(
        &self,
        tx: &mut S::Tx,
        booking_id: BookingId,
    ) -> Result<Booking, BookingError> {
        let mut booking = tx.find_booking(booking_id).await?;

        let mut reserved_batch = None;
        for attempt in 0..=MAX_RESERVATION_RETRIES {
            let mut batch = tx
                .find_batch_for_course(booking.batch_id, booking.course_id)
                .await?;

            booking.reserve(&mut batch, self.clock.now())?;

            self.inject_fault(FaultPoint::BeforeBatchWrite).await;
            if tx.update_batch_available_seats(&batch).await? == 0 {
                tracing::debug!(
                    booking_id = %booking_id,
                    batch_id = %batch.id,
                    attempt,
                    "batch seat write conflicted, reloading"
                );
                continue;
            }
            batch.mark_persisted();
            reserved_batch = Some(batch);
            break;
        }
        let Some(batch) = reserved_batch else {
            tracing::warn!(booking_id = %booking_id, "reservation retry budget exhausted");
            return Err(BookingError::ReservationRetryBudgetExceeded);
        };

        self.inject_fault(FaultPoint::BeforeBookingWrite).await;
        if tx.update_booking_status(&booking).await? == 0 {
            return Err(BookingError::OptimisticConflict { entity: "booking" });
        }
        booking.mark_persisted();

        tracing::debug!(
            booking_id = %booking_id,
            batch_id = %batch.id,
            seats_left = batch.available_seats,
            "seat taken"
        );
        Ok(booking)
    }

    /// Expire `booking_id` and give its seat back to the batch.
    ///
    /// Invoked per booking by an external trigger once the hold window has
    /// lapsed; this core runs no sweeps of its own.
    ///
    /// # Errors
    ///
    /// - [`BookingError::AlreadyExpired`] if the booking is already expired
    /// - [`BookingError::InvalidStateTransition`] if it is completed or failed
    ///   (inventory is untouched in both cases)
    /// - [`BookingError::OptimisticConflict`] if the booking row was
    ///   concurrently modified
    /// - [`BookingError::ReleaseRetryBudgetExceeded`] after 6 conflicting
    ///   attempts to return the seat
    pub async fn expire_booking(&self, booking_id: BookingId) -> Result<(), BookingError> {
        let mut tx = self.store.begin().await?;
        match self.expire_in_tx(&mut tx, booking_id).await {
            Ok(()) => {
                tx.commit().await?;
                tracing::info!(booking_id = %booking_id, "booking expired, seat released");
                Ok(())
            }
            Err(err) => {
                rollback_quietly(tx, "expire_booking").await;
                Err(err)
            }
        }
    }

    async fn expire_in_tx(&self, tx: &mut S::Tx, booking_id: BookingId) -> Result<(), BookingError> {
        let mut booking = tx.find_booking(booking_id).await?;
        let was_reserved = booking.reserved_at.is_some();

        booking.expire(self.clock.now())?;

        self.inject_fault(FaultPoint::BeforeBookingWrite).await;
        if tx.update_booking_status(&booking).await? == 0 {
            return Err(BookingError::OptimisticConflict { entity: "booking" });
        }
        booking.mark_persisted();

        // A booking that never held a seat has nothing to give back.
        if !was_reserved {
            return Ok(());
        }

        for attempt in 0..=MAX_RELEASE_RETRIES {
            let mut batch = tx
                .find_batch_for_course(booking.batch_id, booking.course_id)
                .await?;
            batch.allocate(1, self.clock.now());

            self.inject_fault(FaultPoint::BeforeBatchWrite).await;
            if tx.update_batch_available_seats(&batch).await? == 0 {
                tracing::debug!(
                    booking_id = %booking_id,
                    batch_id = %batch.id,
                    attempt,
                    "seat release conflicted, reloading"
                );
                continue;
            }
            return Ok(());
        }
        tracing::warn!(booking_id = %booking_id, "release retry budget exhausted");
        Err(BookingError::ReleaseRetryBudgetExceeded)
    }

    /// Record a completed payment for `booking_id`.
    ///
    /// Single-attempt conditional write; the payment gateway owns retries.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] if the booking is absent
    /// - [`BookingError::OptimisticConflict`] on a concurrent modification
    pub async fn complete_payment(
        &self,
        booking_id: BookingId,
        paid_at: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        self.apply_payment(booking_id, |booking| booking.complete_payment(paid_at))
            .await
    }

    /// Record a failed payment for `booking_id`.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::complete_payment`].
    pub async fn fail_payment(
        &self,
        booking_id: BookingId,
        failed_at: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        self.apply_payment(booking_id, |booking| booking.fail_payment(failed_at))
            .await
    }

    /// Switch the payment method for `booking_id`, voiding its invoice.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::complete_payment`].
    pub async fn update_payment(
        &self,
        booking_id: BookingId,
        payment_type: String,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut booking = tx.find_booking(booking_id).await?;
            booking.update_payment(payment_type);
            if tx.update_booking_payment(&booking).await? == 0 {
                return Err(BookingError::OptimisticConflict { entity: "booking" });
            }
            booking.mark_persisted();
            Ok(booking)
        }
        .await;

        match result {
            Ok(booking) => {
                tx.commit().await?;
                Ok(booking)
            }
            Err(err) => {
                rollback_quietly(tx, "update_payment").await;
                Err(err)
            }
        }
    }

    async fn apply_payment(
        &self,
        booking_id: BookingId,
        mutate: impl FnOnce(&mut Booking),
    ) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut booking = tx.find_booking(booking_id).await?;
            mutate(&mut booking);
            if tx.update_booking_status(&booking).await? == 0 {
                return Err(BookingError::OptimisticConflict { entity: "booking" });
            }
            booking.mark_persisted();
            Ok(booking)
        }
        .await;

        match result {
            Ok(booking) => {
                tx.commit().await?;
                tracing::info!(booking_id = %booking_id, status = ?booking.status, "payment status recorded");
                Ok(booking)
            }
            Err(err) => {
                rollback_quietly(tx, "apply_payment").await;
                Err(err)
            }
        }
    }

    /// Load a booking from committed state.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] if the booking is absent.
    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        Ok(self.store.find_booking(booking_id).await?)
    }

    /// List bookings matching `filter` from committed state.
    ///
    /// # Errors
    ///
    /// [`BookingError::Store`] on backend failure.
    pub async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, BookingError> {
        Ok(self.store.list_bookings(filter).await?)
    }
}

/// Roll back and log instead of masking the original coordinator failure.
async fn rollback_quietly<T: StoreTx>(tx: T, op: &str) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(operation = op, error = %err, "rollback failed");
    }
}
