//! Batch aggregate: seat inventory and sale-window rules for one scheduled
//! course instance.
//!
//! The batch is the contended row in the system. It is mutated only through
//! [`Batch::reserve`] (take one seat) and [`Batch::allocate`] (give seats back),
//! and every mutation is persisted through a version-guarded conditional write.
//!
//! A batch with `max_seats <= 0` has unlimited capacity: availability always
//! passes and `available_seats` is never touched.

use crate::error::BookingError;
use crate::types::{BatchId, CourseId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication status of a batch. Only published batches are bookable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Not yet visible for sale.
    #[default]
    Draft,
    /// Open for booking.
    Published,
    /// Withdrawn from sale.
    Archived,
}

impl BatchStatus {
    /// Integer code as persisted in the `status` column.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Draft => 0,
            Self::Published => 1,
            Self::Archived => 2,
        }
    }

    /// Decode a persisted status code, falling back to `Draft` for unknown values.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        match code {
            1 => Self::Published,
            2 => Self::Archived,
            _ => Self::Draft,
        }
    }
}

/// One scheduled, bookable instance of a course, with its own seat inventory
/// and sale window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Unique identifier.
    pub id: BatchId,
    /// The course this batch belongs to.
    pub course_id: CourseId,
    /// Display name.
    pub name: String,
    /// Total capacity; `<= 0` means unlimited.
    pub max_seats: i32,
    /// Seats currently available for reservation.
    pub available_seats: i32,
    /// Seat price.
    pub price: f64,
    /// ISO currency code for the price.
    pub currency: String,
    /// Publication status.
    pub status: BatchStatus,
    /// Sale window start.
    pub start_date: Option<DateTime<Utc>>,
    /// Sale window end; sales past this instant fail.
    pub end_date: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-lock counter.
    pub version: Version,
}

impl Batch {
    /// Whether this batch enforces a seat count.
    #[must_use]
    pub const fn has_limited_seats(&self) -> bool {
        self.max_seats > 0
    }

    /// Check that the batch can currently sell a seat.
    ///
    /// Always succeeds for unlimited batches. For limited batches the check
    /// fails with [`BookingError::ClassSoldOut`] when no seat is left, and with
    /// [`BookingError::ClassNotAvailableForSale`] when the sale window's end
    /// date has passed.
    ///
    /// # Errors
    ///
    /// See above; `available` never mutates the batch.
    pub fn available(&self, now: DateTime<Utc>) -> Result<(), BookingError> {
        if !self.has_limited_seats() {
            return Ok(());
        }
        if self.available_seats == 0 {
            return Err(BookingError::ClassSoldOut);
        }
        if self.end_date.is_some_and(|end| now > end) {
            return Err(BookingError::ClassNotAvailableForSale);
        }
        Ok(())
    }

    /// Take one seat.
    ///
    /// Availability failures are reported uniformly as
    /// [`BookingError::ClassNotAvailableForSale`], matching the coarser error
    /// the sale surface exposes once a reservation is in flight.
    ///
    /// # Errors
    ///
    /// - [`BookingError::ClassNotAvailableForSale`] if [`Self::available`] fails
    /// - [`BookingError::NotEnoughSeats`] if the decrement would go negative
    pub fn reserve(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.available(now).is_err() {
            return Err(BookingError::ClassNotAvailableForSale);
        }
        if self.has_limited_seats() {
            if self.available_seats < 1 {
                return Err(BookingError::NotEnoughSeats);
            }
            self.available_seats -= 1;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Give `seats` seats back to the pool. No-op for unlimited batches.
    ///
    /// The increment is clamped to `max_seats`, so repeated releases can never
    /// push inventory past capacity.
    pub fn allocate(&mut self, seats: i32, now: DateTime<Utc>) {
        if self.has_limited_seats() {
            self.available_seats = (self.available_seats + seats).min(self.max_seats);
            self.updated_at = now;
        }
    }

    /// Bump the version after the store confirmed a conditional write.
    pub const fn mark_persisted(&mut self) {
        self.version = self.version.next();
    }
}
