//! Booking aggregate: the reservation's state machine and billing metadata.
//!
//! A booking references exactly one course and one batch by id; it owns nothing
//! but its embedded [`Customer`]. State transitions mutate the aggregate in
//! memory only — persistence happens separately through the version-guarded
//! store writes, and a rolled-back transaction leaves no trace of them.

use crate::batch::Batch;
use crate::catalog::Course;
use crate::error::BookingError;
use crate::types::{BatchId, BookingId, CourseId, Customer, Version};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a reserved seat is held before the booking may be expired.
#[must_use]
pub fn hold_duration() -> Duration {
    Duration::minutes(10)
}

/// Lifecycle status of a booking.
///
/// `Completed`, `Failed` and `Expired` are terminal for the reservation flow.
/// The payment transitions are deliberately re-enterable so that gateway
/// retries can replay their callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Booking exists but holds no seat yet.
    Created,
    /// A seat is held until `expired_at`.
    Reserved,
    /// Payment arrived; the seat is kept.
    Completed,
    /// Payment failed.
    Failed,
    /// The hold lapsed and the seat was returned.
    Expired,
}

impl BookingStatus {
    /// Integer code as persisted in the `status` column (0 is reserved for
    /// unknown and never written).
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Created => 1,
            Self::Reserved => 2,
            Self::Completed => 3,
            Self::Failed => 4,
            Self::Expired => 5,
        }
    }

    /// Decode a persisted status code.
    #[must_use]
    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Created),
            2 => Some(Self::Reserved),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            5 => Some(Self::Expired),
            _ => None,
        }
    }

    /// Whether the reservation flow can no longer touch this booking.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

/// A customer's reservation of one seat in a course batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Unique identifier, immutable after creation.
    pub id: BookingId,
    /// Referenced course (read-only foreign key).
    pub course_id: CourseId,
    /// Referenced batch (read-only foreign key).
    pub batch_id: BatchId,
    /// Price copied from the batch at creation time.
    pub price: f64,
    /// Currency copied from the batch at creation time.
    pub currency: String,
    /// Current lifecycle status.
    pub status: BookingStatus,
    /// When the seat was reserved.
    pub reserved_at: Option<DateTime<Utc>>,
    /// When the hold lapses (`reserved_at` + hold duration while Reserved).
    pub expired_at: Option<DateTime<Utc>>,
    /// When payment completed.
    pub paid_at: Option<DateTime<Utc>>,
    /// When payment failed.
    pub failed_at: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Payment method chosen by the customer.
    pub payment_type: Option<String>,
    /// Invoice issued by the billing collaborator.
    pub invoice_number: Option<String>,
    /// Optimistic-lock counter.
    pub version: Version,
    /// Embedded customer contact details.
    pub customer: Customer,
}

impl Booking {
    /// Create a new booking for a seat in `batch` of `course`, in status
    /// `Created` with the batch's price and currency.
    #[must_use]
    pub fn for_batch(course: &Course, batch: &Batch, now: DateTime<Utc>) -> Self {
        Self {
            id: BookingId::new(),
            course_id: course.id,
            batch_id: batch.id,
            price: batch.price,
            currency: batch.currency.clone(),
            status: BookingStatus::Created,
            reserved_at: None,
            expired_at: None,
            paid_at: None,
            failed_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            payment_type: None,
            invoice_number: None,
            version: Version::new(0),
            customer: Customer::default(),
        }
    }

    /// Attach customer details (builder style).
    #[must_use]
    pub fn with_customer(mut self, customer: Customer) -> Self {
        self.customer = customer;
        self
    }

    /// Take a seat in `batch` and start the hold window.
    ///
    /// Re-entry from `Reserved` is permitted: the reservation coordinator
    /// re-runs this transition against a freshly loaded batch after every
    /// write conflict. Re-entry from a terminal status is rejected.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidStateTransition`] from a terminal status
    /// - availability errors from [`Batch::available`]
    /// - seat errors from [`Batch::reserve`]
    pub fn reserve(&mut self, batch: &mut Batch, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status.is_terminal() {
            return Err(BookingError::InvalidStateTransition(format!(
                "cannot reserve booking in status {:?}",
                self.status
            )));
        }
        batch.available(now)?;
        batch.reserve(now)?;
        self.status = BookingStatus::Reserved;
        self.reserved_at = Some(now);
        self.expired_at = Some(now + hold_duration());
        self.updated_at = now;
        Ok(())
    }

    /// Record a successful payment. Clears any previous failure mark.
    pub fn complete_payment(&mut self, paid_at: DateTime<Utc>) {
        self.status = BookingStatus::Completed;
        self.paid_at = Some(paid_at);
        self.failed_at = None;
        self.updated_at = paid_at;
    }

    /// Record a failed payment. Clears any previous payment mark.
    pub fn fail_payment(&mut self, failed_at: DateTime<Utc>) {
        self.status = BookingStatus::Failed;
        self.failed_at = Some(failed_at);
        self.paid_at = None;
        self.updated_at = failed_at;
    }

    /// Switch the payment method and void the invoice issued for the previous
    /// one. Not a state transition; callable regardless of status.
    pub fn update_payment(&mut self, payment_type: impl Into<String>) {
        self.payment_type = Some(payment_type.into());
        self.invoice_number = None;
    }

    /// Expire the booking so its seat can be released.
    ///
    /// # Errors
    ///
    /// - [`BookingError::AlreadyExpired`] if the booking is already expired
    /// - [`BookingError::InvalidStateTransition`] if it is completed or failed
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status == BookingStatus::Expired {
            return Err(BookingError::AlreadyExpired);
        }
        if matches!(self.status, BookingStatus::Completed | BookingStatus::Failed) {
            return Err(BookingError::InvalidStateTransition(
                "booking already completed".to_string(),
            ));
        }
        self.status = BookingStatus::Expired;
        self.updated_at = now;
        Ok(())
    }

    /// Bump the version after the store confirmed a conditional write.
    pub const fn mark_persisted(&mut self) {
        self.version = self.version.next();
    }
}
