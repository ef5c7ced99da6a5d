//! Error taxonomy for the booking domain.
//!
//! Domain failures are [`BookingError`]; infrastructure failures from the store
//! are [`StoreError`](crate::store::StoreError) and propagate unchanged inside
//! the [`BookingError::Store`] variant, except for missing rows which map onto
//! [`BookingError::NotFound`]. Every coordinator failure rolls back the whole
//! transaction, so no variant ever describes partially persisted state.

use crate::store::StoreError;
use thiserror::Error;

/// Failures surfaced by the booking aggregates and coordinators.
#[derive(Error, Debug)]
pub enum BookingError {
    /// The batch has limited capacity and no seat is left.
    #[error("class is sold out")]
    ClassSoldOut,

    /// The batch's sale window has closed (or availability failed on reserve).
    #[error("class is not available for sale")]
    ClassNotAvailableForSale,

    /// The seat decrement would take available seats below zero.
    #[error("no seat available")]
    NotEnoughSeats,

    /// `expire` was invoked on a booking that is already expired.
    #[error("booking already expired")]
    AlreadyExpired,

    /// The requested transition is not legal from the booking's current status.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// The in-transaction reservation retry budget was exhausted by write
    /// conflicts on the batch row.
    #[error("reservation max retry exceeded")]
    ReservationRetryBudgetExceeded,

    /// The in-transaction seat release retry budget was exhausted.
    #[error("booking release max retry exceeded")]
    ReleaseRetryBudgetExceeded,

    /// A single-attempt conditional write lost its race. Never emitted from
    /// inside the bounded retry loops, which turn conflicts into reloads; the
    /// caller must re-submit the whole request.
    #[error("optimistic write conflict on {entity}")]
    OptimisticConflict {
        /// The row that was concurrently modified (`"booking"`).
        entity: &'static str,
    },

    /// The referenced booking, batch or course does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind (`"booking"`, `"batch"`, `"course"`).
        entity: &'static str,
        /// Identifier that missed.
        id: String,
    },

    /// Opaque infrastructure failure from the store.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_domain_not_found() {
        let err: BookingError = StoreError::NotFound {
            entity: "booking",
            id: "b-1".to_string(),
        }
        .into();
        assert!(matches!(err, BookingError::NotFound { entity: "booking", .. }));
    }

    #[test]
    fn database_errors_stay_opaque() {
        let err: BookingError = StoreError::Database("connection reset".to_string()).into();
        assert!(matches!(err, BookingError::Store(_)));
        assert!(err.to_string().contains("connection reset"));
    }
}
