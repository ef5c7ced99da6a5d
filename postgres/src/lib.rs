//! `PostgreSQL` implementation of the course-booking optimistic store.
//!
//! Implements the `BookingStore` / `StoreTx` contracts from
//! `course-booking-core` on top of sqlx:
//!
//! - Version-guarded conditional updates (`WHERE id = $1 AND version = $2`)
//!   reporting affected-row counts
//! - Transaction-scoped sessions backed by [`sqlx::Transaction`]
//! - Connection pooling configured from environment variables
//! - Soft-delete aware reads
//!
//! # Example
//!
//! ```ignore
//! use course_booking_postgres::{PostgresBookingStore, PostgresConfig};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresBookingStore::connect(&PostgresConfig::from_env()).await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod store;

pub use config::PostgresConfig;
pub use store::{PostgresBookingStore, PostgresTx};
