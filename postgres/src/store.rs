//! The sqlx-backed store and its transaction session.

use course_booking_core::batch::{Batch, BatchStatus};
use course_booking_core::booking::{Booking, BookingStatus};
use course_booking_core::catalog::{Course, CourseStatus};
use course_booking_core::store::{BookingFilter, BookingStore, StoreError, StoreTx};
use course_booking_core::types::{BatchId, BookingId, CourseId, Customer, Version};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;

use crate::config::PostgresConfig;

const BOOKING_COLUMNS: &str = "id, course_id, course_batch_id, price, currency, status, \
     reserved_at, expired_at, paid_at, failed_at, created_at, updated_at, deleted_at, \
     payment_type, invoice_number, version, cust_name, cust_email, cust_phone";

const BATCH_COLUMNS: &str = "id, course_id, name, max_seats, available_seats, price, currency, \
     status, start_date, end_date, created_at, updated_at, deleted_at, version";

/// Production booking store backed by a `PostgreSQL` connection pool.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Connect a new pool using the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pool cannot be established.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .connect(&config.url)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests hand one in from testcontainers).
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl BookingStore for PostgresBookingStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(PostgresTx { tx })
    }

    async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO bookings (
                id, course_id, course_batch_id, price, currency, status,
                created_at, updated_at, version, cust_name, cust_email, cust_phone
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.course_id.as_uuid())
        .bind(booking.batch_id.as_uuid())
        .bind(booking.price)
        .bind(&booking.currency)
        .bind(booking.status.as_i32())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.version.as_i64())
        .bind(&booking.customer.name)
        .bind(&booking.customer.email)
        .bind(&booking.customer.phone)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_err(e, "booking", booking.id.to_string()))?;
        Ok(())
    }

    async fn find_booking(&self, id: BookingId) -> Result<Booking, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map_or_else(
            || {
                Err(StoreError::NotFound {
                    entity: "booking",
                    id: id.to_string(),
                })
            },
            booking_from_row,
        )
    }

    async fn find_course(&self, id: CourseId) -> Result<Course, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, name, slug, description, status, published_at
            FROM courses
            WHERE id = $1 AND deleted_at IS NULL AND status = $2
            ",
        )
        .bind(id.as_uuid())
        .bind(CourseStatus::Published.as_i32())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map_or_else(
            || {
                Err(StoreError::NotFound {
                    entity: "course",
                    id: id.to_string(),
                })
            },
            course_from_row,
        )
    }

    async fn find_batch(&self, id: BatchId) -> Result<Batch, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BATCH_COLUMNS} FROM course_batches \
             WHERE id = $1 AND deleted_at IS NULL AND status = $2"
        ))
        .bind(id.as_uuid())
        .bind(BatchStatus::Published.as_i32())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map_or_else(
            || {
                Err(StoreError::NotFound {
                    entity: "batch",
                    id: id.to_string(),
                })
            },
            batch_from_row,
        )
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE deleted_at IS NULL \
               AND ($1::int4 IS NULL OR status = $1) \
               AND ($2::text IS NULL OR invoice_number = $2) \
             ORDER BY created_at DESC \
             LIMIT $3 OFFSET $4"
        ))
        .bind(filter.status.map(BookingStatus::as_i32))
        .bind(filter.invoice_number.as_deref())
        .bind(filter.effective_limit())
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(booking_from_row).collect()
    }
}

/// One open transaction against the Postgres store.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl StoreTx for PostgresTx {
    async fn find_booking(&mut self, id: BookingId) -> Result<Booking, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.as_ref().map_or_else(
            || {
                Err(StoreError::NotFound {
                    entity: "booking",
                    id: id.to_string(),
                })
            },
            booking_from_row,
        )
    }

    async fn find_batch_for_course(
        &mut self,
        batch_id: BatchId,
        course_id: CourseId,
    ) -> Result<Batch, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BATCH_COLUMNS} FROM course_batches \
             WHERE id = $1 AND course_id = $2 AND deleted_at IS NULL AND status = $3"
        ))
        .bind(batch_id.as_uuid())
        .bind(course_id.as_uuid())
        .bind(BatchStatus::Published.as_i32())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.as_ref().map_or_else(
            || {
                Err(StoreError::NotFound {
                    entity: "batch",
                    id: batch_id.to_string(),
                })
            },
            batch_from_row,
        )
    }

    async fn find_course(&mut self, id: CourseId) -> Result<Course, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, name, slug, description, status, published_at
            FROM courses
            WHERE id = $1 AND deleted_at IS NULL AND status = $2
            ",
        )
        .bind(id.as_uuid())
        .bind(CourseStatus::Published.as_i32())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.as_ref().map_or_else(
            || {
                Err(StoreError::NotFound {
                    entity: "course",
                    id: id.to_string(),
                })
            },
            course_from_row,
        )
    }

    async fn find_batch(&mut self, id: BatchId) -> Result<Batch, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BATCH_COLUMNS} FROM course_batches \
             WHERE id = $1 AND deleted_at IS NULL AND status = $2"
        ))
        .bind(id.as_uuid())
        .bind(BatchStatus::Published.as_i32())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.as_ref().map_or_else(
            || {
                Err(StoreError::NotFound {
                    entity: "batch",
                    id: id.to_string(),
                })
            },
            batch_from_row,
        )
    }

    async fn update_booking_status(&mut self, booking: &Booking) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE bookings
            SET status = $1,
                reserved_at = $2,
                expired_at = $3,
                paid_at = $4,
                failed_at = $5,
                invoice_number = $6,
                updated_at = $7,
                version = version + 1
            WHERE id = $8 AND version = $9
            ",
        )
        .bind(booking.status.as_i32())
        .bind(booking.reserved_at)
        .bind(booking.expired_at)
        .bind(booking.paid_at)
        .bind(booking.failed_at)
        .bind(&booking.invoice_number)
        .bind(booking.updated_at)
        .bind(booking.id.as_uuid())
        .bind(booking.version.as_i64())
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        let affected = result.rows_affected();
        if affected == 0 {
            record_conflict("booking", &booking.id.to_string(), booking.version);
        }
        Ok(affected)
    }

    async fn update_booking_payment(&mut self, booking: &Booking) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE bookings
            SET paid_at = $1,
                invoice_number = $2,
                payment_type = $3,
                updated_at = $4,
                version = version + 1
            WHERE id = $5 AND version = $6
            ",
        )
        .bind(booking.paid_at)
        .bind(&booking.invoice_number)
        .bind(&booking.payment_type)
        .bind(booking.updated_at)
        .bind(booking.id.as_uuid())
        .bind(booking.version.as_i64())
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        let affected = result.rows_affected();
        if affected == 0 {
            record_conflict("booking", &booking.id.to_string(), booking.version);
        }
        Ok(affected)
    }

    async fn update_batch_available_seats(&mut self, batch: &Batch) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE course_batches
            SET available_seats = $1,
                updated_at = $2,
                version = version + 1
            WHERE id = $3 AND version = $4
            ",
        )
        .bind(batch.available_seats)
        .bind(batch.updated_at)
        .bind(batch.id.as_uuid())
        .bind(batch.version.as_i64())
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        let affected = result.rows_affected();
        if affected == 0 {
            record_conflict("batch", &batch.id.to_string(), batch.version);
        }
        Ok(affected)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_err)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(db_err)
    }
}

fn record_conflict(entity: &'static str, id: &str, expected: Version) {
    tracing::debug!(entity, id, expected_version = %expected, "conditional write affected zero rows");
    metrics::counter!("booking_store.optimistic_conflict", "entity" => entity).increment(1);
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn insert_err(err: sqlx::Error, entity: &'static str, id: String) -> StoreError {
    if err
        .as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
    {
        StoreError::Duplicate { entity, id }
    } else {
        db_err(err)
    }
}

fn booking_from_row(row: &PgRow) -> Result<Booking, StoreError> {
    let status_code: i32 = row.try_get("status").map_err(db_err)?;
    let status = BookingStatus::from_i32(status_code).ok_or_else(|| {
        StoreError::Database(format!("invalid booking status code {status_code}"))
    })?;

    Ok(Booking {
        id: BookingId::from_uuid(row.try_get("id").map_err(db_err)?),
        course_id: CourseId::from_uuid(row.try_get("course_id").map_err(db_err)?),
        batch_id: BatchId::from_uuid(row.try_get("course_batch_id").map_err(db_err)?),
        price: row.try_get("price").map_err(db_err)?,
        currency: row.try_get("currency").map_err(db_err)?,
        status,
        reserved_at: row.try_get("reserved_at").map_err(db_err)?,
        expired_at: row.try_get("expired_at").map_err(db_err)?,
        paid_at: row.try_get("paid_at").map_err(db_err)?,
        failed_at: row.try_get("failed_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
        deleted_at: row.try_get("deleted_at").map_err(db_err)?,
        payment_type: row.try_get("payment_type").map_err(db_err)?,
        invoice_number: row.try_get("invoice_number").map_err(db_err)?,
        version: Version::new(row.try_get("version").map_err(db_err)?),
        customer: Customer {
            name: row.try_get("cust_name").map_err(db_err)?,
            email: row.try_get("cust_email").map_err(db_err)?,
            phone: row.try_get("cust_phone").map_err(db_err)?,
        },
    })
}

fn batch_from_row(row: &PgRow) -> Result<Batch, StoreError> {
    Ok(Batch {
        id: BatchId::from_uuid(row.try_get("id").map_err(db_err)?),
        course_id: CourseId::from_uuid(row.try_get("course_id").map_err(db_err)?),
        name: row.try_get("name").map_err(db_err)?,
        max_seats: row.try_get("max_seats").map_err(db_err)?,
        available_seats: row.try_get("available_seats").map_err(db_err)?,
        price: row.try_get("price").map_err(db_err)?,
        currency: row.try_get("currency").map_err(db_err)?,
        status: BatchStatus::from_i32(row.try_get("status").map_err(db_err)?),
        start_date: row.try_get("start_date").map_err(db_err)?,
        end_date: row.try_get("end_date").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
        deleted_at: row.try_get("deleted_at").map_err(db_err)?,
        version: Version::new(row.try_get("version").map_err(db_err)?),
    })
}

fn course_from_row(row: &PgRow) -> Result<Course, StoreError> {
    Ok(Course {
        id: CourseId::from_uuid(row.try_get("id").map_err(db_err)?),
        name: row.try_get("name").map_err(db_err)?,
        slug: row.try_get("slug").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        status: CourseStatus::from_i32(row.try_get("status").map_err(db_err)?),
        published_at: row.try_get("published_at").map_err(db_err)?,
    })
}
