//! Read-only surface of the catalog collaborator.
//!
//! The booking core only ever looks courses up; listing, pagination and the
//! rest of the catalog live outside this crate.

use crate::types::CourseId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication status of a course.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseStatus {
    /// Not yet visible.
    #[default]
    Draft,
    /// Open for booking.
    Published,
    /// No longer offered.
    Archived,
}

impl CourseStatus {
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

/// A course as seen by the booking core: identity plus display metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Unique identifier.
    pub id: CourseId,
    /// Display name.
    pub name: String,
    /// URL-friendly identifier.
    pub slug: String,
    /// Marketing description.
    pub description: String,
    /// Publication status.
    pub status: CourseStatus,
    /// When the course went live.
    pub published_at: Option<DateTime<Utc>>,
}
