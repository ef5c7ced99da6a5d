//! Identity and value types shared across the booking domain.
//!
//! All identities are newtype wrappers around [`uuid::Uuid`] so that a booking id
//! can never be passed where a batch id is expected. The [`Version`] counter is
//! the optimistic-lock token checked by every conditional write.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID (e.g. one read back from storage).
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// The underlying UUID value.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier of a booking.
    BookingId
}

uuid_id! {
    /// Unique identifier of a scheduled course batch.
    BatchId
}

uuid_id! {
    /// Unique identifier of a course.
    CourseId
}

/// Optimistic-lock counter carried by every mutable row.
///
/// A successful persisted mutation increments the version by exactly one; a
/// conditional write submitted with a stale version must affect zero rows.
///
/// # Examples
///
/// ```
/// use course_booking_core::types::Version;
///
/// let v = Version::new(0);
/// assert_eq!(v.next(), Version::new(1));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(i64);

impl Version {
    /// Create a version from its raw counter value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// The version after one successful persisted mutation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value, as stored in the `version` column.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Customer contact details embedded in a booking.
///
/// Owned exclusively by the booking; phone is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Full name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Optional phone number.
    pub phone: Option<String>,
}

impl Customer {
    /// Build a customer value, treating an empty phone as absent.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: Option<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.filter(|p| !p.is_empty()),
        }
    }
}
