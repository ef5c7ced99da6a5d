//! Injected dependencies for the coordinators.
//!
//! The service takes its clock and (optionally) a fault injector as trait
//! objects so tests can pin time and widen race windows without touching the
//! production code path.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Clock abstraction for the coordinators.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where a fault may be injected inside a coordinator.
///
/// Both points sit between the in-memory mutation and the conditional write —
/// the widest window in which a concurrent writer can win the race.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Just before the conditional update of the batch row.
    BeforeBatchWrite,
    /// Just before the conditional update of the booking row.
    BeforeBookingWrite,
}

/// Test-only seam for delaying or perturbing coordinator execution.
///
/// Production never installs an injector; the chaos-delay implementation lives
/// in `course-booking-testing`. Returns a boxed future to stay dyn-compatible.
pub trait FaultInjector: Send + Sync {
    /// Run the injected fault for `point`, if any.
    fn inject(&self, point: FaultPoint) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
