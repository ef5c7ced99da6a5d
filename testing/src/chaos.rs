//! Chaos fault injector for widening race windows in concurrency tests.
//!
//! The production coordinators never delay on their own; installing this
//! injector stalls them at the write points so interleavings that are rare in
//! practice show up reliably under test.

use course_booking_core::environment::{FaultInjector, FaultPoint};
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Sleeps for a random duration at injection points, with probability
/// `1 / one_in` per point.
#[derive(Debug, Clone, Copy)]
pub struct ChaosDelay {
    one_in: u32,
    max_delay: Duration,
}

impl ChaosDelay {
    /// Delay with probability `1 / one_in`, for up to `max_delay`.
    #[must_use]
    pub const fn new(one_in: u32, max_delay: Duration) -> Self {
        Self { one_in, max_delay }
    }
}

impl Default for ChaosDelay {
    // One injection point in five stalls, for up to 300ms.
    fn default() -> Self {
        Self::new(5, Duration::from_millis(300))
    }
}

impl FaultInjector for ChaosDelay {
    fn inject(&self, _point: FaultPoint) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        // Decide before the await so the RNG never crosses a suspension point.
        let delay = {
            let mut rng = rand::thread_rng();
            if rng.gen_range(0..self.one_in.max(1)) == 0 {
                let max_millis = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
                Some(Duration::from_millis(rng.gen_range(0..=max_millis)))
            } else {
                None
            }
        };
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        })
    }
}
