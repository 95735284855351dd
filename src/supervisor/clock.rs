//! Monotonic millisecond time source

use std::time::Instant;

/// Monotonic clock in milliseconds since an arbitrary origin
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Clock backed by [`Instant`], with the origin at construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
