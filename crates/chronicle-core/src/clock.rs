//! Clock abstraction for determinism.

use chrono::{DateTime, FixedOffset, Utc};

/// Abstraction over system time for deterministic behavior.
///
/// Implementations may report the instant in any offset; events normalize it
/// to UTC when they are created.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().fixed_offset()
    }
}
