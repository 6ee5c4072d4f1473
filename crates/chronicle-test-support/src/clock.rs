//! Test clock: deterministic `Clock` implementation for tests.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use chronicle_core::clock::Clock;

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    /// A clock pinned to a UTC instant.
    #[must_use]
    pub fn utc(instant: DateTime<Utc>) -> Self {
        Self(instant.fixed_offset())
    }

    /// A clock pinned to `2024-01-01T00:00:00Z`.
    ///
    /// # Panics
    ///
    /// Never in practice; the literal timestamp is valid.
    #[must_use]
    pub fn epoch() -> Self {
        Self::utc(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .expect("valid timestamp literal"),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
