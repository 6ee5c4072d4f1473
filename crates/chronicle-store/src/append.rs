//! Admission check shared by the concrete stores' append paths.

use chronicle_core::error::DomainError;
use chronicle_core::event::Event;
use chronicle_core::event_store::ensure_contiguous;
use chronicle_core::store_stream::StoreStream;
use chronicle_core::version::Version;

/// Decides whether `events` may be appended to a stream at `current`.
///
/// A batch whose first version is already taken lost a race with another
/// writer and is a `ConcurrencyConflict`; any other gap or reordering is an
/// `OutOfSequence` bug in the caller.
pub(crate) fn admit(
    stream: &StoreStream,
    current: Version,
    events: &[Event],
) -> Result<(), DomainError> {
    if let Some(first) = events.first() {
        let first = first.aggregate_version();
        if !first.is_zero() && first <= current {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: stream.aggregate_id().clone(),
                expected: first.previous()?,
                actual: current,
            });
        }
    }
    ensure_contiguous(stream.aggregate_id(), current, events)
}
