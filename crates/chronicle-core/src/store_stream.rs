//! Stream locator: which append-only log an operation addresses.

use std::fmt;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::identity::AggregateId;

/// Identifies one aggregate's event log by aggregate type and identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreStream {
    aggregate_type: String,
    aggregate_id: AggregateId,
}

impl StoreStream {
    /// Locator for aggregate type `A` with the given identity.
    #[must_use]
    pub fn of<A: AggregateRoot>(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_type: A::aggregate_type().to_owned(),
            aggregate_id,
        }
    }

    /// Locator built from a raw type name, as read back from storage.
    #[must_use]
    pub fn from_parts(aggregate_type: impl Into<String>, aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id,
        }
    }

    /// Locator for an existing aggregate instance.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnidentifiedAggregate` if the aggregate has no
    /// identity yet.
    pub fn for_aggregate<A: AggregateRoot>(aggregate: &A) -> Result<Self, DomainError> {
        let aggregate_id =
            aggregate
                .aggregate_id()
                .cloned()
                .ok_or(DomainError::UnidentifiedAggregate {
                    aggregate_type: A::aggregate_type(),
                })?;
        Ok(Self::of::<A>(aggregate_id))
    }

    /// The aggregate type name.
    #[must_use]
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// The aggregate identity.
    #[must_use]
    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    /// Key under which stores file this stream.
    #[must_use]
    pub fn stream_id(&self) -> &str {
        self.aggregate_id.as_str()
    }

    /// Checks that `A` is the aggregate type this stream declares.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::WrongAggregateType` on mismatch.
    pub fn ensure_type<A: AggregateRoot>(&self) -> Result<(), DomainError> {
        if self.aggregate_type == A::aggregate_type() {
            Ok(())
        } else {
            Err(DomainError::WrongAggregateType {
                expected: self.aggregate_type.clone(),
                actual: A::aggregate_type().to_owned(),
            })
        }
    }
}

impl fmt::Display for StoreStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.aggregate_type, self.aggregate_id)
    }
}
