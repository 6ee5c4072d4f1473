//! Sample aggregates and events shared by integration tests.

use std::sync::LazyLock;

use chronicle_core::aggregate::{AggregateRoot, AggregateState, ApplyHandlers, Blank};
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::event::{DomainEvent, Event};
use chronicle_core::identity::AggregateId;
use serde::{Deserialize, Serialize};

/// A counter came into existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {}

impl DomainEvent for Created {}

/// A counter moved by `by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incremented {
    /// Amount added.
    pub by: i64,
}

impl DomainEvent for Incremented {}

/// A counter was given a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labelled {
    /// The new label.
    pub label: String,
}

impl DomainEvent for Labelled {}

/// Minimal aggregate for repository and store tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    state: AggregateState,
    /// Whether `Created` has been applied.
    pub created: bool,
    /// Sum of all increments.
    pub total: i64,
    /// Latest label, if any.
    pub label: Option<String>,
}

impl Counter {
    /// Starts a new counter with the given identity.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while recording `Created`.
    pub fn create(id: impl Into<AggregateId>, clock: &dyn Clock) -> Result<Self, DomainError> {
        let mut counter = Self::empty();
        counter.record(Event::occurred(id.into(), &Created {}, clock)?)?;
        Ok(counter)
    }

    /// Records an `Incremented` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnidentifiedAggregate` if the counter was never
    /// created, or any error raised while recording.
    pub fn increment(&mut self, by: i64, clock: &dyn Clock) -> Result<(), DomainError> {
        let id = self.identity()?;
        self.record(Event::occurred(id, &Incremented { by }, clock)?)
    }

    /// Records a `Labelled` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnidentifiedAggregate` if the counter was never
    /// created, or any error raised while recording.
    pub fn label(&mut self, label: impl Into<String>, clock: &dyn Clock) -> Result<(), DomainError> {
        let id = self.identity()?;
        self.record(Event::occurred(
            id,
            &Labelled {
                label: label.into(),
            },
            clock,
        )?)
    }

    fn identity(&self) -> Result<AggregateId, DomainError> {
        self.aggregate_id()
            .cloned()
            .ok_or(DomainError::UnidentifiedAggregate {
                aggregate_type: Self::aggregate_type(),
            })
    }

    fn empty() -> Self {
        Self {
            state: AggregateState::new(),
            created: false,
            total: 0,
            label: None,
        }
    }
}

impl AggregateRoot for Counter {
    fn blank(_token: Blank) -> Self {
        Self::empty()
    }

    fn state(&self) -> &AggregateState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AggregateState {
        &mut self.state
    }

    fn apply_handlers() -> &'static ApplyHandlers<Self> {
        static HANDLERS: LazyLock<ApplyHandlers<Counter>> = LazyLock::new(|| {
            ApplyHandlers::new()
                .on(|counter: &mut Counter, _: Created| counter.created = true)
                .on(|counter: &mut Counter, event: Incremented| counter.total += event.by)
                .on(|counter: &mut Counter, event: Labelled| {
                    counter.label = Some(event.label);
                })
        });
        &HANDLERS
    }
}

/// A ledger was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opened {}

impl DomainEvent for Opened {}

/// A second aggregate type, for tests that mix types on one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    state: AggregateState,
    /// Whether `Opened` has been applied.
    pub open: bool,
}

impl Ledger {
    /// Opens a new ledger with the given identity.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while recording `Opened`.
    pub fn open(id: impl Into<AggregateId>, clock: &dyn Clock) -> Result<Self, DomainError> {
        let mut ledger = Self {
            state: AggregateState::new(),
            open: false,
        };
        ledger.record(Event::occurred(id.into(), &Opened {}, clock)?)?;
        Ok(ledger)
    }
}

impl AggregateRoot for Ledger {
    fn blank(_token: Blank) -> Self {
        Self {
            state: AggregateState::new(),
            open: false,
        }
    }

    fn state(&self) -> &AggregateState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AggregateState {
        &mut self.state
    }

    fn apply_handlers() -> &'static ApplyHandlers<Self> {
        static HANDLERS: LazyLock<ApplyHandlers<Ledger>> =
            LazyLock::new(|| ApplyHandlers::new().on(|ledger: &mut Ledger, _: Opened| ledger.open = true));
        &HANDLERS
    }
}
