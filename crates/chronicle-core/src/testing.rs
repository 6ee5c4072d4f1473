//! Fixtures shared by this crate's unit tests.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateRoot, AggregateState, ApplyHandlers, Blank};
use crate::clock::SystemClock;
use crate::error::DomainError;
use crate::event::{DomainEvent, Event};
use crate::identity::AggregateId;
use crate::version::Version;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Opened {}

impl DomainEvent for Opened {}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Incremented {
    pub(crate) by: u32,
}

impl DomainEvent for Incremented {}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Reset {}

impl DomainEvent for Reset {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Tally {
    pub(crate) state: AggregateState,
    pub(crate) opened: bool,
    pub(crate) total: u32,
}

impl Tally {
    pub(crate) fn open(id: &str) -> Self {
        let mut tally = Self {
            state: AggregateState::new(),
            opened: false,
            total: 0,
        };
        tally
            .record(Event::occurred(AggregateId::new(id), &Opened {}, &SystemClock).unwrap())
            .unwrap();
        tally
    }

    pub(crate) fn increment(&mut self, by: u32) -> Result<(), DomainError> {
        let id = self.aggregate_id().cloned().unwrap();
        self.record(Event::occurred(id, &Incremented { by }, &SystemClock)?)
    }
}

impl AggregateRoot for Tally {
    fn blank(_token: Blank) -> Self {
        Self {
            state: AggregateState::new(),
            opened: false,
            total: 0,
        }
    }

    fn state(&self) -> &AggregateState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AggregateState {
        &mut self.state
    }

    fn apply_handlers() -> &'static ApplyHandlers<Self> {
        static HANDLERS: LazyLock<ApplyHandlers<Tally>> = LazyLock::new(|| {
            ApplyHandlers::new()
                .on(|tally: &mut Tally, _: Opened| tally.opened = true)
                .on(|tally: &mut Tally, event: Incremented| tally.total += event.by)
        });
        &HANDLERS
    }
}

/// Builds an event as it would be read back from a store.
pub(crate) fn persisted(id: &str, version: u64, event: &impl DomainEvent) -> Event {
    Event::occurred(AggregateId::new(id), event, &SystemClock)
        .unwrap()
        .with_version(Version::new(version))
        .unwrap()
}
