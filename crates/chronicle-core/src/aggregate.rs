//! Aggregate root abstraction.
//!
//! An aggregate is rebuilt by replaying its events in version order and
//! changes only by recording new events. Both paths run every event through
//! the aggregate's [`ApplyHandlers`] table, keyed by a handler name derived
//! from the event type (`UserCreated` -> `applyUserCreated`).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::event::{DomainEvent, Event, short_type_name};
use crate::identity::AggregateId;
use crate::stream::EventStream;
use crate::version::Version;

/// Derives the apply-handler name for an event type discriminator.
///
/// Module or namespace qualification (`::`, `\`, `.`) is stripped, `_`, `-`
/// and whitespace separate words, and each word is title-cased behind an
/// `apply` prefix: `narrative.beat_advanced` becomes `applyBeatAdvanced`.
#[must_use]
pub fn handler_name(event_type: &str) -> String {
    let unqualified = event_type
        .rsplit(|c: char| c == ':' || c == '\\' || c == '.')
        .next()
        .unwrap_or(event_type);
    let mut name = String::from("apply");
    for word in unqualified
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name
}

type Handler<A> = Box<dyn Fn(&mut A, &Event) -> Result<(), DomainError> + Send + Sync>;

/// Registration table mapping event types to an aggregate's apply handlers.
///
/// Built once per aggregate type, typically in a `LazyLock` static returned
/// from [`AggregateRoot::apply_handlers`].
pub struct ApplyHandlers<A> {
    handlers: HashMap<String, Handler<A>>,
}

impl<A: 'static> ApplyHandlers<A> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for the typed domain event `E`.
    #[must_use]
    pub fn on<E, F>(mut self, handler: F) -> Self
    where
        E: DomainEvent,
        F: Fn(&mut A, E) + Send + Sync + 'static,
    {
        self.handlers.insert(
            handler_name(E::event_type()),
            Box::new(move |aggregate: &mut A, event: &Event| {
                handler(aggregate, event.payload_as::<E>()?);
                Ok(())
            }),
        );
        self
    }

    /// Registers a handler that receives the raw event.
    #[must_use]
    pub fn on_raw<F>(mut self, event_type: &str, handler: F) -> Self
    where
        F: Fn(&mut A, &Event) + Send + Sync + 'static,
    {
        self.handlers.insert(
            handler_name(event_type),
            Box::new(move |aggregate: &mut A, event: &Event| {
                handler(aggregate, event);
                Ok(())
            }),
        );
        self
    }

    /// Returns `true` if a handler exists for `event_type`.
    #[must_use]
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(&handler_name(event_type))
    }

    /// Applies `event` to `aggregate` through its registered handler.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoApplyHandler` if nothing is registered for the
    /// event type, or `DomainError::Payload` if a typed handler cannot decode
    /// the payload.
    pub fn dispatch(&self, aggregate: &mut A, event: &Event) -> Result<(), DomainError> {
        let name = handler_name(event.event_type());
        match self.handlers.get(&name) {
            Some(handler) => handler(aggregate, event),
            None => Err(DomainError::NoApplyHandler {
                handler: name,
                event_type: event.event_type().to_owned(),
            }),
        }
    }
}

impl<A: 'static> Default for ApplyHandlers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for ApplyHandlers<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ApplyHandlers")
            .field("handlers", &names)
            .finish()
    }
}

/// Identity, version and pending events shared by every aggregate.
///
/// Concrete aggregates embed one of these and expose it through
/// [`AggregateRoot::state`]. Pending events are never serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateState {
    id: Option<AggregateId>,
    version: Version,
    #[serde(skip)]
    recorded: Vec<Event>,
}

impl AggregateState {
    /// State of a brand-new aggregate: no identity, version 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The aggregate identity, once assigned.
    #[must_use]
    pub fn id(&self) -> Option<&AggregateId> {
        self.id.as_ref()
    }

    /// The current version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Assigns the identity. Reassigning the same identity is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IdentityAlreadyAssigned` if a different identity
    /// is already held.
    pub fn assign_identity(&mut self, id: AggregateId) -> Result<(), DomainError> {
        match &self.id {
            Some(current) if *current != id => Err(DomainError::IdentityAlreadyAssigned {
                current: current.clone(),
                attempted: id,
            }),
            Some(_) => Ok(()),
            None => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    fn check_identity(&self, event: &Event) -> Result<(), DomainError> {
        match &self.id {
            Some(current) if current != event.aggregate_id() => {
                Err(DomainError::IdentityAlreadyAssigned {
                    current: current.clone(),
                    attempted: event.aggregate_id().clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn advance(&mut self, event: &Event, version: Version) {
        if self.id.is_none() {
            self.id = Some(event.aggregate_id().clone());
        }
        self.version = version;
    }
}

/// Capability token for building an aggregate with no history.
///
/// Only this crate can create one, so blank aggregates come into existence
/// solely through [`AggregateRoot::reconstitute`].
#[derive(Debug)]
pub struct Blank(());

/// Trait for aggregate roots that reconstitute from event history.
///
/// Implementors supply the state component, a blank constructor and the
/// apply-handler table; replay, recording and buffer management are
/// provided and are not meant to be overridden.
pub trait AggregateRoot: Clone + Send + Sync + Sized + 'static {
    /// Stable type name, used in stream locators and serialized snapshots.
    #[must_use]
    fn aggregate_type() -> &'static str {
        short_type_name::<Self>()
    }

    /// Builds an aggregate with no identity and no history.
    fn blank(token: Blank) -> Self;

    /// Shared identity/version/pending-events state.
    fn state(&self) -> &AggregateState;

    /// Mutable access to the shared state.
    fn state_mut(&mut self) -> &mut AggregateState;

    /// The apply-handler table for this aggregate type.
    fn apply_handlers() -> &'static ApplyHandlers<Self>;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Option<&AggregateId> {
        self.state().id()
    }

    /// Returns the current version (number of events applied).
    fn version(&self) -> Version {
        self.state().version()
    }

    /// Returns events recorded but not yet persisted.
    fn recorded_events(&self) -> &[Event] {
        &self.state().recorded
    }

    /// Returns `true` while recorded events await persistence.
    fn has_pending_events(&self) -> bool {
        !self.state().recorded.is_empty()
    }

    /// Discards recorded events.
    fn clear_recorded_events(&mut self) {
        self.state_mut().recorded.clear();
    }

    /// Takes recorded events out of the aggregate.
    fn collect_recorded_events(&mut self) -> EventStream {
        EventStream::from_events(std::mem::take(&mut self.state_mut().recorded))
    }

    /// Rebuilds an aggregate from its complete history.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyEventStream` if `events` is empty, or any
    /// error raised by [`AggregateRoot::replay`].
    fn reconstitute(events: &mut EventStream) -> Result<Self, DomainError> {
        if events.count() == 0 {
            return Err(DomainError::EmptyEventStream {
                aggregate_type: Self::aggregate_type(),
            });
        }
        let mut aggregate = Self::blank(Blank(()));
        aggregate.replay(events)?;
        if aggregate.version().is_zero() {
            return Err(DomainError::EmptyEventStream {
                aggregate_type: Self::aggregate_type(),
            });
        }
        Ok(aggregate)
    }

    /// Applies persisted events on top of the current state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::VersionMismatch` if an event does not directly
    /// follow the aggregate's version, or any error raised while applying it.
    fn replay(&mut self, events: &mut EventStream) -> Result<(), DomainError> {
        events.rewind();
        while events.valid() {
            let event = events.current()?;
            let expected = self.version().next();
            if event.aggregate_version() != expected {
                return Err(DomainError::VersionMismatch {
                    expected,
                    actual: event.aggregate_version(),
                });
            }
            self.state().check_identity(event)?;
            self.apply_event(event)?;
            self.state_mut().advance(event, expected);
            events.advance();
        }
        tracing::trace!(
            aggregate_type = Self::aggregate_type(),
            version = %self.version(),
            "replayed event stream"
        );
        Ok(())
    }

    /// Applies a new event and buffers its versioned copy for persistence.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OnlyNewEventsRecordable` if the event already has
    /// a version, or any error raised while applying it. The aggregate is
    /// unchanged on error.
    fn record(&mut self, event: Event) -> Result<(), DomainError> {
        if !event.aggregate_version().is_zero() {
            return Err(DomainError::OnlyNewEventsRecordable {
                event_type: event.event_type().to_owned(),
                version: event.aggregate_version(),
            });
        }
        self.state().check_identity(&event)?;
        let version = self.version().next();
        let versioned = event.with_version(version)?;
        self.apply_event(&event)?;
        let state = self.state_mut();
        state.advance(&event, version);
        state.recorded.push(versioned);
        Ok(())
    }

    /// Routes an event to its apply handler.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoApplyHandler` for unregistered event types.
    fn apply_event(&mut self, event: &Event) -> Result<(), DomainError> {
        Self::apply_handlers().dispatch(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::testing::{Incremented, Opened, Reset, Tally, persisted};

    #[test]
    fn test_handler_name_normalizes_event_types() {
        assert_eq!(handler_name("UserCreated"), "applyUserCreated");
        assert_eq!(handler_name("user_created"), "applyUserCreated");
        assert_eq!(handler_name("narrative.beat_advanced"), "applyBeatAdvanced");
        assert_eq!(handler_name("app::events::UserCreated"), "applyUserCreated");
        assert_eq!(handler_name("App\\Event\\user-created"), "applyUserCreated");
    }

    #[test]
    fn test_record_advances_version_and_buffers_versioned_copies() {
        // Arrange
        let mut tally = Tally::open("T1");

        // Act
        tally.increment(2).unwrap();
        tally.increment(3).unwrap();

        // Assert
        assert_eq!(tally.version(), Version::new(3));
        assert_eq!(tally.total, 5);
        assert_eq!(tally.aggregate_id(), Some(&AggregateId::new("T1")));
        let versions: Vec<u64> = tally
            .recorded_events()
            .iter()
            .map(|event| event.aggregate_version().value())
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_reconstitute_from_recorded_events_matches_original() {
        // Arrange
        let mut original = Tally::open("T1");
        original.increment(4).unwrap();
        let mut stream = EventStream::from_events(original.recorded_events().to_vec());

        // Act
        let rebuilt = Tally::reconstitute(&mut stream).unwrap();

        // Assert
        assert_eq!(rebuilt.version(), original.version());
        assert_eq!(rebuilt.total, original.total);
        assert_eq!(rebuilt.opened, original.opened);
        assert_eq!(rebuilt.aggregate_id(), original.aggregate_id());
        assert!(!rebuilt.has_pending_events());
    }

    #[test]
    fn test_reconstitute_rejects_empty_stream() {
        let result = Tally::reconstitute(&mut EventStream::empty());

        match result {
            Err(DomainError::EmptyEventStream { aggregate_type }) => {
                assert_eq!(aggregate_type, "Tally");
            }
            other => panic!("expected EmptyEventStream, got {other:?}"),
        }
    }

    #[test]
    fn test_replay_detects_version_gap() {
        let mut stream = EventStream::from_events(vec![
            persisted("T1", 1, &Opened {}),
            persisted("T1", 5, &Incremented { by: 1 }),
        ]);

        let result = Tally::reconstitute(&mut stream);

        match result {
            Err(DomainError::VersionMismatch { expected, actual }) => {
                assert_eq!(expected, Version::new(2));
                assert_eq!(actual, Version::new(5));
            }
            other => panic!("expected VersionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_replay_applies_delta_on_top_of_existing_state() {
        let mut tally = Tally::open("T1");
        tally.clear_recorded_events();
        let mut delta = EventStream::from_events(vec![
            persisted("T1", 2, &Incremented { by: 7 }),
            persisted("T1", 3, &Incremented { by: 1 }),
        ]);

        tally.replay(&mut delta).unwrap();

        assert_eq!(tally.version(), Version::new(3));
        assert_eq!(tally.total, 8);
    }

    #[test]
    fn test_replay_rejects_events_of_another_aggregate() {
        let mut tally = Tally::open("T1");
        let mut delta = EventStream::from_events(vec![persisted("T2", 2, &Incremented { by: 1 })]);

        let result = tally.replay(&mut delta);

        assert!(matches!(
            result,
            Err(DomainError::IdentityAlreadyAssigned { .. })
        ));
        assert_eq!(tally.version(), Version::FIRST);
    }

    #[test]
    fn test_record_rejects_versioned_event() {
        let mut tally = Tally::open("T1");

        let result = tally.record(persisted("T1", 2, &Incremented { by: 1 }));

        assert!(matches!(
            result,
            Err(DomainError::OnlyNewEventsRecordable { .. })
        ));
        assert_eq!(tally.version(), Version::FIRST);
    }

    #[test]
    fn test_unregistered_event_names_handler_and_type() {
        // Arrange
        let mut tally = Tally::open("T1");
        let event = Event::occurred(AggregateId::new("T1"), &Reset {}, &SystemClock).unwrap();

        // Act
        let result = tally.record(event);

        // Assert
        match result {
            Err(DomainError::NoApplyHandler {
                handler,
                event_type,
            }) => {
                assert_eq!(handler, "applyReset");
                assert_eq!(event_type, "Reset");
            }
            other => panic!("expected NoApplyHandler, got {other:?}"),
        }
        assert_eq!(tally.version(), Version::FIRST);
        assert_eq!(tally.recorded_events().len(), 1);
    }

    #[test]
    fn test_collect_returns_and_clears_buffer() {
        let mut tally = Tally::open("T1");
        tally.increment(1).unwrap();

        let mut collected = tally.collect_recorded_events();

        assert_eq!(collected.count(), 2);
        assert!(!tally.has_pending_events());
        assert_eq!(tally.version(), Version::new(2));
    }

    #[test]
    fn test_clear_discards_buffer_without_touching_version() {
        let mut tally = Tally::open("T1");

        tally.clear_recorded_events();

        assert!(tally.recorded_events().is_empty());
        assert_eq!(tally.version(), Version::FIRST);
    }

    #[test]
    fn test_assign_identity_only_once() {
        let mut state = AggregateState::new();

        state.assign_identity(AggregateId::new("T1")).unwrap();
        state.assign_identity(AggregateId::new("T1")).unwrap();
        let result = state.assign_identity(AggregateId::new("T2"));

        assert!(matches!(
            result,
            Err(DomainError::IdentityAlreadyAssigned { .. })
        ));
        assert_eq!(state.id(), Some(&AggregateId::new("T1")));
    }
}
