//! Ordered, restartable event streams.
//!
//! An [`EventStream`] is a cursor over events: `current` / `advance` / `key` /
//! `valid` / `rewind`, plus `count`. It comes in three shapes: the empty
//! stream, a materialized vector, and a wrapper around an external
//! [`EventCursor`] such as a database result set.

use std::fmt;

use crate::error::DomainError;
use crate::event::Event;

/// An external, restartable source of events.
pub trait EventCursor: Send + fmt::Debug {
    /// The event under the cursor, or `None` once exhausted.
    fn current(&self) -> Option<&Event>;

    /// Moves to the next event.
    fn advance(&mut self);

    /// Position of the cursor, or `None` once exhausted.
    fn key(&self) -> Option<usize>;

    /// Moves back to the first event.
    fn rewind(&mut self);

    /// Constant-time count, if the source supports one.
    fn exact_count(&self) -> Option<usize> {
        None
    }
}

enum Inner {
    Empty,
    Materialized { events: Vec<Event>, position: usize },
    Cursor(Box<dyn EventCursor>),
}

/// An ordered, finite, restartable sequence of events.
pub struct EventStream {
    inner: Inner,
}

impl EventStream {
    /// The canonical stream with no events.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: Inner::Empty,
        }
    }

    /// A stream that owns its events.
    #[must_use]
    pub fn from_events(events: Vec<Event>) -> Self {
        Self {
            inner: Inner::Materialized {
                events,
                position: 0,
            },
        }
    }

    /// A stream over an external cursor.
    #[must_use]
    pub fn from_cursor(cursor: impl EventCursor + 'static) -> Self {
        Self {
            inner: Inner::Cursor(Box::new(cursor)),
        }
    }

    /// Returns the event under the cursor.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAggregateEvent` when the stream is empty
    /// or exhausted.
    pub fn current(&self) -> Result<&Event, DomainError> {
        let current = match &self.inner {
            Inner::Empty => {
                return Err(DomainError::InvalidAggregateEvent(
                    "current must not be called on an empty event stream".to_owned(),
                ));
            }
            Inner::Materialized { events, position } => events.get(*position),
            Inner::Cursor(cursor) => cursor.current(),
        };
        current.ok_or_else(|| {
            DomainError::InvalidAggregateEvent("event stream has no current event".to_owned())
        })
    }

    /// Moves to the next event.
    pub fn advance(&mut self) {
        match &mut self.inner {
            Inner::Empty => {}
            Inner::Materialized { events, position } => {
                if *position < events.len() {
                    *position += 1;
                }
            }
            Inner::Cursor(cursor) => cursor.advance(),
        }
    }

    /// Position of the cursor, or `None` once exhausted.
    #[must_use]
    pub fn key(&self) -> Option<usize> {
        match &self.inner {
            Inner::Empty => None,
            Inner::Materialized { events, position } => {
                (*position < events.len()).then_some(*position)
            }
            Inner::Cursor(cursor) => cursor.key(),
        }
    }

    /// Returns `true` while the cursor points at an event.
    #[must_use]
    pub fn valid(&self) -> bool {
        match &self.inner {
            Inner::Empty => false,
            Inner::Materialized { events, position } => *position < events.len(),
            Inner::Cursor(cursor) => cursor.current().is_some(),
        }
    }

    /// Moves back to the first event.
    pub fn rewind(&mut self) {
        match &mut self.inner {
            Inner::Empty => {}
            Inner::Materialized { position, .. } => *position = 0,
            Inner::Cursor(cursor) => cursor.rewind(),
        }
    }

    /// Number of events in the stream.
    ///
    /// Cursors without a constant-time count are walked once and then
    /// returned to the position they held before the call.
    pub fn count(&mut self) -> usize {
        match &mut self.inner {
            Inner::Empty => 0,
            Inner::Materialized { events, .. } => events.len(),
            Inner::Cursor(cursor) => {
                if let Some(count) = cursor.exact_count() {
                    return count;
                }
                let position = cursor.key();
                cursor.rewind();
                let mut count = 0;
                while cursor.current().is_some() {
                    count += 1;
                    cursor.advance();
                }
                cursor.rewind();
                while cursor.key() != position && cursor.current().is_some() {
                    cursor.advance();
                }
                count
            }
        }
    }

    /// Returns `true` if the stream holds no events.
    pub fn is_empty(&mut self) -> bool {
        self.count() == 0
    }

    /// Consumes the stream, returning its events in order.
    #[must_use]
    pub fn into_events(self) -> Vec<Event> {
        match self.inner {
            Inner::Empty => Vec::new(),
            Inner::Materialized { events, .. } => events,
            Inner::Cursor(mut cursor) => {
                cursor.rewind();
                let mut events = Vec::new();
                while let Some(event) = cursor.current() {
                    events.push(event.clone());
                    cursor.advance();
                }
                events
            }
        }
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Event>> for EventStream {
    fn from(events: Vec<Event>) -> Self {
        Self::from_events(events)
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Empty => f.write_str("EventStream::Empty"),
            Inner::Materialized { events, position } => f
                .debug_struct("EventStream::Materialized")
                .field("len", &events.len())
                .field("position", position)
                .finish(),
            Inner::Cursor(cursor) => f.debug_tuple("EventStream::Cursor").field(cursor).finish(),
        }
    }
}
