//! Test cursor: an `EventCursor` without a constant-time count.

use chronicle_core::event::Event;
use chronicle_core::stream::EventCursor;

/// Walks a fixed list of events but, like a database result set, cannot
/// report its length without being walked.
#[derive(Debug, Clone)]
pub struct UncountedCursor {
    events: Vec<Event>,
    position: usize,
}

impl UncountedCursor {
    /// Creates a cursor positioned on the first of `events`.
    #[must_use]
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            position: 0,
        }
    }
}

impl EventCursor for UncountedCursor {
    fn current(&self) -> Option<&Event> {
        self.events.get(self.position)
    }

    fn advance(&mut self) {
        if self.position < self.events.len() {
            self.position += 1;
        }
    }

    fn key(&self) -> Option<usize> {
        (self.position < self.events.len()).then_some(self.position)
    }

    fn rewind(&mut self) {
        self.position = 0;
    }
}
