//! Shared test doubles and fixtures for the Chronicle crates.

mod aggregates;
mod clock;
mod cursor;
mod event_store;
mod logging;

pub use aggregates::{Counter, Created, Incremented, Labelled, Ledger, Opened};
pub use clock::FixedClock;
pub use cursor::UncountedCursor;
pub use event_store::{FailingEventStore, RecordingEventStore};
pub use logging::init_tracing;
