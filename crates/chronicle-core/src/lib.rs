//! Chronicle Core: event-sourcing abstractions.
//!
//! This crate defines aggregates, events, event streams, the event and
//! snapshot store contracts, and the repository that composes them. It
//! contains no infrastructure code; concrete stores live in
//! `chronicle-store`.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod event;
pub mod event_store;
pub mod identity;
pub mod repository;
pub mod serializer;
pub mod snapshot;
pub mod store_stream;
pub mod stream;
pub mod version;

#[cfg(test)]
mod testing;
