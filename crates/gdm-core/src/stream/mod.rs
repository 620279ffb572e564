//! # Event Stream Protocol
//!
//! The push-based record event model shared by every reader, pipe and
//! encoder in the pipeline.
//!
//! ## Contract
//!
//! - `start_record` opens a record; only one record is open at a time.
//! - `start_entity` / `end_entity` nest scopes inside the open record.
//! - `literal` attaches a scalar to the innermost open scope.
//! - `end_record` closes the record.
//!
//! A receiver that sees `literal` outside a record, or an unbalanced
//! `end_entity`, is looking at a bug in the pipe upstream of it, not at bad
//! input data. Such violations fail fast through assertions.

mod collapser;
mod recorder;
mod unflattener;

pub use collapser::ArrayCollapser;
pub use recorder::{EventRecorder, ProtocolGuard};
pub use unflattener::Unflattener;

use serde::{Deserialize, Serialize};

// =============================================================================
// RECEIVER TRAIT
// =============================================================================

/// A consumer of record events.
///
/// Pipes implement this trait and forward (possibly reshaped) events to the
/// receiver they own.
pub trait StreamReceiver {
    /// Open a record.
    fn start_record(&mut self, id: &str);

    /// Close the open record.
    fn end_record(&mut self);

    /// Open a nested scope.
    fn start_entity(&mut self, name: &str);

    /// Close the innermost scope.
    fn end_entity(&mut self);

    /// Attach a scalar to the innermost scope.
    fn literal(&mut self, name: &str, value: &str);
}

impl<R: StreamReceiver + ?Sized> StreamReceiver for &mut R {
    fn start_record(&mut self, id: &str) {
        (**self).start_record(id);
    }

    fn end_record(&mut self) {
        (**self).end_record();
    }

    fn start_entity(&mut self, name: &str) {
        (**self).start_entity(name);
    }

    fn end_entity(&mut self) {
        (**self).end_entity();
    }

    fn literal(&mut self, name: &str, value: &str) {
        (**self).literal(name, value);
    }
}

// =============================================================================
// EVENT
// =============================================================================

/// A single stream event in owned form.
///
/// Serialises as `{"event": "literal", "name": "...", "value": "..."}` so
/// event streams can be stored in JSON files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    StartRecord { id: String },
    EndRecord,
    StartEntity { name: String },
    EndEntity,
    Literal { name: String, value: String },
}

impl Event {
    #[must_use]
    pub fn start_record(id: impl Into<String>) -> Self {
        Self::StartRecord { id: id.into() }
    }

    #[must_use]
    pub fn start_entity(name: impl Into<String>) -> Self {
        Self::StartEntity { name: name.into() }
    }

    #[must_use]
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Literal {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Push this event into a receiver.
    pub fn send_to<R: StreamReceiver + ?Sized>(&self, receiver: &mut R) {
        match self {
            Self::StartRecord { id } => receiver.start_record(id),
            Self::EndRecord => receiver.end_record(),
            Self::StartEntity { name } => receiver.start_entity(name),
            Self::EndEntity => receiver.end_entity(),
            Self::Literal { name, value } => receiver.literal(name, value),
        }
    }
}

/// Feed a recorded event sequence into a receiver.
pub fn replay<'a, R, I>(events: I, receiver: &mut R)
where
    R: StreamReceiver + ?Sized,
    I: IntoIterator<Item = &'a Event>,
{
    for event in events {
        event.send_to(receiver);
    }
}

/// Split a flat event sequence into per-record slices.
///
/// Events outside a `StartRecord`..`EndRecord` pair are dropped.
#[must_use]
pub fn split_records(events: &[Event]) -> Vec<&[Event]> {
    let mut records = Vec::new();
    let mut start = None;

    for (idx, event) in events.iter().enumerate() {
        match event {
            Event::StartRecord { .. } => start = Some(idx),
            Event::EndRecord => {
                if let Some(begin) = start.take() {
                    records.push(&events[begin..=idx]);
                }
            }
            _ => {}
        }
    }

    records
}

// =============================================================================
// TESTS
// =============================================================================
