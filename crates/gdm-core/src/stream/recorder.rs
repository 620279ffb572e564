//! Receivers that record or police an event stream.

use super::{Event, StreamReceiver};

/// Collects every event it receives, in order.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<Event>,
}

impl EventRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl StreamReceiver for EventRecorder {
    fn start_record(&mut self, id: &str) {
        self.events.push(Event::start_record(id));
    }

    fn end_record(&mut self) {
        self.events.push(Event::EndRecord);
    }

    fn start_entity(&mut self, name: &str) {
        self.events.push(Event::start_entity(name));
    }

    fn end_entity(&mut self) {
        self.events.push(Event::EndEntity);
    }

    fn literal(&mut self, name: &str, value: &str) {
        self.events.push(Event::literal(name, value));
    }
}

/// Forwards events while asserting the stream protocol.
///
/// Placed in front of a receiver, it turns a malformed stream into an
/// immediate panic at the offending call instead of corrupt output later.
/// Entities still open at `end_record` are closed before it is forwarded.
#[derive(Debug)]
pub struct ProtocolGuard<R> {
    receiver: R,
    record_open: bool,
    depth: usize,
}

impl<R: StreamReceiver> ProtocolGuard<R> {
    pub fn new(receiver: R) -> Self {
        Self {
            receiver,
            record_open: false,
            depth: 0,
        }
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn into_inner(self) -> R {
        self.receiver
    }
}

impl<R: StreamReceiver> StreamReceiver for ProtocolGuard<R> {
    fn start_record(&mut self, id: &str) {
        assert!(!self.record_open, "start_record({id}) while a record is open");
        self.record_open = true;
        self.depth = 0;
        self.receiver.start_record(id);
    }

    fn end_record(&mut self) {
        assert!(self.record_open, "end_record without an open record");
        while self.depth > 0 {
            self.depth -= 1;
            self.receiver.end_entity();
        }
        self.record_open = false;
        self.receiver.end_record();
    }

    fn start_entity(&mut self, name: &str) {
        assert!(self.record_open, "start_entity({name}) outside a record");
        self.depth += 1;
        self.receiver.start_entity(name);
    }

    fn end_entity(&mut self) {
        assert!(self.depth > 0, "end_entity without an open entity");
        self.depth -= 1;
        self.receiver.end_entity();
    }

    fn literal(&mut self, name: &str, value: &str) {
        assert!(self.record_open, "literal({name}) outside a record");
        self.receiver.literal(name, value);
    }
}
