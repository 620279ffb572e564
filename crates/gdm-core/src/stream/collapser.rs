//! Array collapser: turns repeated literal names into explicit array scopes.

use super::StreamReceiver;
use crate::primitives::ARRAY_MARKER;

/// Groups repeated literals of one scope into an array entity.
///
/// Literals are buffered until the scope changes (`start_entity`,
/// `end_entity`) or the record ends. On flush, a name seen once is forwarded
/// as a plain literal; a name seen N > 1 times is forwarded as
/// `start_entity(name + "[]")`, the N literals under `name`, `end_entity()`.
/// Names and values keep their first-seen order.
#[derive(Debug)]
pub struct ArrayCollapser<R> {
    receiver: R,
    buffer: Vec<(String, Vec<String>)>,
}

impl<R: StreamReceiver> ArrayCollapser<R> {
    pub fn new(receiver: R) -> Self {
        Self {
            receiver,
            buffer: Vec::new(),
        }
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn into_inner(self) -> R {
        self.receiver
    }

    fn flush(&mut self) {
        for (name, values) in self.buffer.drain(..) {
            if let [value] = values.as_slice() {
                self.receiver.literal(&name, value);
                continue;
            }

            self.receiver.start_entity(&format!("{}{}", name, ARRAY_MARKER));
            for value in &values {
                self.receiver.literal(&name, value);
            }
            self.receiver.end_entity();
        }
    }
}

impl<R: StreamReceiver> StreamReceiver for ArrayCollapser<R> {
    fn start_record(&mut self, id: &str) {
        self.buffer.clear();
        self.receiver.start_record(id);
    }

    fn end_record(&mut self) {
        self.flush();
        self.receiver.end_record();
    }

    fn start_entity(&mut self, name: &str) {
        self.flush();
        self.receiver.start_entity(name);
    }

    fn end_entity(&mut self) {
        self.flush();
        self.receiver.end_entity();
    }

    fn literal(&mut self, name: &str, value: &str) {
        match self.buffer.iter_mut().find(|(n, _)| n == name) {
            Some((_, values)) => values.push(value.to_string()),
            None => self
                .buffer
                .push((name.to_string(), vec![value.to_string()])),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::stream::{Event, EventRecorder};

    fn collapser() -> ArrayCollapser<EventRecorder> {
        ArrayCollapser::new(EventRecorder::new())
    }

    #[test]
    fn literal_alone_is_buffered() {
        let mut c = collapser();
        c.literal("foo", "bar");
        assert!(c.receiver().events().is_empty());
    }

    #[test]
    fn distinct_names_pass_through() {
        let mut c = collapser();
        c.start_record("test");
        c.literal("foo1", "bar");
        c.literal("foo2", "bar");
        c.end_record();

        assert_eq!(
            c.into_inner().into_events(),
            vec![
                Event::start_record("test"),
                Event::literal("foo1", "bar"),
                Event::literal("foo2", "bar"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn flush_on_start_entity_precedes_the_entity() {
        let mut c = collapser();
        c.start_record("r");
        c.literal("a", "1");
        c.literal("a", "2");
        c.start_entity("child");
        c.literal("b", "3");
        c.end_entity();
        c.end_record();

        assert_eq!(
            c.into_inner().into_events(),
            vec![
                Event::start_record("r"),
                Event::start_entity("a[]"),
                Event::literal("a", "1"),
                Event::literal("a", "2"),
                Event::EndEntity,
                Event::start_entity("child"),
                Event::literal("b", "3"),
                Event::EndEntity,
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn start_record_discards_stale_buffer() {
        let mut c = collapser();
        c.literal("stale", "x");
        c.start_record("r");
        c.end_record();
        assert_eq!(
            c.into_inner().into_events(),
            vec![Event::start_record("r"), Event::EndRecord]
        );
    }
}
