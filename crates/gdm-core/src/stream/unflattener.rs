//! Path unflattener: rebuilds entity nesting from path-encoded literal names.

use super::StreamReceiver;
use crate::primitives::{DEFAULT_ENTITY_MARKER, DEFAULT_INITIAL_DISCARD};
use crate::uri::is_valid_uri;

/// Reverses the effect of a stream flattener.
///
/// A literal named `a.b.c` is emitted as literal `c` inside entities `a` and
/// `b`. Consecutive literals sharing a path prefix reuse the already open
/// entities; only the diverging tail is closed and reopened.
///
/// Names that are absolute URIs (such as the type predicate) are not paths:
/// they are forwarded whole at record level. A name only counts as a URI when
/// its scheme holds no entity marker, so `author.foaf:name` is still a path.
///
/// The open entities form an explicit stack indexed by level, so the pipe
/// holds no recursion state between calls.
#[derive(Debug)]
pub struct Unflattener<R> {
    receiver: R,
    entity_marker: char,
    initial_discard: String,
    open: Vec<String>,
}

impl<R: StreamReceiver> Unflattener<R> {
    /// Create an unflattener with the default `.` marker and empty discard.
    pub fn new(receiver: R) -> Self {
        Self::with_options(receiver, DEFAULT_ENTITY_MARKER, DEFAULT_INITIAL_DISCARD)
    }

    /// Create an unflattener with an explicit path delimiter and a root
    /// segment to discard.
    pub fn with_options(receiver: R, entity_marker: char, initial_discard: &str) -> Self {
        Self {
            receiver,
            entity_marker,
            initial_discard: initial_discard.to_string(),
            open: Vec::new(),
        }
    }

    pub fn entity_marker(&self) -> char {
        self.entity_marker
    }

    pub fn initial_discard(&self) -> &str {
        &self.initial_discard
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn into_inner(self) -> R {
        self.receiver
    }

    fn is_uri_name(&self, name: &str) -> bool {
        name.split_once(':')
            .is_some_and(|(scheme, _)| !scheme.contains(self.entity_marker))
            && is_valid_uri(name)
    }

    /// Close open levels until only `level` remain.
    fn close_to(&mut self, level: usize) {
        while self.open.len() > level {
            self.open.pop();
            self.receiver.end_entity();
        }
    }
}

impl<R: StreamReceiver> StreamReceiver for Unflattener<R> {
    fn start_record(&mut self, id: &str) {
        self.open.clear();
        self.receiver.start_record(id);
    }

    fn end_record(&mut self) {
        self.close_to(0);
        self.receiver.end_record();
    }

    /// Explicit entities are forwarded as-is, after closing any levels opened
    /// from literal paths.
    fn start_entity(&mut self, name: &str) {
        self.close_to(0);
        self.receiver.start_entity(name);
    }

    fn end_entity(&mut self) {
        self.close_to(0);
        self.receiver.end_entity();
    }

    fn literal(&mut self, name: &str, value: &str) {
        if self.is_uri_name(name) {
            self.close_to(0);
            self.receiver.literal(name, value);
            return;
        }

        let mut path: Vec<&str> = name.split(self.entity_marker).collect();
        let Some(local_name) = path.pop() else {
            return;
        };

        if path.first() == Some(&self.initial_discard.as_str()) {
            path.remove(0);
        }

        let shared = self
            .open
            .iter()
            .zip(&path)
            .take_while(|(open, segment)| open.as_str() == **segment)
            .count();

        self.close_to(shared);

        for segment in &path[shared..] {
            self.receiver.start_entity(segment);
            self.open.push((*segment).to_string());
        }

        self.receiver.literal(local_name, value);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::stream::{Event, EventRecorder};

    fn unflattener() -> Unflattener<EventRecorder> {
        Unflattener::new(EventRecorder::new())
    }

    #[test]
    fn plain_literal_passes_through() {
        let mut u = unflattener();
        u.start_record("1");
        u.literal("title", "Faust");
        u.end_record();

        assert_eq!(
            u.into_inner().into_events(),
            vec![
                Event::start_record("1"),
                Event::literal("title", "Faust"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn shared_prefix_reuses_open_entities() {
        let mut u = unflattener();
        u.start_record("1");
        u.literal("a.b.c", "v1");
        u.literal("a.b.d", "v2");
        u.literal("a.e.f", "v3");
        u.end_record();

        assert_eq!(
            u.into_inner().into_events(),
            vec![
                Event::start_record("1"),
                Event::start_entity("a"),
                Event::start_entity("b"),
                Event::literal("c", "v1"),
                Event::literal("d", "v2"),
                Event::EndEntity,
                Event::start_entity("e"),
                Event::literal("f", "v3"),
                Event::EndEntity,
                Event::EndEntity,
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn shorter_path_closes_deeper_levels() {
        let mut u = unflattener();
        u.start_record("1");
        u.literal("a.b.c", "v1");
        u.literal("top", "v2");
        u.end_record();

        assert_eq!(
            u.into_inner().into_events(),
            vec![
                Event::start_record("1"),
                Event::start_entity("a"),
                Event::start_entity("b"),
                Event::literal("c", "v1"),
                Event::EndEntity,
                Event::EndEntity,
                Event::literal("top", "v2"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn initial_discard_drops_root_segment() {
        let mut u = Unflattener::with_options(EventRecorder::new(), '.', "record");
        u.start_record("1");
        u.literal("record.a.b", "v");
        u.literal("record.c", "w");
        u.end_record();

        assert_eq!(
            u.into_inner().into_events(),
            vec![
                Event::start_record("1"),
                Event::start_entity("a"),
                Event::literal("b", "v"),
                Event::EndEntity,
                Event::literal("c", "w"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn default_discard_strips_leading_delimiter() {
        let mut u = unflattener();
        u.start_record("1");
        u.literal(".a.b", "v");
        u.end_record();

        assert_eq!(
            u.into_inner().into_events(),
            vec![
                Event::start_record("1"),
                Event::start_entity("a"),
                Event::literal("b", "v"),
                Event::EndEntity,
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn uri_names_are_not_split() {
        let rdf_type = crate::primitives::RDF_TYPE;
        let mut u = unflattener();
        u.start_record("1");
        u.literal("a.b", "v");
        u.literal(rdf_type, "http://x#Book");
        u.end_record();

        assert_eq!(
            u.into_inner().into_events(),
            vec![
                Event::start_record("1"),
                Event::start_entity("a"),
                Event::literal("b", "v"),
                Event::EndEntity,
                Event::literal(rdf_type, "http://x#Book"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn prefixed_names_inside_paths_are_split() {
        let mut u = unflattener();
        u.start_record("1");
        u.literal("author.foaf:name", "Goethe");
        u.literal("dc:title", "Faust");
        u.end_record();

        assert_eq!(
            u.into_inner().into_events(),
            vec![
                Event::start_record("1"),
                Event::start_entity("author"),
                Event::literal("foaf:name", "Goethe"),
                Event::EndEntity,
                Event::literal("dc:title", "Faust"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn custom_marker() {
        let mut u = Unflattener::with_options(EventRecorder::new(), '/', "");
        assert_eq!(u.entity_marker(), '/');
        assert_eq!(u.initial_discard(), "");
        u.start_record("1");
        u.literal("x/y", "v");
        u.end_record();
        assert_eq!(u.receiver().events().len(), 5);
    }

    #[test]
    fn start_record_forgets_dangling_levels() {
        let mut u = unflattener();
        u.start_record("1");
        u.literal("a.b", "v");
        u.start_record("2");
        u.literal("a.c", "w");
        u.end_record();

        let events = u.into_inner().into_events();
        assert_eq!(
            &events[3..],
            &[
                Event::start_record("2"),
                Event::start_entity("a"),
                Event::literal("c", "w"),
                Event::EndEntity,
                Event::EndRecord,
            ]
        );
    }
}
