//! # GDM Encoder
//!
//! Turns a record event stream into one `GdmUnit` per record.
//!
//! ## Per-record state
//!
//! - the record URI (the id itself when it is an absolute URI, minted otherwise)
//! - a subject stack: the record resource, plus one blank node per open entity
//! - an order counter per `(subject key, predicate URI)`
//! - the predicate intern table
//!
//! All of it is created at `start_record` and dropped at `end_record`; nothing
//! survives from one record to the next.

use crate::config::GdmConfig;
use crate::model::{GdmUnit, GraphModel};
use crate::primitives::RDF_TYPE;
use crate::stream::StreamReceiver;
use crate::types::{Node, Predicate, Statement};
use crate::uri::{is_valid_uri, mint_property_uri, mint_record_uri, schema_base_uri};
use std::collections::BTreeMap;

// =============================================================================
// UNIT SINK
// =============================================================================

/// Downstream consumer of finished records.
pub trait UnitSink {
    fn process(&mut self, unit: GdmUnit);
}

impl UnitSink for Vec<GdmUnit> {
    fn process(&mut self, unit: GdmUnit) {
        self.push(unit);
    }
}

impl<S: UnitSink + ?Sized> UnitSink for &mut S {
    fn process(&mut self, unit: GdmUnit) {
        (**self).process(unit);
    }
}

// =============================================================================
// RECORD STATE
// =============================================================================

#[derive(Debug)]
struct RecordState {
    uri: String,
    model: GraphModel,
    type_uri: Option<String>,
    subjects: Vec<Node>,
    next_blank: u64,
    orders: BTreeMap<String, u64>,
    predicates: BTreeMap<String, Predicate>,
}

impl RecordState {
    fn new(uri: String) -> Self {
        let root = Node::resource(uri.as_str());
        let mut model = GraphModel::new();
        model.resource_mut(&uri);
        Self {
            uri,
            model,
            type_uri: None,
            subjects: vec![root],
            next_blank: 1,
            orders: BTreeMap::new(),
            predicates: BTreeMap::new(),
        }
    }

    fn subject(&self) -> &Node {
        // The record resource is pushed at creation and never popped.
        &self.subjects[self.subjects.len() - 1]
    }

    fn intern(&mut self, uri: String) -> Predicate {
        self.predicates
            .entry(uri)
            .or_insert_with_key(|uri| Predicate::new(uri))
            .clone()
    }

    /// Append a statement, numbering it within its `(subject, predicate)` key.
    fn emit(&mut self, predicate: Predicate, object: Node) {
        let subject = self.subject().clone();
        let counter = self
            .orders
            .entry(order_key(&subject, &predicate))
            .or_insert(0);
        *counter += 1;
        let statement = Statement::with_order(subject, predicate, object, *counter);
        self.model.resource_mut(&self.uri).add_statement(statement);
    }

    /// Drop the order of every statement whose key occurred only once.
    fn finish(self) -> GdmUnit {
        let Self {
            uri,
            mut model,
            type_uri,
            orders,
            ..
        } = self;

        for statement in model.resource_mut(&uri).statements_mut() {
            let key = order_key(&statement.subject, &statement.predicate);
            if orders.get(&key).copied().unwrap_or(0) <= 1 {
                statement.order = None;
            }
        }

        let unit = GdmUnit::new(model, uri);
        match type_uri {
            Some(type_uri) => unit.with_record_type(type_uri),
            None => unit,
        }
    }
}

fn order_key(subject: &Node, predicate: &Predicate) -> String {
    format!("{}::{}", subject.key(), predicate.uri())
}

// =============================================================================
// ENCODER
// =============================================================================

/// Stream receiver that builds a `GraphModel` per record.
///
/// Literals become statements on the innermost subject. A literal under the
/// type predicate whose value is an absolute URI becomes a resource object,
/// and at record level it also sets the unit's record type.
#[derive(Debug)]
pub struct GdmEncoder<S> {
    sink: S,
    base_uri: String,
    data_model_id: Option<String>,
    property_base: String,
    record: Option<RecordState>,
}

impl<S: UnitSink> GdmEncoder<S> {
    /// Create an encoder minting URIs from `config`.
    pub fn new(sink: S, config: &GdmConfig) -> Self {
        let property_base = schema_base_uri(&config.base_uri, config.data_model_id.as_deref());
        Self::with_property_base(sink, config, property_base)
    }

    /// Create an encoder with an explicit namespace for minted predicates.
    pub fn with_property_base(sink: S, config: &GdmConfig, property_base: impl Into<String>) -> Self {
        Self {
            sink,
            base_uri: config.base_uri.clone(),
            data_model_id: config.data_model_id.clone(),
            property_base: property_base.into(),
            record: None,
        }
    }

    #[must_use]
    pub fn property_base(&self) -> &str {
        &self.property_base
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Whether a record is currently open.
    #[must_use]
    pub fn in_record(&self) -> bool {
        self.record.is_some()
    }

    fn record_uri(&self, id: &str) -> String {
        if is_valid_uri(id) {
            id.to_string()
        } else {
            mint_record_uri(&self.base_uri, Some(id), self.data_model_id.as_deref())
        }
    }

    fn predicate_uri(&self, name: &str) -> String {
        if is_valid_uri(name) {
            name.to_string()
        } else {
            mint_property_uri(&self.property_base, name)
        }
    }

    fn open_record(&mut self) -> &mut RecordState {
        self.record
            .as_mut()
            .expect("stream event outside a record")
    }
}

impl<S: UnitSink> StreamReceiver for GdmEncoder<S> {
    fn start_record(&mut self, id: &str) {
        assert!(
            self.record.is_none(),
            "start_record({id}) while a record is open"
        );
        self.record = Some(RecordState::new(self.record_uri(id)));
    }

    fn end_record(&mut self) {
        let record = self
            .record
            .take()
            .expect("end_record without an open record");

        let unit = record.finish();
        tracing::debug!(
            record = %unit.record_uri,
            statements = unit.model.statement_count(),
            "Encoded record"
        );
        self.sink.process(unit);
    }

    fn start_entity(&mut self, name: &str) {
        let uri = self.predicate_uri(name);
        let record = self.open_record();
        let predicate = record.intern(uri);
        let blank = Node::Blank(record.next_blank);
        record.next_blank += 1;
        record.emit(predicate, blank.clone());
        record.subjects.push(blank);
    }

    fn end_entity(&mut self) {
        let record = self.open_record();
        assert!(record.subjects.len() > 1, "end_entity without an open entity");
        record.subjects.pop();
    }

    fn literal(&mut self, name: &str, value: &str) {
        if name.is_empty() || value.is_empty() {
            assert!(self.record.is_some(), "literal({name}) outside a record");
            tracing::trace!(name, "Skipping empty literal");
            return;
        }

        let uri = self.predicate_uri(name);
        let record = self.open_record();
        let predicate = record.intern(uri);

        let object = if predicate.uri() == RDF_TYPE && is_valid_uri(value) {
            if record.subjects.len() == 1 {
                record.type_uri = Some(value.to_string());
            }
            Node::resource(value)
        } else {
            Node::literal(value)
        };

        record.emit(predicate, object);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    const BASE: &str = "http://data.example.org/";

    fn encoder() -> GdmEncoder<Vec<GdmUnit>> {
        let config = GdmConfig {
            base_uri: BASE.to_string(),
            data_model_id: Some("7".to_string()),
            ..GdmConfig::default()
        };
        GdmEncoder::new(Vec::new(), &config)
    }

    fn single_unit(encoder: GdmEncoder<Vec<GdmUnit>>) -> GdmUnit {
        let mut units = encoder.into_sink();
        assert_eq!(units.len(), 1);
        units.remove(0)
    }

    fn prop(name: &str) -> String {
        format!("{}datamodels/7/schema#{}", BASE, name)
    }

    #[test]
    fn record_id_is_minted_unless_absolute() {
        let mut enc = encoder();
        enc.start_record("42");
        enc.end_record();
        enc.start_record("http://other.org/r/1");
        enc.end_record();

        let units = enc.into_sink();
        assert_eq!(units[0].record_uri, format!("{}datamodels/7/records/42", BASE));
        assert_eq!(units[1].record_uri, "http://other.org/r/1");
    }

    #[test]
    fn literals_become_statements_on_the_record() {
        let mut enc = encoder();
        enc.start_record("1");
        enc.literal("title", "Faust");
        enc.literal("http://purl.org/dc/terms/creator", "Goethe");
        enc.end_record();

        let unit = single_unit(enc);
        let statements: Vec<_> = unit.model.statements().collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].predicate.uri(), prop("title"));
        assert_eq!(statements[0].object, Node::literal("Faust"));
        assert_eq!(statements[0].subject, Node::resource(unit.record_uri.as_str()));
        assert_eq!(statements[1].predicate.uri(), "http://purl.org/dc/terms/creator");
        assert!(statements.iter().all(|st| st.order.is_none()));
    }

    #[test]
    fn empty_values_are_skipped() {
        let mut enc = encoder();
        enc.start_record("1");
        enc.literal("title", "");
        enc.literal("", "value");
        enc.end_record();
        assert!(single_unit(enc).model.is_empty());
    }

    #[test]
    fn multi_valued_keys_are_ordered_from_one() {
        let mut enc = encoder();
        enc.start_record("1");
        enc.literal("subject", "a");
        enc.literal("title", "t");
        enc.literal("subject", "b");
        enc.literal("subject", "c");
        enc.end_record();

        let unit = single_unit(enc);
        let orders: Vec<_> = unit
            .model
            .statements()
            .map(|st| (st.object.key(), st.order))
            .collect();
        assert_eq!(
            orders,
            vec![
                ("a".to_string(), Some(1)),
                ("t".to_string(), None),
                ("b".to_string(), Some(2)),
                ("c".to_string(), Some(3)),
            ]
        );
    }

    #[test]
    fn type_statement_with_uri_sets_record_type() {
        let mut enc = encoder();
        enc.start_record("1");
        enc.literal(RDF_TYPE, "http://purl.org/ontology/bibo/Book");
        enc.end_record();

        let unit = single_unit(enc);
        assert_eq!(
            unit.record_type_uri.as_deref(),
            Some("http://purl.org/ontology/bibo/Book")
        );
        let st = unit.model.statements().next().expect("type statement");
        assert_eq!(st.object, Node::resource("http://purl.org/ontology/bibo/Book"));
    }

    #[test]
    fn type_statement_with_plain_value_stays_literal() {
        let mut enc = encoder();
        enc.start_record("1");
        enc.literal(RDF_TYPE, "Book");
        enc.end_record();

        let unit = single_unit(enc);
        assert!(unit.record_type_uri.is_none());
        assert!(unit.model.statements().all(|st| st.object.is_literal()));
    }

    #[test]
    fn predicates_are_interned_per_record() {
        let mut enc = encoder();
        enc.start_record("1");
        enc.literal("title", "a");
        enc.literal("title", "b");
        enc.end_record();

        let unit = single_unit(enc);
        let statements: Vec<_> = unit.model.statements().collect();
        assert!(statements[0].predicate.shares_instance(&statements[1].predicate));
    }

    #[test]
    fn entities_become_blank_nodes() {
        let mut enc = encoder();
        enc.start_record("1");
        enc.start_entity("author");
        enc.literal("name", "Goethe");
        enc.end_entity();
        enc.literal("title", "Faust");
        enc.end_record();

        let unit = single_unit(enc);
        let statements: Vec<_> = unit.model.statements().collect();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0].object, Node::Blank(1));
        assert_eq!(statements[1].subject, Node::Blank(1));
        assert_eq!(statements[1].predicate.uri(), prop("name"));
        assert_eq!(statements[2].subject, Node::resource(unit.record_uri.as_str()));
    }

    #[test]
    fn state_resets_between_records() {
        let mut enc = encoder();
        for id in ["1", "2"] {
            enc.start_record(id);
            enc.literal("title", "x");
            enc.start_entity("e");
            enc.end_entity();
            enc.end_record();
        }

        let units = enc.into_sink();
        assert_eq!(units.len(), 2);
        for unit in &units {
            let statements: Vec<_> = unit.model.statements().collect();
            assert!(statements.iter().all(|st| st.order.is_none()));
            assert_eq!(statements[1].object, Node::Blank(1));
        }
    }

    #[test]
    #[should_panic(expected = "outside a record")]
    fn literal_outside_record_panics() {
        let mut enc = encoder();
        enc.literal("title", "x");
    }

    #[test]
    #[should_panic(expected = "while a record is open")]
    fn nested_record_panics() {
        let mut enc = encoder();
        enc.start_record("1");
        enc.start_record("2");
    }
}
