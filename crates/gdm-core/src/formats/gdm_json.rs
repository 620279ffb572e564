//! GDM JSON: one object key per record URI, mapped to its statement list.
//!
//! ```json
//! {
//!   "http://example.org/records/1": [
//!     ["http://example.org/records/1", "http://example.org/schema#title", {"value": "Faust"}],
//!     ["http://example.org/records/1", "http://example.org/schema#subject", {"value": "a"}, 1],
//!     ["http://example.org/records/1", "http://example.org/schema#author", "_:1"],
//!     ["_:1", "http://example.org/schema#name", {"value": "Goethe", "datatype": "…"}]
//!   ]
//! }
//! ```
//!
//! Resources are their URI string, blank nodes `_:<id>`, literals an object
//! with `value` and an optional `datatype`. The fourth tuple element is the
//! statement order, present only on ordered statements.

use crate::model::{GdmUnit, GraphModel};
use crate::types::{GdmError, Node, Predicate, Statement};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

const BLANK_PREFIX: &str = "_:";

/// Serialise one unit as `{recordUri: [statements]}`.
#[must_use]
pub fn unit_to_json(unit: &GdmUnit) -> Value {
    let statements: Vec<Value> = unit.model.statements().map(statement_to_json).collect();
    let mut object = Map::new();
    object.insert(unit.record_uri.clone(), Value::Array(statements));
    Value::Object(object)
}

/// Serialise a model with one key per resource, in insertion order.
#[must_use]
pub fn model_to_json(model: &GraphModel) -> Value {
    let mut object = Map::new();
    for resource in model.resources() {
        let statements = resource.statements().iter().map(statement_to_json).collect();
        object.insert(resource.uri().to_string(), Value::Array(statements));
    }
    Value::Object(object)
}

/// Parse GDM JSON back into a model.
pub fn model_from_json(value: &Value) -> Result<GraphModel, GdmError> {
    let object = value
        .as_object()
        .ok_or_else(|| GdmError::Json("expected an object of records".to_string()))?;

    let mut model = GraphModel::new();
    let mut predicates: BTreeMap<String, Predicate> = BTreeMap::new();

    for (record_uri, statements) in object {
        let statements = statements
            .as_array()
            .ok_or_else(|| GdmError::Json(format!("{}: expected a statement list", record_uri)))?;
        let resource = model.resource_mut(record_uri);

        for entry in statements {
            let parts = entry
                .as_array()
                .filter(|parts| parts.len() == 3 || parts.len() == 4)
                .ok_or_else(|| GdmError::Json(format!("malformed statement: {}", entry)))?;

            let subject = node_from_json(&parts[0])?;
            let predicate_uri = parts[1]
                .as_str()
                .ok_or_else(|| GdmError::Json(format!("predicate must be a string: {}", parts[1])))?;
            let predicate = predicates
                .entry(predicate_uri.to_string())
                .or_insert_with(|| Predicate::new(predicate_uri))
                .clone();
            let object = node_from_json(&parts[2])?;
            let order = match parts.get(3) {
                Some(order) => Some(
                    order
                        .as_u64()
                        .ok_or_else(|| GdmError::Json(format!("order must be an integer: {}", order)))?,
                ),
                None => None,
            };

            resource.add_statement(Statement {
                subject,
                predicate,
                object,
                order,
            });
        }
    }

    Ok(model)
}

fn statement_to_json(statement: &Statement) -> Value {
    let mut tuple = vec![
        node_to_json(&statement.subject),
        Value::String(statement.predicate.uri().to_string()),
        node_to_json(&statement.object),
    ];
    if let Some(order) = statement.order {
        tuple.push(json!(order));
    }
    Value::Array(tuple)
}

fn node_to_json(node: &Node) -> Value {
    match node {
        Node::Resource(uri) => Value::String(uri.clone()),
        Node::Blank(id) => Value::String(format!("{}{}", BLANK_PREFIX, id)),
        Node::Literal {
            value,
            datatype: None,
        } => json!({ "value": value }),
        Node::Literal {
            value,
            datatype: Some(datatype),
        } => json!({ "value": value, "datatype": datatype }),
    }
}

fn node_from_json(value: &Value) -> Result<Node, GdmError> {
    match value {
        Value::String(s) => match s.strip_prefix(BLANK_PREFIX) {
            Some(id) => id
                .parse()
                .map(Node::Blank)
                .map_err(|_| GdmError::Json(format!("bad blank node id: {}", s))),
            None => Ok(Node::resource(s.as_str())),
        },
        Value::Object(fields) => {
            let literal = fields
                .get("value")
                .and_then(Value::as_str)
                .ok_or_else(|| GdmError::Json(format!("literal without value: {}", value)))?;
            Ok(Node::Literal {
                value: literal.to_string(),
                datatype: fields
                    .get("datatype")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        }
        other => Err(GdmError::Json(format!("unexpected node: {}", other))),
    }
}
