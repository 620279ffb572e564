//! # GDM Model
//!
//! The in-memory representation of converted records.
//!
//! A `GraphModel` holds `Resource`s in insertion order; each resource groups
//! the statements that belong to one record (its own statements plus those
//! of the blank nodes beneath it). A `GdmUnit` is one record's model ready
//! for persistence.

use crate::types::{Node, Statement};
use std::collections::BTreeMap;

// =============================================================================
// RESOURCE
// =============================================================================

/// The statements grouped under one record URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    uri: String,
    statements: Vec<Statement>,
}

impl Resource {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            statements: Vec::new(),
        }
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn add_statement(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub(crate) fn statements_mut(&mut self) -> &mut Vec<Statement> {
        &mut self.statements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

// =============================================================================
// GRAPH MODEL
// =============================================================================

/// An insertion-ordered collection of resources keyed by URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphModel {
    resources: Vec<Resource>,
    index: BTreeMap<String, usize>,
}

impl GraphModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the resource for `uri`, creating an empty one if absent.
    pub fn resource_mut(&mut self, uri: &str) -> &mut Resource {
        let idx = match self.index.get(uri) {
            Some(&idx) => idx,
            None => {
                self.resources.push(Resource::new(uri));
                let idx = self.resources.len() - 1;
                self.index.insert(uri.to_string(), idx);
                idx
            }
        };
        &mut self.resources[idx]
    }

    #[must_use]
    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.index.get(uri).map(|&idx| &self.resources[idx])
    }

    /// Resources in insertion order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Every statement of every resource, in insertion order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.resources.iter().flat_map(|r| r.statements.iter())
    }

    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.resources.iter().map(Resource::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statement_count() == 0
    }

    /// Objects of `(subject, predicate)` in statement order.
    ///
    /// Ordered statements sort by their `order`; unordered ones keep their
    /// position.
    #[must_use]
    pub fn objects(&self, subject: &Node, predicate: &str) -> Vec<&Node> {
        let mut found: Vec<(Option<u64>, &Node)> = self
            .statements()
            .filter(|st| &st.subject == subject && st.predicate.uri() == predicate)
            .map(|st| (st.order, &st.object))
            .collect();
        found.sort_by_key(|(order, _)| order.unwrap_or(0));
        found.into_iter().map(|(_, node)| node).collect()
    }
}

// =============================================================================
// GDM UNIT
// =============================================================================

/// One record's model, handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdmUnit {
    pub model: GraphModel,
    pub record_uri: String,
    /// Set only when the record carried a type statement with a URI object.
    pub record_type_uri: Option<String>,
}

impl GdmUnit {
    #[must_use]
    pub fn new(model: GraphModel, record_uri: impl Into<String>) -> Self {
        Self {
            model,
            record_uri: record_uri.into(),
            record_type_uri: None,
        }
    }

    #[must_use]
    pub fn with_record_type(mut self, record_type_uri: impl Into<String>) -> Self {
        self.record_type_uri = Some(record_type_uri.into());
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
