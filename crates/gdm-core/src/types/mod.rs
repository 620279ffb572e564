//! # Core Type Definitions
//!
//! This module contains the value types shared by every stage of the pipeline:
//! - Store identifiers (`NodeId`, `EdgeId`)
//! - Graph terms (`Node`, `Predicate`, `Statement`)
//! - Error types (`GdmError`)
//!
//! ## Identity Rules
//!
//! - Two `Node::Resource` values are equal iff their URIs are equal.
//! - `Node::Blank` ids are only meaningful inside one encoding session
//!   (one record). They are never compared across records.
//! - `Predicate` is interned by URI: clones share one allocation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// STORE IDENTIFIERS
// =============================================================================

/// Identifier of a node inside a property-graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of an edge inside a property-graph store.
///
/// Edge ids are allocated monotonically, so ascending ids reflect write order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// =============================================================================
// NODE
// =============================================================================

/// A graph term: the subject or object of a statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    /// A node named by an absolute URI.
    Resource(String),
    /// An anonymous node, identified by a record-local counter.
    Blank(u64),
    /// A scalar value with an optional datatype URI.
    Literal {
        value: String,
        datatype: Option<String>,
    },
}

impl Node {
    /// Create a resource node.
    #[must_use]
    pub fn resource(uri: impl Into<String>) -> Self {
        Self::Resource(uri.into())
    }

    /// Create an untyped literal node.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: None,
        }
    }

    /// Create a literal node with a datatype URI.
    #[must_use]
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
        }
    }

    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal { .. })
    }

    /// The URI of a resource node.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::Resource(uri) => Some(uri),
            Self::Blank(_) | Self::Literal { .. } => None,
        }
    }

    /// Key used to group statements by subject.
    ///
    /// Resource nodes key by URI, blank nodes by `_:<id>`. Literals never act
    /// as subjects; they key by value so the function stays total.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Resource(uri) => uri.clone(),
            Self::Blank(id) => format!("_:{}", id),
            Self::Literal { value, .. } => value.clone(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(uri) => write!(f, "<{}>", uri),
            Self::Blank(id) => write!(f, "_:{}", id),
            Self::Literal {
                value,
                datatype: None,
            } => write!(f, "\"{}\"", value),
            Self::Literal {
                value,
                datatype: Some(dt),
            } => write!(f, "\"{}\"^^<{}>", value, dt),
        }
    }
}

// =============================================================================
// PREDICATE
// =============================================================================

/// A property identifier.
///
/// Cloning is cheap; the encoder interns predicates so that every statement
/// using the same URI shares one allocation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Predicate(Arc<str>);

impl Predicate {
    #[must_use]
    pub fn new(uri: &str) -> Self {
        Self(Arc::from(uri))
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.0
    }

    /// Whether two predicates share the same interned allocation.
    #[must_use]
    pub fn shares_instance(&self, other: &Predicate) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

// =============================================================================
// STATEMENT
// =============================================================================

/// A single `(subject, predicate, object)` triple.
///
/// `order` is set only when the subject+predicate pair carries more than one
/// object; it records the first-seen position (starting at 1) and is the only
/// thing preserving multi-value order across storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub subject: Node,
    pub predicate: Predicate,
    pub object: Node,
    pub order: Option<u64>,
}

impl Statement {
    /// Create an unordered statement.
    #[must_use]
    pub fn new(subject: Node, predicate: Predicate, object: Node) -> Self {
        Self {
            subject,
            predicate,
            object,
            order: None,
        }
    }

    /// Create a statement carrying an explicit order.
    #[must_use]
    pub fn with_order(subject: Node, predicate: Predicate, object: Node, order: u64) -> Self {
        Self {
            subject,
            predicate,
            object,
            order: Some(order),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(order) = self.order {
            write!(f, " #{}", order)?;
        }
        Ok(())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the GDM engine.
///
/// Protocol violations in the event stream are not represented here: they
/// are programming errors and fail fast via assertions.
#[derive(Debug, Error)]
pub enum GdmError {
    /// The backing store reported a failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The requested node was not found in the store.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A write transaction is already open on this store handle.
    #[error("A write transaction is already open")]
    TransactionOpen,

    /// A write was attempted without an open transaction.
    #[error("No write transaction is open")]
    NoTransaction,

    /// A statement cannot be written (e.g. literal subject).
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    /// A string that must be an absolute URI is not one.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// GDM JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================
