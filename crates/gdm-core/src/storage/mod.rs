//! # Property Graph Storage
//!
//! The contract the writer and reader need from a backing store, plus two
//! implementations:
//! - `MemoryGraph`: in-memory, `BTreeMap`-based, for tests and small runs
//! - `RedbGraph`: disk-backed, using the redb embedded database
//!
//! ## Transactions
//!
//! Every store handle allows at most one open write transaction. All
//! mutations require it; reads see its uncommitted writes. Committed work is
//! durable, rolled-back work is gone without trace.

pub mod memory;
pub mod redb_graph;

pub use memory::MemoryGraph;
pub use redb_graph::RedbGraph;

use crate::types::{EdgeId, GdmError, NodeId};
use serde::{Deserialize, Serialize};

// =============================================================================
// STORED RECORDS
// =============================================================================

/// Index namespace for deduplicated nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Uri,
    Bnode,
}

impl NodeKind {
    /// Prefix used in composite index keys.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Uri => "uri",
            Self::Bnode => "bnode",
        }
    }

    /// Composite `kind\0key` form used by key-value backends.
    #[must_use]
    pub fn index_key(self, key: &str) -> String {
        format!("{}\0{}", self.tag(), key)
    }
}

/// A node as persisted in the store.
///
/// Exactly one of `uri`, `bnode` or `value` is set. Literal nodes (`value`)
/// are never indexed and never shared between statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
    pub uri: Option<String>,
    pub bnode: Option<String>,
    pub value: Option<String>,
    pub datatype: Option<String>,
    pub provenance: Option<String>,
    pub labels: Vec<String>,
}

impl StoredNode {
    #[must_use]
    pub fn resource(uri: impl Into<String>, provenance: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            provenance: Some(provenance.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn blank(key: impl Into<String>, provenance: impl Into<String>) -> Self {
        Self {
            bnode: Some(key.into()),
            provenance: Some(provenance.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn literal(
        value: impl Into<String>,
        datatype: Option<String>,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            value: Some(value.into()),
            datatype,
            provenance: Some(provenance.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.value.is_some()
    }

    /// The `(kind, key)` this node is indexed under, if any.
    #[must_use]
    pub fn index_entry(&self) -> Option<(NodeKind, &str)> {
        match (&self.uri, &self.bnode) {
            (Some(uri), _) => Some((NodeKind::Uri, uri.as_str())),
            (None, Some(key)) => Some((NodeKind::Bnode, key.as_str())),
            (None, None) => None,
        }
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    #[must_use]
    pub fn has_provenance(&self, provenance: &str) -> bool {
        self.provenance.as_deref() == Some(provenance)
    }
}

/// A directed edge as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// The predicate URI.
    pub uri: String,
    pub provenance: String,
    pub order: Option<u64>,
}

/// What `delete_provenance` removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedCounts {
    pub nodes: usize,
    pub edges: usize,
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// The read/write contract of a property-graph backend.
pub trait PropertyGraph {
    /// Open the write transaction. Fails if one is already open.
    fn begin(&mut self) -> Result<(), GdmError>;

    /// Make the open transaction's writes durable.
    fn commit(&mut self) -> Result<(), GdmError>;

    /// Discard the open transaction's writes.
    fn rollback(&mut self) -> Result<(), GdmError>;

    fn in_transaction(&self) -> bool;

    /// Look up a deduplicated node by `(kind, key)`.
    fn find_node(&self, kind: NodeKind, key: &str) -> Result<Option<NodeId>, GdmError>;

    /// Create a node. Resource and blank nodes are indexed by their key.
    fn create_node(&mut self, node: StoredNode) -> Result<NodeId, GdmError>;

    fn node(&self, id: NodeId) -> Result<Option<StoredNode>, GdmError>;

    /// Attach a label to a node. Returns `false` if it was already present.
    fn add_label(&mut self, id: NodeId, label: &str) -> Result<bool, GdmError>;

    /// Every node carrying `label`, ascending.
    fn label_members(&self, label: &str) -> Result<Vec<NodeId>, GdmError>;

    /// Every label in use, sorted.
    fn labels(&self) -> Result<Vec<String>, GdmError>;

    fn create_edge(&mut self, edge: StoredEdge) -> Result<EdgeId, GdmError>;

    /// Outgoing edges of a node in creation order.
    fn outgoing(&self, from: NodeId) -> Result<Vec<(EdgeId, StoredEdge)>, GdmError>;

    /// Remove every edge tagged with `provenance`, then every node no
    /// remaining edge touches that is tagged with it or lost its last edge.
    fn delete_provenance(&mut self, provenance: &str) -> Result<DeletedCounts, GdmError>;

    fn node_count(&self) -> Result<usize, GdmError>;

    fn edge_count(&self) -> Result<usize, GdmError>;

    /// Nodes carrying `label` that were written under `provenance`, ascending.
    ///
    /// Resource nodes are shared between provenances and keep the provenance
    /// of their first writer, so a node also counts when one of its outgoing
    /// edges carries `provenance`.
    fn nodes_with_label(&self, label: &str, provenance: &str) -> Result<Vec<NodeId>, GdmError> {
        let mut roots = Vec::new();
        for id in self.label_members(label)? {
            let Some(node) = self.node(id)? else {
                continue;
            };
            if node.has_provenance(provenance)
                || self
                    .outgoing(id)?
                    .iter()
                    .any(|(_, edge)| edge.provenance == provenance)
            {
                roots.push(id);
            }
        }
        Ok(roots)
    }

    /// Find a deduplicated node, creating it when absent.
    ///
    /// Returns the id and whether the node was created.
    fn resolve_node(&mut self, node: StoredNode) -> Result<(NodeId, bool), GdmError> {
        let existing = match node.index_entry() {
            Some((kind, key)) => self.find_node(kind, key)?,
            None => None,
        };
        match existing {
            Some(id) => Ok((id, false)),
            None => Ok((self.create_node(node)?, true)),
        }
    }
}
