//! # Graph Store Reader
//!
//! Reconstructs GDM models from a `PropertyGraph`.
//!
//! Roots are the nodes carrying a record-type label under one provenance.
//! From each root the reader follows only edges of that provenance, stops at
//! literal nodes, and expands every other node at most once. Store ids are
//! mapped to model nodes through a per-read cache, so a node reached twice is
//! emitted as the same term both times.

use crate::model::GraphModel;
use crate::storage::{PropertyGraph, StoredNode};
use crate::types::{GdmError, Node, NodeId, Predicate, Statement};
use std::collections::{BTreeMap, BTreeSet};

/// Reads every record of one type and provenance.
#[derive(Debug)]
pub struct GraphReader<'g, G: PropertyGraph> {
    graph: &'g G,
    record_type: String,
    provenance: String,
}

/// Per-read identity state.
#[derive(Debug, Default)]
struct Traversal {
    terms: BTreeMap<NodeId, Node>,
    expanded: BTreeSet<NodeId>,
    predicates: BTreeMap<String, Predicate>,
    next_blank: u64,
}

impl Traversal {
    /// The model term for a non-literal store node.
    fn term(&mut self, id: NodeId, stored: &StoredNode) -> Node {
        if let Some(node) = self.terms.get(&id) {
            return node.clone();
        }
        let node = match &stored.uri {
            Some(uri) => Node::resource(uri.as_str()),
            None => {
                self.next_blank += 1;
                Node::Blank(self.next_blank)
            }
        };
        self.terms.insert(id, node.clone());
        node
    }

    fn predicate(&mut self, uri: &str) -> Predicate {
        self.predicates
            .entry(uri.to_string())
            .or_insert_with_key(|uri| Predicate::new(uri))
            .clone()
    }
}

impl<'g, G: PropertyGraph> GraphReader<'g, G> {
    pub fn new(graph: &'g G, record_type: impl Into<String>, provenance: impl Into<String>) -> Self {
        Self {
            graph,
            record_type: record_type.into(),
            provenance: provenance.into(),
        }
    }

    /// Read all matching records into one model, one resource per root.
    ///
    /// A root without edges yields no statements; that is not an error.
    pub fn read(&self) -> Result<GraphModel, GdmError> {
        let roots = self
            .graph
            .nodes_with_label(&self.record_type, &self.provenance)?;
        let mut model = GraphModel::new();
        let mut traversal = Traversal::default();

        for root in roots {
            let stored = self.graph.node(root)?.ok_or(GdmError::NodeNotFound(root))?;
            let Some(record_uri) = stored.uri.clone() else {
                continue;
            };
            traversal.term(root, &stored);
            model.resource_mut(&record_uri);
            self.expand(root, &record_uri, &mut traversal, &mut model)?;
        }

        tracing::debug!(
            "Read {} statements for {} under {}",
            model.statement_count(),
            self.record_type,
            self.provenance
        );
        Ok(model)
    }

    /// Depth-first expansion from `root` with an explicit stack.
    fn expand(
        &self,
        root: NodeId,
        record_uri: &str,
        traversal: &mut Traversal,
        model: &mut GraphModel,
    ) -> Result<(), GdmError> {
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !traversal.expanded.insert(id) {
                continue;
            }
            let Some(subject) = traversal.terms.get(&id).cloned() else {
                continue;
            };

            let mut children = Vec::new();
            for (_, edge) in self.graph.outgoing(id)? {
                if edge.provenance != self.provenance {
                    continue;
                }
                let stored = self
                    .graph
                    .node(edge.to)?
                    .ok_or(GdmError::NodeNotFound(edge.to))?;

                let object = match &stored.value {
                    Some(value) => Node::Literal {
                        value: value.clone(),
                        datatype: stored.datatype.clone(),
                    },
                    None => {
                        children.push(edge.to);
                        traversal.term(edge.to, &stored)
                    }
                };

                let predicate = traversal.predicate(&edge.uri);
                model.resource_mut(record_uri).add_statement(Statement {
                    subject: subject.clone(),
                    predicate,
                    object,
                    order: edge.order,
                });
            }

            // Reversed so children are expanded in edge order.
            stack.extend(children.into_iter().rev());
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
