//! In-memory property graph.
//!
//! All state lives in `BTreeMap`s so iteration order is deterministic.
//! An open transaction keeps a journal of the mutations made under it;
//! rollback replays the journal backwards, so `begin` costs the same no
//! matter how large the graph is.

use super::{DeletedCounts, NodeKind, PropertyGraph, StoredEdge, StoredNode};
use crate::types::{EdgeId, GdmError, NodeId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
struct State {
    nodes: BTreeMap<NodeId, StoredNode>,
    index: BTreeMap<(NodeKind, String), NodeId>,
    edges: BTreeMap<EdgeId, StoredEdge>,
    /// `(from, edge)` pairs, so a node's edges come out in creation order.
    out_edges: BTreeSet<(NodeId, EdgeId)>,
    labels: BTreeMap<String, BTreeSet<NodeId>>,
    next_node_id: u64,
    next_edge_id: u64,
}

impl State {
    fn insert_node(&mut self, id: NodeId, node: StoredNode) {
        if let Some((kind, key)) = node.index_entry() {
            self.index.insert((kind, key.to_string()), id);
        }
        for label in &node.labels {
            self.labels.entry(label.clone()).or_default().insert(id);
        }
        self.nodes.insert(id, node);
    }

    fn remove_node(&mut self, id: NodeId) -> Option<StoredNode> {
        let node = self.nodes.remove(&id)?;
        if let Some((kind, key)) = node.index_entry() {
            self.index.remove(&(kind, key.to_string()));
        }
        for label in &node.labels {
            self.unlabel(id, label);
        }
        Some(node)
    }

    fn unlabel(&mut self, id: NodeId, label: &str) {
        if let Some(ids) = self.labels.get_mut(label) {
            ids.remove(&id);
            if ids.is_empty() {
                self.labels.remove(label);
            }
        }
    }

    fn insert_edge(&mut self, id: EdgeId, edge: StoredEdge) {
        self.out_edges.insert((edge.from, id));
        self.edges.insert(id, edge);
    }

    fn remove_edge(&mut self, id: EdgeId) -> Option<StoredEdge> {
        let edge = self.edges.remove(&id)?;
        self.out_edges.remove(&(edge.from, id));
        Some(edge)
    }
}

/// One journaled mutation, holding what is needed to revert it.
#[derive(Debug, Clone)]
enum Undo {
    NodeCreated(NodeId),
    LabelAdded(NodeId, String),
    EdgeCreated(EdgeId),
    NodeRemoved(NodeId, StoredNode),
    EdgeRemoved(EdgeId, StoredEdge),
}

#[derive(Debug, Clone, Default)]
struct Journal {
    entries: Vec<Undo>,
    next_node_id: u64,
    next_edge_id: u64,
}

/// A transactional in-memory property graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    state: State,
    journal: Option<Journal>,
}

impl MemoryGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn writable(&mut self) -> Result<(&mut State, &mut Vec<Undo>), GdmError> {
        match self.journal.as_mut() {
            Some(journal) => Ok((&mut self.state, &mut journal.entries)),
            None => Err(GdmError::NoTransaction),
        }
    }
}

impl PropertyGraph for MemoryGraph {
    fn begin(&mut self) -> Result<(), GdmError> {
        if self.journal.is_some() {
            return Err(GdmError::TransactionOpen);
        }
        self.journal = Some(Journal {
            entries: Vec::new(),
            next_node_id: self.state.next_node_id,
            next_edge_id: self.state.next_edge_id,
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<(), GdmError> {
        self.journal.take().ok_or(GdmError::NoTransaction)?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), GdmError> {
        let journal = self.journal.take().ok_or(GdmError::NoTransaction)?;
        let state = &mut self.state;

        for entry in journal.entries.into_iter().rev() {
            match entry {
                Undo::NodeCreated(id) => {
                    state.remove_node(id);
                }
                Undo::LabelAdded(id, label) => {
                    if let Some(node) = state.nodes.get_mut(&id) {
                        node.labels.retain(|l| *l != label);
                    }
                    state.unlabel(id, &label);
                }
                Undo::EdgeCreated(id) => {
                    state.remove_edge(id);
                }
                Undo::NodeRemoved(id, node) => state.insert_node(id, node),
                Undo::EdgeRemoved(id, edge) => state.insert_edge(id, edge),
            }
        }
        state.next_node_id = journal.next_node_id;
        state.next_edge_id = journal.next_edge_id;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }

    fn find_node(&self, kind: NodeKind, key: &str) -> Result<Option<NodeId>, GdmError> {
        Ok(self.state.index.get(&(kind, key.to_string())).copied())
    }

    fn create_node(&mut self, node: StoredNode) -> Result<NodeId, GdmError> {
        let (state, journal) = self.writable()?;
        let id = NodeId(state.next_node_id);
        state.next_node_id = state.next_node_id.saturating_add(1);

        state.insert_node(id, node);
        journal.push(Undo::NodeCreated(id));
        Ok(id)
    }

    fn node(&self, id: NodeId) -> Result<Option<StoredNode>, GdmError> {
        Ok(self.state.nodes.get(&id).cloned())
    }

    fn add_label(&mut self, id: NodeId, label: &str) -> Result<bool, GdmError> {
        let (state, journal) = self.writable()?;
        let node = state.nodes.get_mut(&id).ok_or(GdmError::NodeNotFound(id))?;
        if node.has_label(label) {
            return Ok(false);
        }
        node.labels.push(label.to_string());
        state.labels.entry(label.to_string()).or_default().insert(id);
        journal.push(Undo::LabelAdded(id, label.to_string()));
        Ok(true)
    }

    fn label_members(&self, label: &str) -> Result<Vec<NodeId>, GdmError> {
        Ok(self
            .state
            .labels
            .get(label)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    fn labels(&self) -> Result<Vec<String>, GdmError> {
        Ok(self
            .state
            .labels
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(label, _)| label.clone())
            .collect())
    }

    fn create_edge(&mut self, edge: StoredEdge) -> Result<EdgeId, GdmError> {
        let (state, journal) = self.writable()?;
        for end in [edge.from, edge.to] {
            if !state.nodes.contains_key(&end) {
                return Err(GdmError::NodeNotFound(end));
            }
        }

        let id = EdgeId(state.next_edge_id);
        state.next_edge_id = state.next_edge_id.saturating_add(1);
        state.insert_edge(id, edge);
        journal.push(Undo::EdgeCreated(id));
        Ok(id)
    }

    fn outgoing(&self, from: NodeId) -> Result<Vec<(EdgeId, StoredEdge)>, GdmError> {
        Ok(self
            .state
            .out_edges
            .range((from, EdgeId(0))..=(from, EdgeId(u64::MAX)))
            .filter_map(|(_, id)| self.state.edges.get(id).map(|e| (*id, e.clone())))
            .collect())
    }

    fn delete_provenance(&mut self, provenance: &str) -> Result<DeletedCounts, GdmError> {
        let (state, journal) = self.writable()?;
        let mut counts = DeletedCounts::default();

        let doomed: Vec<EdgeId> = state
            .edges
            .iter()
            .filter(|(_, edge)| edge.provenance == provenance)
            .map(|(id, _)| *id)
            .collect();
        let mut released = BTreeSet::new();
        for id in doomed {
            if let Some(edge) = state.remove_edge(id) {
                released.extend([edge.from, edge.to]);
                journal.push(Undo::EdgeRemoved(id, edge));
                counts.edges += 1;
            }
        }

        let touched: BTreeSet<NodeId> = state
            .edges
            .values()
            .flat_map(|edge| [edge.from, edge.to])
            .collect();
        let orphans: Vec<NodeId> = state
            .nodes
            .iter()
            .filter(|(id, node)| {
                !touched.contains(*id)
                    && (node.has_provenance(provenance) || released.contains(*id))
            })
            .map(|(id, _)| *id)
            .collect();
        for id in orphans {
            if let Some(node) = state.remove_node(id) {
                journal.push(Undo::NodeRemoved(id, node));
                counts.nodes += 1;
            }
        }

        Ok(counts)
    }

    fn node_count(&self) -> Result<usize, GdmError> {
        Ok(self.state.nodes.len())
    }

    fn edge_count(&self) -> Result<usize, GdmError> {
        Ok(self.state.edges.len())
    }
}
