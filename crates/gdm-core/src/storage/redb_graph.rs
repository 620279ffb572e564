//! # redb-backed Property Graph
//!
//! A disk-backed property graph using the redb embedded database.
//!
//! redb gives us ACID write transactions with copy-on-write B-trees, so a
//! rolled-back batch leaves no partial writes behind. Node and edge records
//! are serialised with postcard.
//!
//! ## Tables
//!
//! | table        | key                 | value                     |
//! |--------------|---------------------|---------------------------|
//! | `nodes`      | node id             | postcard `StoredNode`     |
//! | `node_index` | `kind\0key`         | node id                   |
//! | `edges`      | edge id             | postcard `StoredEdge`     |
//! | `out_edges`  | `(from, edge id)`   | to                        |
//! | `labels`     | `(label, node id)`  | unit                      |
//! | `metadata`   | counter name        | next id                   |
//!
//! Id counters live in `metadata` and are read inside the open transaction,
//! so a rollback also rewinds them.

use super::{DeletedCounts, NodeKind, PropertyGraph, StoredEdge, StoredNode};
use crate::types::{EdgeId, GdmError, NodeId};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use std::collections::BTreeSet;
use std::ops::Bound;
use std::path::Path;

/// Table for nodes: NodeId(u64) -> serialized StoredNode bytes
const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");

/// Table for the dedup index: "kind\0key" -> NodeId(u64)
const NODE_INDEX: TableDefinition<&str, u64> = TableDefinition::new("node_index");

/// Table for edges: EdgeId(u64) -> serialized StoredEdge bytes
const EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges");

/// Table for adjacency: (from, edge_id) -> to
const OUT_EDGES: TableDefinition<(u64, u64), u64> = TableDefinition::new("out_edges");

/// Table for label membership: (label, node_id) -> ()
const LABELS: TableDefinition<(&str, u64), ()> = TableDefinition::new("label_members");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_NODE_ID: &str = "next_node_id";
const NEXT_EDGE_ID: &str = "next_edge_id";

/// A disk-backed property graph.
pub struct RedbGraph {
    /// The redb database handle.
    db: Database,
    /// The open write transaction, if any.
    txn: Option<WriteTransaction>,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph")
            .field("in_transaction", &self.txn.is_some())
            .finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GdmError> {
        let db = Database::create(path.as_ref()).map_err(|e| GdmError::Storage(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(NODES)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(NODE_INDEX)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(EDGES)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(OUT_EDGES)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(LABELS)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| GdmError::Storage(e.to_string()))?;
        }

        Ok(Self { db, txn: None })
    }

    /// Compact the database file. Fails while a transaction is open.
    pub fn compact(&mut self) -> Result<(), GdmError> {
        if self.txn.is_some() {
            return Err(GdmError::TransactionOpen);
        }
        self.db
            .compact()
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        Ok(())
    }

    fn write_txn(&self) -> Result<&WriteTransaction, GdmError> {
        self.txn.as_ref().ok_or(GdmError::NoTransaction)
    }

    /// Take the next value of an id counter inside the open transaction.
    fn next_id(txn: &WriteTransaction, counter: &str) -> Result<u64, GdmError> {
        let mut meta = txn
            .open_table(METADATA)
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        let id = meta
            .get(counter)
            .map_err(|e| GdmError::Storage(e.to_string()))?
            .map(|v| v.value())
            .unwrap_or(0);
        meta.insert(counter, id.saturating_add(1))
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        Ok(id)
    }

    fn put_node(txn: &WriteTransaction, id: u64, node: &StoredNode) -> Result<(), GdmError> {
        let bytes =
            postcard::to_allocvec(node).map_err(|e| GdmError::Serialization(e.to_string()))?;
        let mut nodes = txn
            .open_table(NODES)
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        nodes
            .insert(id, bytes.as_slice())
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        Ok(())
    }

    fn insert_label(txn: &WriteTransaction, label: &str, id: u64) -> Result<(), GdmError> {
        let mut labels = txn
            .open_table(LABELS)
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        labels
            .insert((label, id), ())
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// TABLE HELPERS
// =============================================================================
//
// Reads go through the open write transaction when there is one, so they see
// its uncommitted writes, and through a fresh read transaction otherwise.
// These helpers take any readable table so both paths share one body.

fn read_node(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> Result<Option<StoredNode>, GdmError> {
    match table
        .get(id)
        .map_err(|e| GdmError::Storage(e.to_string()))?
    {
        Some(data) => {
            let node: StoredNode = postcard::from_bytes(data.value())
                .map_err(|e| GdmError::Serialization(e.to_string()))?;
            Ok(Some(node))
        }
        None => Ok(None),
    }
}

fn read_edge(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> Result<Option<StoredEdge>, GdmError> {
    match table
        .get(id)
        .map_err(|e| GdmError::Storage(e.to_string()))?
    {
        Some(data) => {
            let edge: StoredEdge = postcard::from_bytes(data.value())
                .map_err(|e| GdmError::Serialization(e.to_string()))?;
            Ok(Some(edge))
        }
        None => Ok(None),
    }
}

fn read_label(
    table: &impl ReadableTable<(&'static str, u64), ()>,
    label: &str,
) -> Result<Vec<NodeId>, GdmError> {
    let mut ids = Vec::new();
    for entry in table
        .range((label, 0)..=(label, u64::MAX))
        .map_err(|e| GdmError::Storage(e.to_string()))?
    {
        let (key, _) = entry.map_err(|e| GdmError::Storage(e.to_string()))?;
        ids.push(NodeId(key.value().1));
    }
    Ok(ids)
}

fn read_index(
    table: &impl ReadableTable<&'static str, u64>,
    key: &str,
) -> Result<Option<NodeId>, GdmError> {
    Ok(table
        .get(key)
        .map_err(|e| GdmError::Storage(e.to_string()))?
        .map(|v| NodeId(v.value())))
}

fn read_outgoing(
    adjacency: &impl ReadableTable<(u64, u64), u64>,
    edges: &impl ReadableTable<u64, &'static [u8]>,
    from: u64,
) -> Result<Vec<(EdgeId, StoredEdge)>, GdmError> {
    let mut out = Vec::new();
    for entry in adjacency
        .range((from, 0)..=(from, u64::MAX))
        .map_err(|e| GdmError::Storage(e.to_string()))?
    {
        let (key, _) = entry.map_err(|e| GdmError::Storage(e.to_string()))?;
        let (_, edge_id) = key.value();
        if let Some(edge) = read_edge(edges, edge_id)? {
            out.push((EdgeId(edge_id), edge));
        }
    }
    Ok(out)
}

/// Distinct label names, sorted. Seeks past each label's members instead of
/// scanning them.
fn read_label_names(
    table: &impl ReadableTable<(&'static str, u64), ()>,
) -> Result<Vec<String>, GdmError> {
    let mut names: Vec<String> = Vec::new();
    loop {
        let next = {
            let start: Bound<(&str, u64)> = match names.last() {
                Some(last) => Bound::Excluded((last.as_str(), u64::MAX)),
                None => Bound::Unbounded,
            };
            let mut range = table
                .range((start, Bound::Unbounded))
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            match range.next() {
                Some(entry) => {
                    let (key, _) = entry.map_err(|e| GdmError::Storage(e.to_string()))?;
                    Some(key.value().0.to_string())
                }
                None => None,
            }
        };
        match next {
            Some(name) => names.push(name),
            None => return Ok(names),
        }
    }
}

// =============================================================================
// PROPERTY GRAPH IMPLEMENTATION
// =============================================================================

impl PropertyGraph for RedbGraph {
    fn begin(&mut self) -> Result<(), GdmError> {
        if self.txn.is_some() {
            return Err(GdmError::TransactionOpen);
        }
        let txn = self
            .db
            .begin_write()
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        self.txn = Some(txn);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), GdmError> {
        let txn = self.txn.take().ok_or(GdmError::NoTransaction)?;
        txn.commit()
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), GdmError> {
        let txn = self.txn.take().ok_or(GdmError::NoTransaction)?;
        txn.abort()
            .map_err(|e| GdmError::Storage(e.to_string()))?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    fn find_node(&self, kind: NodeKind, key: &str) -> Result<Option<NodeId>, GdmError> {
        let key = kind.index_key(key);
        match &self.txn {
            Some(txn) => {
                let table = txn
                    .open_table(NODE_INDEX)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_index(&table, &key)
            }
            None => {
                let read_txn = self
                    .db
                    .begin_read()
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                let table = read_txn
                    .open_table(NODE_INDEX)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_index(&table, &key)
            }
        }
    }

    fn create_node(&mut self, node: StoredNode) -> Result<NodeId, GdmError> {
        let txn = self.write_txn()?;
        let id = Self::next_id(txn, NEXT_NODE_ID)?;
        Self::put_node(txn, id, &node)?;

        if let Some((kind, key)) = node.index_entry() {
            let mut index = txn
                .open_table(NODE_INDEX)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            index
                .insert(kind.index_key(key).as_str(), id)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
        }
        for label in &node.labels {
            Self::insert_label(txn, label, id)?;
        }

        Ok(NodeId(id))
    }

    fn node(&self, id: NodeId) -> Result<Option<StoredNode>, GdmError> {
        match &self.txn {
            Some(txn) => {
                let table = txn
                    .open_table(NODES)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_node(&table, id.0)
            }
            None => {
                let read_txn = self
                    .db
                    .begin_read()
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                let table = read_txn
                    .open_table(NODES)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_node(&table, id.0)
            }
        }
    }

    fn add_label(&mut self, id: NodeId, label: &str) -> Result<bool, GdmError> {
        let mut node = self.node(id)?.ok_or(GdmError::NodeNotFound(id))?;
        if node.has_label(label) {
            return Ok(false);
        }

        let txn = self.write_txn()?;
        node.labels.push(label.to_string());
        Self::put_node(txn, id.0, &node)?;
        Self::insert_label(txn, label, id.0)?;
        Ok(true)
    }

    fn label_members(&self, label: &str) -> Result<Vec<NodeId>, GdmError> {
        match &self.txn {
            Some(txn) => {
                let table = txn
                    .open_table(LABELS)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_label(&table, label)
            }
            None => {
                let read_txn = self
                    .db
                    .begin_read()
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                let table = read_txn
                    .open_table(LABELS)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_label(&table, label)
            }
        }
    }

    fn labels(&self) -> Result<Vec<String>, GdmError> {
        match &self.txn {
            Some(txn) => {
                let table = txn
                    .open_table(LABELS)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_label_names(&table)
            }
            None => {
                let read_txn = self
                    .db
                    .begin_read()
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                let table = read_txn
                    .open_table(LABELS)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_label_names(&table)
            }
        }
    }

    fn create_edge(&mut self, edge: StoredEdge) -> Result<EdgeId, GdmError> {
        for end in [edge.from, edge.to] {
            if self.node(end)?.is_none() {
                return Err(GdmError::NodeNotFound(end));
            }
        }

        let txn = self.write_txn()?;
        let id = Self::next_id(txn, NEXT_EDGE_ID)?;
        let bytes =
            postcard::to_allocvec(&edge).map_err(|e| GdmError::Serialization(e.to_string()))?;
        {
            let mut edges = txn
                .open_table(EDGES)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            edges
                .insert(id, bytes.as_slice())
                .map_err(|e| GdmError::Storage(e.to_string()))?;
        }
        {
            let mut adjacency = txn
                .open_table(OUT_EDGES)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            adjacency
                .insert((edge.from.0, id), edge.to.0)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
        }
        Ok(EdgeId(id))
    }

    fn outgoing(&self, from: NodeId) -> Result<Vec<(EdgeId, StoredEdge)>, GdmError> {
        match &self.txn {
            Some(txn) => {
                let adjacency = txn
                    .open_table(OUT_EDGES)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                let edges = txn
                    .open_table(EDGES)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_outgoing(&adjacency, &edges, from.0)
            }
            None => {
                let read_txn = self
                    .db
                    .begin_read()
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                let adjacency = read_txn
                    .open_table(OUT_EDGES)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                let edges = read_txn
                    .open_table(EDGES)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                read_outgoing(&adjacency, &edges, from.0)
            }
        }
    }

    fn delete_provenance(&mut self, provenance: &str) -> Result<DeletedCounts, GdmError> {
        let txn = self.write_txn()?;
        let mut counts = DeletedCounts::default();

        // Pass 1: drop the provenance's edges, remembering their end nodes,
        // then collect the nodes the surviving edges still touch.
        let mut released = BTreeSet::new();
        {
            let mut edges = txn
                .open_table(EDGES)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            let mut adjacency = txn
                .open_table(OUT_EDGES)
                .map_err(|e| GdmError::Storage(e.to_string()))?;

            let mut doomed = Vec::new();
            for entry in edges
                .iter()
                .map_err(|e| GdmError::Storage(e.to_string()))?
            {
                let (key, value) = entry.map_err(|e| GdmError::Storage(e.to_string()))?;
                let edge: StoredEdge = postcard::from_bytes(value.value())
                    .map_err(|e| GdmError::Serialization(e.to_string()))?;
                if edge.provenance == provenance {
                    doomed.push((key.value(), edge.from.0, edge.to.0));
                }
            }

            for (edge_id, from, to) in doomed {
                edges
                    .remove(edge_id)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                adjacency
                    .remove((from, edge_id))
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                released.extend([from, to]);
                counts.edges += 1;
            }
        }

        let mut touched = BTreeSet::new();
        {
            let edges = txn
                .open_table(EDGES)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            for entry in edges
                .iter()
                .map_err(|e| GdmError::Storage(e.to_string()))?
            {
                let (_, value) = entry.map_err(|e| GdmError::Storage(e.to_string()))?;
                let edge: StoredEdge = postcard::from_bytes(value.value())
                    .map_err(|e| GdmError::Serialization(e.to_string()))?;
                touched.insert(edge.from.0);
                touched.insert(edge.to.0);
            }
        }

        // Pass 2: drop the nodes that nothing points at anymore, if they are
        // the provenance's own or just lost their last edge.
        let mut orphans = Vec::new();
        {
            let nodes = txn
                .open_table(NODES)
                .map_err(|e| GdmError::Storage(e.to_string()))?;
            for entry in nodes
                .iter()
                .map_err(|e| GdmError::Storage(e.to_string()))?
            {
                let (key, value) = entry.map_err(|e| GdmError::Storage(e.to_string()))?;
                let node: StoredNode = postcard::from_bytes(value.value())
                    .map_err(|e| GdmError::Serialization(e.to_string()))?;
                let id = key.value();
                if !touched.contains(&id)
                    && (node.has_provenance(provenance) || released.contains(&id))
                {
                    orphans.push((id, node));
                }
            }
        }

        for (id, node) in orphans {
            {
                let mut nodes = txn
                    .open_table(NODES)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                nodes
                    .remove(id)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
            }
            if let Some((kind, key)) = node.index_entry() {
                let mut index = txn
                    .open_table(NODE_INDEX)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                index
                    .remove(kind.index_key(key).as_str())
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
            }
            if !node.labels.is_empty() {
                let mut labels = txn
                    .open_table(LABELS)
                    .map_err(|e| GdmError::Storage(e.to_string()))?;
                for label in &node.labels {
                    labels
                        .remove((label.as_str(), id))
                        .map_err(|e| GdmError::Storage(e.to_string()))?;
                }
            }
            counts.nodes += 1;
        }

        Ok(counts)
    }

    fn node_count(&self) -> Result<usize, GdmError> {
        let len = match &self.txn {
            Some(txn) => txn
                .open_table(NODES)
                .map_err(|e| GdmError::Storage(e.to_string()))?
                .len()
                .map_err(|e| GdmError::Storage(e.to_string()))?,
            None => self
                .db
                .begin_read()
                .map_err(|e| GdmError::Storage(e.to_string()))?
                .open_table(NODES)
                .map_err(|e| GdmError::Storage(e.to_string()))?
                .len()
                .map_err(|e| GdmError::Storage(e.to_string()))?,
        };
        Ok(len as usize)
    }

    fn edge_count(&self) -> Result<usize, GdmError> {
        let len = match &self.txn {
            Some(txn) => txn
                .open_table(EDGES)
                .map_err(|e| GdmError::Storage(e.to_string()))?
                .len()
                .map_err(|e| GdmError::Storage(e.to_string()))?,
            None => self
                .db
                .begin_read()
                .map_err(|e| GdmError::Storage(e.to_string()))?
                .open_table(EDGES)
                .map_err(|e| GdmError::Storage(e.to_string()))?
                .len()
                .map_err(|e| GdmError::Storage(e.to_string()))?,
        };
        Ok(len as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
