//! # Graph Store Writer
//!
//! Persists `GdmUnit`s into a `PropertyGraph`.
//!
//! ## Per statement
//!
//! 1. Resolve the subject node by `(kind, key)`, creating it when absent.
//! 2. Literal objects always get a fresh node; they are never shared.
//! 3. Resource objects are resolved like subjects. Under the type predicate
//!    the object URI also becomes a label on the subject.
//! 4. One edge subject → object carries the predicate, provenance and order.
//!
//! ## Batching
//!
//! The writer keeps one transaction open and commits it every
//! `batch_size` statements or `interval` of wall time, whichever comes
//! first. A failing statement rolls the open transaction back and a fresh one
//! is begun; the statement is not retried and neither are the uncommitted
//! statements before it. The batch as a whole is therefore not atomic.

use crate::config::GdmConfig;
use crate::model::GdmUnit;
use crate::primitives::{COMMIT_BATCH_SIZE, COMMIT_INTERVAL, RDF_TYPE};
use crate::storage::{PropertyGraph, StoredEdge, StoredNode};
use crate::types::{GdmError, Node, NodeId, Statement};
use std::time::{Duration, Instant};

// =============================================================================
// POLICY AND COUNTERS
// =============================================================================

/// When the writer commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    pub batch_size: u64,
    pub interval: Duration,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            batch_size: COMMIT_BATCH_SIZE,
            interval: COMMIT_INTERVAL,
        }
    }
}

impl From<&GdmConfig> for WritePolicy {
    fn from(config: &GdmConfig) -> Self {
        Self {
            batch_size: config.commit_batch_size.max(1),
            interval: config.commit_interval(),
        }
    }
}

/// Running counters of committed work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub triples: u64,
    pub nodes_created: u64,
    pub edges_created: u64,
    pub labels_added: u64,
    pub literals_created: u64,
    /// Statements whose own write failed.
    pub failed_statements: u64,
    /// Statements that had succeeded but were discarded by a rollback.
    pub rolled_back_statements: u64,
    pub commits: u64,
}

impl WriteStats {
    fn absorb(&mut self, pending: &WriteStats) {
        self.triples += pending.triples;
        self.nodes_created += pending.nodes_created;
        self.edges_created += pending.edges_created;
        self.labels_added += pending.labels_added;
        self.literals_created += pending.literals_created;
    }
}

// =============================================================================
// WRITER
// =============================================================================

/// Writes units into a store under one provenance.
///
/// Holds the store's write transaction for its whole lifetime. Call
/// `finish` to commit the tail; dropping the writer rolls it back.
pub struct GraphWriter<'g, G: PropertyGraph> {
    graph: &'g mut G,
    provenance: String,
    policy: WritePolicy,
    stats: WriteStats,
    pending: WriteStats,
    batch_started: Instant,
    started: Instant,
}

impl<G: PropertyGraph> std::fmt::Debug for GraphWriter<'_, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphWriter")
            .field("provenance", &self.provenance)
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl<'g, G: PropertyGraph> GraphWriter<'g, G> {
    /// Begin a transaction on `graph` and return a writer over it.
    pub fn new(
        graph: &'g mut G,
        provenance: impl Into<String>,
        policy: WritePolicy,
    ) -> Result<Self, GdmError> {
        graph.begin()?;
        let now = Instant::now();
        Ok(Self {
            graph,
            provenance: provenance.into(),
            policy,
            stats: WriteStats::default(),
            pending: WriteStats::default(),
            batch_started: now,
            started: now,
        })
    }

    #[must_use]
    pub fn provenance(&self) -> &str {
        &self.provenance
    }

    /// Counters of committed work so far.
    #[must_use]
    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Write every statement of a unit, in order.
    ///
    /// Statement failures are absorbed (see module docs). Errors returned
    /// here come from the store's transaction handling itself.
    pub fn write_unit(&mut self, unit: &GdmUnit) -> Result<(), GdmError> {
        for statement in unit.model.statements() {
            match self.handle_statement(&unit.record_uri, statement) {
                Ok(()) => self.pending.triples += 1,
                Err(e) => {
                    tracing::warn!(
                        "Statement {} failed, rolling back {} uncommitted statements: {}",
                        statement,
                        self.pending.triples,
                        e
                    );
                    self.recover()?;
                }
            }

            if self.batch_due() {
                self.commit_batch()?;
                self.graph.begin()?;
            }
        }

        tracing::debug!(
            "Wrote record {} ({} statements)",
            unit.record_uri,
            unit.model.statement_count()
        );
        Ok(())
    }

    /// Commit the remaining statements and return the final counters.
    pub fn finish(mut self) -> Result<WriteStats, GdmError> {
        self.commit_batch()?;
        Ok(self.stats)
    }

    fn handle_statement(&mut self, record_uri: &str, statement: &Statement) -> Result<(), GdmError> {
        let subject = self.resolve(record_uri, &statement.subject)?;

        let object = match &statement.object {
            Node::Literal { value, datatype } => {
                let id = self.graph.create_node(StoredNode::literal(
                    value.as_str(),
                    datatype.clone(),
                    self.provenance.as_str(),
                ))?;
                self.pending.nodes_created += 1;
                self.pending.literals_created += 1;
                id
            }
            node => {
                if statement.predicate.uri() == RDF_TYPE {
                    if let Some(type_uri) = node.uri() {
                        if self.graph.add_label(subject, type_uri)? {
                            self.pending.labels_added += 1;
                        }
                    }
                }
                self.resolve(record_uri, node)?
            }
        };

        self.graph.create_edge(StoredEdge {
            from: subject,
            to: object,
            uri: statement.predicate.uri().to_string(),
            provenance: self.provenance.clone(),
            order: statement.order,
        })?;
        self.pending.edges_created += 1;
        Ok(())
    }

    /// Find or create the deduplicated node for a resource or blank node.
    fn resolve(&mut self, record_uri: &str, node: &Node) -> Result<NodeId, GdmError> {
        let stored = match node {
            Node::Resource(uri) => StoredNode::resource(uri.as_str(), self.provenance.as_str()),
            Node::Blank(id) => StoredNode::blank(
                format!("{}#bnode{}", record_uri, id),
                self.provenance.as_str(),
            ),
            Node::Literal { value, .. } => {
                return Err(GdmError::InvalidStatement(format!(
                    "literal \"{}\" cannot be a subject",
                    value
                )));
            }
        };

        let (id, created) = self.graph.resolve_node(stored)?;
        if created {
            self.pending.nodes_created += 1;
        }
        Ok(id)
    }

    fn batch_due(&self) -> bool {
        self.pending.triples >= self.policy.batch_size
            || self.batch_started.elapsed() >= self.policy.interval
    }

    /// Commit the open transaction and fold its counters into the totals.
    fn commit_batch(&mut self) -> Result<(), GdmError> {
        self.graph.commit()?;
        self.stats.absorb(&self.pending);
        self.stats.commits += 1;
        self.pending = WriteStats::default();
        self.batch_started = Instant::now();

        let secs = self.started.elapsed().as_secs();
        let rate = if secs == 0 {
            self.stats.triples
        } else {
            self.stats.triples / secs
        };
        tracing::info!(
            "Committed {} triples ({} triples/s)",
            self.stats.triples,
            rate
        );
        Ok(())
    }

    /// Abandon the open transaction after a failed statement.
    fn recover(&mut self) -> Result<(), GdmError> {
        self.stats.failed_statements += 1;
        self.stats.rolled_back_statements += self.pending.triples;
        self.pending = WriteStats::default();
        self.batch_started = Instant::now();

        self.graph.rollback()?;
        self.graph.begin()
    }
}

impl<G: PropertyGraph> Drop for GraphWriter<'_, G> {
    fn drop(&mut self) {
        if self.graph.in_transaction() {
            if let Err(e) = self.graph.rollback() {
                tracing::warn!("Rollback on drop failed: {}", e);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::model::GraphModel;
    use crate::storage::{MemoryGraph, NodeKind};
    use crate::types::Predicate;

    const PROV: &str = "http://x/resource/1/configurations/1/data";
    const RECORD: &str = "http://x/records/1";

    fn unit(literals: usize, type_uri: Option<&str>) -> GdmUnit {
        let mut model = GraphModel::new();
        let subject = Node::resource(RECORD);
        let resource = model.resource_mut(RECORD);
        for i in 0..literals {
            resource.add_statement(Statement::new(
                subject.clone(),
                Predicate::new(&format!("http://x#p{}", i)),
                Node::literal(format!("v{}", i)),
            ));
        }
        if let Some(type_uri) = type_uri {
            resource.add_statement(Statement::new(
                subject.clone(),
                Predicate::new(RDF_TYPE),
                Node::resource(type_uri),
            ));
        }
        GdmUnit::new(model, RECORD)
    }

    #[test]
    fn counters_for_literals_and_type() {
        let mut graph = MemoryGraph::new();
        let mut writer = GraphWriter::new(&mut graph, PROV, WritePolicy::default()).expect("writer");
        writer
            .write_unit(&unit(5, Some("http://x#Book")))
            .expect("write");
        let stats = writer.finish().expect("finish");

        assert_eq!(stats.triples, 6);
        // subject + type object + 5 literals
        assert_eq!(stats.nodes_created, 7);
        assert_eq!(stats.literals_created, 5);
        assert_eq!(stats.edges_created, 6);
        assert_eq!(stats.labels_added, 1);
        assert_eq!(stats.commits, 1);
        assert_eq!(graph.node_count().expect("count"), 7);
        assert!(!graph.in_transaction());
    }

    #[test]
    fn resources_are_deduplicated_across_units() {
        let mut graph = MemoryGraph::new();
        let mut writer = GraphWriter::new(&mut graph, PROV, WritePolicy::default()).expect("writer");
        writer
            .write_unit(&unit(1, Some("http://x#Book")))
            .expect("write");
        writer
            .write_unit(&unit(1, Some("http://x#Book")))
            .expect("write");
        let stats = writer.finish().expect("finish");

        // second unit: subject, type node and label already exist
        assert_eq!(stats.nodes_created, 4);
        assert_eq!(stats.labels_added, 1);
        assert_eq!(stats.edges_created, 4);
    }

    #[test]
    fn stored_edges_carry_provenance_and_order() {
        let mut model = GraphModel::new();
        let subject = Node::resource(RECORD);
        let p = Predicate::new("http://x#subject");
        let resource = model.resource_mut(RECORD);
        resource.add_statement(Statement::with_order(
            subject.clone(),
            p.clone(),
            Node::literal("a"),
            1,
        ));
        resource.add_statement(Statement::with_order(subject, p, Node::literal("b"), 2));

        let mut graph = MemoryGraph::new();
        let mut writer = GraphWriter::new(&mut graph, PROV, WritePolicy::default()).expect("writer");
        writer.write_unit(&GdmUnit::new(model, RECORD)).expect("write");
        writer.finish().expect("finish");

        let root = graph
            .find_node(NodeKind::Uri, RECORD)
            .expect("find")
            .expect("root");
        let orders: Vec<_> = graph
            .outgoing(root)
            .expect("outgoing")
            .into_iter()
            .map(|(_, e)| (e.provenance, e.order))
            .collect();
        assert_eq!(
            orders,
            vec![(PROV.to_string(), Some(1)), (PROV.to_string(), Some(2))]
        );
    }

    #[test]
    fn blank_nodes_are_keyed_by_record() {
        let mut model = GraphModel::new();
        let resource = model.resource_mut(RECORD);
        resource.add_statement(Statement::new(
            Node::resource(RECORD),
            Predicate::new("http://x#author"),
            Node::Blank(1),
        ));
        resource.add_statement(Statement::new(
            Node::Blank(1),
            Predicate::new("http://x#name"),
            Node::literal("Goethe"),
        ));

        let mut graph = MemoryGraph::new();
        let mut writer = GraphWriter::new(&mut graph, PROV, WritePolicy::default()).expect("writer");
        writer.write_unit(&GdmUnit::new(model, RECORD)).expect("write");
        let stats = writer.finish().expect("finish");

        assert_eq!(stats.nodes_created, 3);
        assert!(graph
            .find_node(NodeKind::Bnode, "http://x/records/1#bnode1")
            .expect("find")
            .is_some());
    }

    #[test]
    fn literal_subject_is_isolated() {
        let mut model = GraphModel::new();
        let resource = model.resource_mut(RECORD);
        resource.add_statement(Statement::new(
            Node::literal("oops"),
            Predicate::new("http://x#p"),
            Node::literal("v"),
        ));
        resource.add_statement(Statement::new(
            Node::resource(RECORD),
            Predicate::new("http://x#p"),
            Node::literal("v"),
        ));

        let mut graph = MemoryGraph::new();
        let mut writer = GraphWriter::new(&mut graph, PROV, WritePolicy::default()).expect("writer");
        writer.write_unit(&GdmUnit::new(model, RECORD)).expect("write");
        let stats = writer.finish().expect("finish");

        assert_eq!(stats.failed_statements, 1);
        assert_eq!(stats.rolled_back_statements, 0);
        assert_eq!(stats.triples, 1);
    }

    #[test]
    fn batch_size_forces_commits() {
        let policy = WritePolicy {
            batch_size: 2,
            interval: Duration::from_secs(3600),
        };
        let mut graph = MemoryGraph::new();
        let mut writer = GraphWriter::new(&mut graph, PROV, policy).expect("writer");
        writer.write_unit(&unit(5, None)).expect("write");
        assert_eq!(writer.stats().commits, 2);
        assert_eq!(writer.stats().triples, 4);

        let stats = writer.finish().expect("finish");
        assert_eq!(stats.commits, 3);
        assert_eq!(stats.triples, 5);
    }

    #[test]
    fn elapsed_interval_forces_commits() {
        let policy = WritePolicy {
            batch_size: u64::MAX,
            interval: Duration::ZERO,
        };
        let mut graph = MemoryGraph::new();
        let mut writer = GraphWriter::new(&mut graph, PROV, policy).expect("writer");
        writer.write_unit(&unit(3, Some("http://x#Book"))).expect("write");

        // every statement finds its batch already due
        assert_eq!(writer.stats().commits, 4);
        assert_eq!(writer.stats().triples, 4);

        let stats = writer.finish().expect("finish");
        assert_eq!(stats.commits, 5);
        assert_eq!(stats.triples, 4);
        assert_eq!(graph.edge_count().expect("count"), 4);
    }

    #[test]
    fn dropping_the_writer_rolls_back() {
        let mut graph = MemoryGraph::new();
        {
            let mut writer =
                GraphWriter::new(&mut graph, PROV, WritePolicy::default()).expect("writer");
            writer.write_unit(&unit(2, None)).expect("write");
        }
        assert!(!graph.in_transaction());
        assert_eq!(graph.node_count().expect("count"), 0);
    }

    #[test]
    fn policy_from_config() {
        let config = GdmConfig {
            commit_batch_size: 0,
            commit_interval_secs: 5,
            ..GdmConfig::default()
        };
        let policy = WritePolicy::from(&config);
        assert_eq!(policy.batch_size, 1);
        assert_eq!(policy.interval, Duration::from_secs(5));
    }
}
