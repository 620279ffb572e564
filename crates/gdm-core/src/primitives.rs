//! # Primitives
//!
//! Fixed vocabulary and tuning constants shared across the pipeline.
//!
//! The store property names below are a compatibility contract with data
//! already written by other tools: they must not change.

use std::time::Duration;

// =============================================================================
// VOCABULARY
// =============================================================================

/// The RDF namespace.
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// The "type" predicate. Statements using it with a URI object become
/// record types and store labels.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Default root for minted record, data-model and provenance URIs.
pub const DEFAULT_BASE_URI: &str = "http://data.slub-dresden.de/";

// =============================================================================
// STORE PROPERTY NAMES
// =============================================================================

/// Node property holding a resource URI; edge property holding the predicate.
pub const URI_PROPERTY: &str = "uri";

/// Node property holding a blank node key.
pub const BNODE_PROPERTY: &str = "bnode";

/// Node property holding a literal value.
pub const VALUE_PROPERTY: &str = "value";

/// Node property holding a literal datatype URI.
pub const DATATYPE_PROPERTY: &str = "datatype";

/// Node and edge property holding the owning graph's URI.
pub const PROVENANCE_PROPERTY: &str = "provenance";

/// Edge property holding the statement order.
pub const ORDER_PROPERTY: &str = "order";

// =============================================================================
// EVENT PIPES
// =============================================================================

/// Suffix appended to an entity name to mark a collapsed array.
pub const ARRAY_MARKER: &str = "[]";

/// Default path delimiter for flattened literal names (`a.b.c`).
pub const DEFAULT_ENTITY_MARKER: char = '.';

/// Default first path segment to drop while unflattening. The empty string
/// only matches names with a leading delimiter.
pub const DEFAULT_INITIAL_DISCARD: &str = "";

// =============================================================================
// WRITER BATCHING
// =============================================================================

/// Commit after this many statements since the last commit.
pub const COMMIT_BATCH_SIZE: u64 = 150_000;

/// Commit after this much wall time since the last commit.
pub const COMMIT_INTERVAL: Duration = Duration::from_secs(30);
