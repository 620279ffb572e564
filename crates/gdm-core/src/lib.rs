//! # gdm-core
//!
//! The record-to-graph conversion engine - THE LOGIC.
//!
//! Records arrive as a push-based event stream, are reshaped by pipes,
//! encoded into provenance-aware, order-preserving GDM models, persisted into
//! a property graph and read back by bounded traversal. A separate compiler
//! turns mapping definitions into metamorph scripts.
//!
//! ## Data flow
//!
//! ```text
//! events -> [Unflattener] -> GdmEncoder -> GdmUnit -> GraphWriter -> store
//! store -> GraphReader -> GraphModel -> GDM JSON
//! Transformations -> morph::compile -> MorphScript -> XML
//! ```
//!
//! ## Constraints
//!
//! - Synchronous, no network, no async
//! - Deterministic output: `BTreeMap` everywhere iteration order is visible
//! - Protocol violations in the event stream panic; data problems are errors

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod encoder;
pub mod formats;
pub mod model;
pub mod morph;
pub mod pipeline;
pub mod primitives;
pub mod reader;
pub mod storage;
pub mod stream;
pub mod types;
pub mod uri;
pub mod writer;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{EdgeId, GdmError, Node, NodeId, Predicate, Statement};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use config::GdmConfig;
pub use encoder::{GdmEncoder, UnitSink};
pub use model::{GdmUnit, GraphModel, Resource};
pub use pipeline::{
    ConversionError, ConversionReport, Shape, Stage, convert_events, encode_events, read_records,
};
pub use reader::GraphReader;
pub use storage::{
    DeletedCounts, MemoryGraph, NodeKind, PropertyGraph, RedbGraph, StoredEdge, StoredNode,
};
pub use stream::{
    ArrayCollapser, Event, EventRecorder, ProtocolGuard, StreamReceiver, Unflattener, replay,
    split_records,
};
pub use uri::{is_valid_uri, mint_property_uri, mint_record_uri, provenance_uri, schema_base_uri};
pub use writer::{GraphWriter, WritePolicy, WriteStats};

// =============================================================================
// RE-EXPORTS: Formats and Morph
// =============================================================================

pub use formats::{model_from_json, model_to_json, unit_to_json};
pub use morph::{MorphError, MorphScript, Transformation, compile};
