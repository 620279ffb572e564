//! # Conversion Pipeline
//!
//! Drives recorded events through the pipes, the encoder and the writer.
//!
//! Failures are reported per record, tagged with the stage that failed, so a
//! caller can skip or retry one record without abandoning the whole run.

use crate::config::GdmConfig;
use crate::encoder::GdmEncoder;
use crate::model::{GdmUnit, GraphModel};
use crate::reader::GraphReader;
use crate::storage::PropertyGraph;
use crate::stream::{Event, Unflattener, replay, split_records};
use crate::types::GdmError;
use crate::writer::{GraphWriter, WritePolicy, WriteStats};
use std::fmt;
use thiserror::Error;

/// The pipeline step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encode,
    Write,
    Commit,
    Read,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Encode => "encode",
            Self::Write => "write",
            Self::Commit => "commit",
            Self::Read => "read",
        };
        f.write_str(name)
    }
}

/// A pipeline failure for one record.
#[derive(Debug, Error)]
#[error("record {record}: {stage} failed: {source}")]
pub struct ConversionError {
    pub record: String,
    pub stage: Stage,
    pub source: GdmError,
}

impl ConversionError {
    fn new(record: impl Into<String>, stage: Stage, source: GdmError) -> Self {
        Self {
            record: record.into(),
            stage,
            source,
        }
    }
}

/// Outcome of a successful conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub records: usize,
    pub stats: WriteStats,
}

/// Whether the record events go through the path unflattener first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Shape {
    #[default]
    Nested,
    Flat,
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode every record in `events` into GDM units.
///
/// Events outside a record are ignored.
pub fn encode_events(
    events: &[Event],
    config: &GdmConfig,
    shape: Shape,
) -> Result<Vec<GdmUnit>, ConversionError> {
    let mut encoder = GdmEncoder::new(Vec::new(), config);
    let mut units = Vec::new();

    for record in split_records(events) {
        units.push(encode_record(&mut encoder, record, config, shape)?);
    }
    Ok(units)
}

fn record_id(record: &[Event]) -> &str {
    match record.first() {
        Some(Event::StartRecord { id }) => id,
        _ => "",
    }
}

/// Reject entity events that would close more scopes than are open.
fn check_balance(record: &[Event]) -> Result<(), GdmError> {
    let mut depth = 0usize;
    for event in record {
        match event {
            Event::StartEntity { .. } => depth += 1,
            Event::EndEntity => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    GdmError::InvalidStatement("end_entity without an open entity".to_string())
                })?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn encode_record(
    encoder: &mut GdmEncoder<Vec<GdmUnit>>,
    record: &[Event],
    config: &GdmConfig,
    shape: Shape,
) -> Result<GdmUnit, ConversionError> {
    let id = record_id(record);
    check_balance(record).map_err(|e| ConversionError::new(id, Stage::Encode, e))?;

    match shape {
        Shape::Nested => replay(record, encoder),
        Shape::Flat => {
            let mut pipe = Unflattener::with_options(
                &mut *encoder,
                config.entity_marker,
                &config.initial_discard,
            );
            replay(record, &mut pipe);
        }
    }

    encoder.sink_mut().pop().ok_or_else(|| {
        ConversionError::new(
            id,
            Stage::Encode,
            GdmError::InvalidStatement("record produced no unit".to_string()),
        )
    })
}

// =============================================================================
// WRITE / READ
// =============================================================================

/// Encode `events` and write every record into `graph` under `provenance`.
pub fn convert_events<G: PropertyGraph>(
    events: &[Event],
    config: &GdmConfig,
    shape: Shape,
    graph: &mut G,
    provenance: &str,
) -> Result<ConversionReport, ConversionError> {
    let mut encoder = GdmEncoder::new(Vec::new(), config);
    let mut writer = GraphWriter::new(graph, provenance, WritePolicy::from(config))
        .map_err(|e| ConversionError::new("", Stage::Write, e))?;
    let mut records = 0;
    let mut last_record = String::new();

    for record in split_records(events) {
        let unit = encode_record(&mut encoder, record, config, shape)?;
        writer
            .write_unit(&unit)
            .map_err(|e| ConversionError::new(unit.record_uri.as_str(), Stage::Write, e))?;
        last_record = unit.record_uri;
        records += 1;
    }

    let stats = writer
        .finish()
        .map_err(|e| ConversionError::new(last_record, Stage::Commit, e))?;
    tracing::info!(
        "Converted {} records into {} ({} triples, {} failed statements)",
        records,
        provenance,
        stats.triples,
        stats.failed_statements
    );
    Ok(ConversionReport { records, stats })
}

/// Read back every record of `record_type` stored under `provenance`.
pub fn read_records<G: PropertyGraph>(
    graph: &G,
    record_type: &str,
    provenance: &str,
) -> Result<GraphModel, ConversionError> {
    GraphReader::new(graph, record_type, provenance)
        .read()
        .map_err(|e| ConversionError::new(record_type, Stage::Read, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::primitives::RDF_TYPE;
    use crate::storage::MemoryGraph;

    const PROV: &str = "http://x/resource/1/configurations/1/data";
    const BOOK: &str = "http://x#Book";

    fn config() -> GdmConfig {
        GdmConfig {
            base_uri: "http://x/".to_string(),
            data_model_id: Some("1".to_string()),
            ..GdmConfig::default()
        }
    }

    fn book(id: &str) -> Vec<Event> {
        vec![
            Event::start_record(id),
            Event::literal(RDF_TYPE, BOOK),
            Event::literal("title", "Faust"),
            Event::EndRecord,
        ]
    }

    #[test]
    fn flat_shape_unflattens_paths() {
        let events = vec![
            Event::start_record("1"),
            Event::literal("author.name", "Goethe"),
            Event::EndRecord,
        ];
        let units = encode_events(&events, &config(), Shape::Flat).expect("encode");
        let statements: Vec<_> = units[0].model.statements().collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].object, crate::types::Node::Blank(1));
    }

    #[test]
    fn convert_and_read_back() {
        let mut events = book("1");
        events.extend(book("2"));

        let mut graph = MemoryGraph::new();
        let report =
            convert_events(&events, &config(), Shape::Nested, &mut graph, PROV).expect("convert");
        assert_eq!(report.records, 2);
        assert_eq!(report.stats.triples, 4);

        let model = read_records(&graph, BOOK, PROV).expect("read");
        assert_eq!(model.resources().count(), 2);
        assert_eq!(model.statement_count(), 4);
    }

    #[test]
    fn unbalanced_record_reports_encode_stage() {
        let events = vec![
            Event::start_record("bad"),
            Event::EndEntity,
            Event::EndRecord,
        ];
        let err = encode_events(&events, &config(), Shape::Nested).expect_err("must fail");
        assert_eq!(err.stage, Stage::Encode);
        assert_eq!(err.record, "bad");
        assert!(err.to_string().contains("encode failed"));
    }
}
