//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::CliError;
use gdm_core::{
    Event, GdmConfig, GdmError, PropertyGraph, RedbGraph, Shape, Transformation, compile,
    convert_events, model_to_json, read_records,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of an events file (500 MB).
const MAX_EVENTS_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Maximum size of a transformations file (10 MB).
const MAX_MAPPING_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Canonicalize an input path and check it names a regular file within
/// `max_size` bytes.
fn validate_input_file(path: &Path, max_size: u64) -> Result<PathBuf, GdmError> {
    let canonical = path.canonicalize().map_err(|e| {
        GdmError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(GdmError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| GdmError::Io(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > max_size {
        return Err(GdmError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its canonical parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, GdmError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        GdmError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    let filename = path
        .file_name()
        .ok_or_else(|| GdmError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, max_size: u64) -> Result<T, GdmError> {
    let validated = validate_input_file(path, max_size)?;
    let contents = std::fs::read(&validated)
        .map_err(|e| GdmError::Io(format!("Read file: {}", e)))?;
    serde_json::from_slice(&contents)
        .map_err(|e| GdmError::Json(format!("{}: {}", path.display(), e)))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// CONVERT COMMAND
// =============================================================================

/// Encode an events file and write it under `provenance`.
pub fn cmd_convert(
    db_path: &Path,
    config: &GdmConfig,
    json_mode: bool,
    input: &Path,
    flat: bool,
    provenance: &str,
) -> Result<(), CliError> {
    let shape = if flat { Shape::Flat } else { Shape::Nested };
    tracing::info!("Converting {:?} into {} ({:?})", input, provenance, shape);

    let events: Vec<Event> = read_json(input, MAX_EVENTS_FILE_SIZE)?;
    let mut graph = RedbGraph::open(db_path)?;
    let report = convert_events(&events, config, shape, &mut graph, provenance)?;
    let stats = report.stats;

    if json_mode {
        print_json(&serde_json::json!({
            "provenance": provenance,
            "records": report.records,
            "triples": stats.triples,
            "nodes_created": stats.nodes_created,
            "edges_created": stats.edges_created,
            "literals_created": stats.literals_created,
            "labels_added": stats.labels_added,
            "failed_statements": stats.failed_statements,
            "rolled_back_statements": stats.rolled_back_statements,
            "commits": stats.commits
        }));
        return Ok(());
    }

    println!("Converted {} records into {}", report.records, provenance);
    println!();
    println!("Triples:       {}", stats.triples);
    println!("Nodes created: {}", stats.nodes_created);
    println!("  Literals:    {}", stats.literals_created);
    println!("Edges created: {}", stats.edges_created);
    println!("Labels added:  {}", stats.labels_added);
    println!("Commits:       {}", stats.commits);
    if stats.failed_statements > 0 {
        println!(
            "Failed:        {} ({} rolled back with them)",
            stats.failed_statements, stats.rolled_back_statements
        );
    }

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Read every record of `record_type` under `provenance` and write GDM JSON.
pub fn cmd_export(
    db_path: &Path,
    output: &Path,
    record_type: &str,
    provenance: &str,
) -> Result<(), CliError> {
    let validated_output = validate_output_path(output)?;

    let graph = RedbGraph::open(db_path)?;
    let model = read_records(&graph, record_type, provenance)?;

    let data = serde_json::to_vec_pretty(&model_to_json(&model))
        .map_err(|e| GdmError::Serialization(e.to_string()))?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| GdmError::Io(format!("Write file: {}", e)))?;

    println!(
        "Exported {} records ({} statements) to {:?}",
        model.resources().count(),
        model.statement_count(),
        validated_output
    );

    Ok(())
}

// =============================================================================
// MORPH COMMAND
// =============================================================================

/// Compile a transformations file into a metamorph script.
pub fn cmd_morph(input: &Path, output: Option<&Path>, compact: bool) -> Result<(), CliError> {
    let transformations: Vec<Transformation> = read_json(input, MAX_MAPPING_FILE_SIZE)?;

    let xml = compile(&transformations).and_then(|script| script.render(!compact))?;

    match output {
        Some(path) => {
            let validated_output = validate_output_path(path)?;
            std::fs::write(&validated_output, xml.as_bytes())
                .map_err(|e| GdmError::Io(format!("Write file: {}", e)))?;
            println!(
                "Compiled {} transformations to {:?}",
                transformations.len(),
                validated_output
            );
        }
        None => println!("{}", xml),
    }

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Store counters shown by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub database: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub labels: Vec<String>,
}

impl StoreStatus {
    pub fn collect<G: PropertyGraph>(graph: &G, database: &Path) -> Result<Self, GdmError> {
        Ok(Self {
            database: database.to_string_lossy().into_owned(),
            node_count: graph.node_count()?,
            edge_count: graph.edge_count()?,
            labels: graph.labels()?,
        })
    }
}

/// Show store status.
pub fn cmd_status(db_path: &Path, json_mode: bool) -> Result<(), CliError> {
    let graph = RedbGraph::open(db_path)?;
    let status = StoreStatus::collect(&graph, db_path)?;

    if json_mode {
        let value = serde_json::to_value(&status)
            .map_err(|e| GdmError::Serialization(e.to_string()))?;
        print_json(&value);
        return Ok(());
    }

    println!("GDM Store Status");
    println!("================");
    println!("Database: {}", status.database);
    println!();
    println!("Nodes:  {}", status.node_count);
    println!("Edges:  {}", status.edge_count);
    println!("Labels: {}", status.labels.len());
    for label in &status.labels {
        println!("  {}", label);
    }

    Ok(())
}

// =============================================================================
// DELETE COMMAND
// =============================================================================

/// Delete everything written under `provenance`.
pub fn cmd_delete(db_path: &Path, json_mode: bool, provenance: &str) -> Result<(), CliError> {
    let mut graph = RedbGraph::open(db_path)?;

    graph.begin()?;
    let counts = match graph.delete_provenance(provenance) {
        Ok(counts) => counts,
        Err(e) => {
            graph.rollback()?;
            return Err(e.into());
        }
    };
    graph.commit()?;
    tracing::info!(
        "Deleted {} nodes and {} edges of {}",
        counts.nodes,
        counts.edges,
        provenance
    );

    if json_mode {
        print_json(&serde_json::json!({
            "provenance": provenance,
            "nodes": counts.nodes,
            "edges": counts.edges
        }));
        return Ok(());
    }

    println!(
        "Deleted {} nodes and {} edges of {}",
        counts.nodes, counts.edges, provenance
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use gdm_core::primitives::RDF_TYPE;
    use gdm_core::{MorphError, Stage};
    use tempfile::tempdir;

    const BOOK: &str = "http://x/vocab#Book";
    const PROV: &str = "http://x/resource/1/configurations/1/data";

    fn config() -> GdmConfig {
        GdmConfig {
            base_uri: "http://x/".to_string(),
            data_model_id: Some("1".to_string()),
            ..GdmConfig::default()
        }
    }

    fn write_events(dir: &Path) -> PathBuf {
        let events = vec![
            Event::start_record("1"),
            Event::literal(RDF_TYPE, BOOK),
            Event::literal("title", "Faust"),
            Event::EndRecord,
        ];
        let path = dir.join("events.json");
        std::fs::write(&path, serde_json::to_vec(&events).expect("encode events"))
            .expect("write events");
        path
    }

    #[test]
    fn convert_export_delete() {
        let dir = tempdir().expect("create temp dir");
        let db = dir.path().join("gdm.redb");
        let events = write_events(dir.path());

        cmd_convert(&db, &config(), true, &events, false, PROV).expect("convert");

        let output = dir.path().join("out.json");
        cmd_export(&db, &output, BOOK, PROV).expect("export");
        let exported: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&output).expect("read export"))
                .expect("parse export");
        let records = exported.as_object().expect("object");
        assert_eq!(records.len(), 1);

        {
            let graph = RedbGraph::open(&db).expect("open");
            let status = StoreStatus::collect(&graph, &db).expect("status");
            assert_eq!(status.edge_count, 2);
            assert_eq!(status.labels, vec![BOOK.to_string()]);
        }

        cmd_delete(&db, true, PROV).expect("delete");
        let graph = RedbGraph::open(&db).expect("open");
        assert_eq!(graph.edge_count().expect("count"), 0);
    }

    #[test]
    fn morph_writes_script() {
        let dir = tempdir().expect("create temp dir");
        let input = dir.path().join("mappings.json");
        std::fs::write(
            &input,
            r#"[{"name": "t1", "source": {"name": "in.title"}, "target": {"name": "out.title"}}]"#,
        )
        .expect("write mappings");

        let output = dir.path().join("morph.xml");
        cmd_morph(&input, Some(&output), true).expect("morph");
        let xml = std::fs::read_to_string(&output).expect("read script");
        assert!(xml.contains("<data source=\"in.title\" name=\"out.title\"/>"));
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let dir = tempdir().expect("create temp dir");
        let err = cmd_morph(&dir.path().join("absent.json"), None, true).expect_err("must fail");
        assert!(matches!(err, CliError::Gdm(GdmError::Io(_))));
    }

    #[test]
    fn unbalanced_events_report_record_and_stage() {
        let dir = tempdir().expect("create temp dir");
        let db = dir.path().join("gdm.redb");
        let events = vec![
            Event::start_record("1"),
            Event::literal("title", "Faust"),
            Event::EndRecord,
            Event::start_record("2"),
            Event::literal("name", "Goethe"),
            Event::EndEntity,
            Event::EndRecord,
        ];
        let input = dir.path().join("events.json");
        std::fs::write(&input, serde_json::to_vec(&events).expect("encode events"))
            .expect("write events");

        let err = cmd_convert(&db, &config(), true, &input, false, PROV).expect_err("must fail");
        match err {
            CliError::Conversion(e) => {
                assert_eq!(e.record, "2");
                assert_eq!(e.stage, Stage::Encode);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn morph_failures_stay_typed() {
        let dir = tempdir().expect("create temp dir");
        let input = dir.path().join("mappings.json");
        std::fs::write(
            &input,
            r#"[{"source": {"name": "in.title"}, "target": {"name": "out.title"}}]"#,
        )
        .expect("write mappings");

        let err = cmd_morph(&input, None, true).expect_err("must fail");
        assert!(matches!(
            err,
            CliError::Morph(MorphError::MissingName { transformation: 0 })
        ));
    }
}
