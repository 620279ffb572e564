//! # Pipeline Benchmarks
//!
//! Performance benchmarks for encoding, writing and reading records.
//!
//! Run with: `cargo bench -p gdm-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gdm_core::primitives::RDF_TYPE;
use gdm_core::{
    Event, GdmConfig, MemoryGraph, Shape, convert_events, encode_events, read_records,
};
use std::hint::black_box;

const BOOK: &str = "http://x/vocab#Book";
const PROV: &str = "http://x/resource/1/configurations/1/data";

fn config() -> GdmConfig {
    GdmConfig {
        base_uri: "http://x/".to_string(),
        data_model_id: Some("1".to_string()),
        ..GdmConfig::default()
    }
}

/// N typed records with a handful of single and repeated literals each.
fn create_records(count: usize) -> Vec<Event> {
    let mut events = Vec::with_capacity(count * 9);
    for i in 0..count {
        events.push(Event::start_record(i.to_string()));
        events.push(Event::literal(RDF_TYPE, BOOK));
        events.push(Event::literal("title", format!("Title {}", i)));
        events.push(Event::literal("year", (1800 + i % 200).to_string()));
        for s in 0..4 {
            events.push(Event::literal("subject", format!("subject {}", s)));
        }
        events.push(Event::EndRecord);
    }
    events
}

/// Same shape as `create_records`, with dotted paths for the unflattener.
fn create_flat_records(count: usize) -> Vec<Event> {
    let mut events = Vec::with_capacity(count * 6);
    for i in 0..count {
        events.push(Event::start_record(i.to_string()));
        events.push(Event::literal("title", format!("Title {}", i)));
        events.push(Event::literal("author.name", "Goethe"));
        events.push(Event::literal("author.born", "1749"));
        events.push(Event::literal("publisher.place.city", "Leipzig"));
        events.push(Event::EndRecord);
    }
    events
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let config = config();

    for size in [100, 1000, 10000].iter() {
        let events = create_records(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| black_box(encode_events(events, &config, Shape::Nested)));
        });
    }

    group.finish();
}

fn bench_encode_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_flat");
    let config = config();

    for size in [100, 1000].iter() {
        let events = create_flat_records(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| black_box(encode_events(events, &config, Shape::Flat)));
        });
    }

    group.finish();
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_memory");
    let config = config();

    for size in [100, 1000].iter() {
        let events = create_records(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| {
                let mut graph = MemoryGraph::new();
                let report = convert_events(events, &config, Shape::Nested, &mut graph, PROV);
                black_box((report, graph))
            });
        });
    }

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_memory");
    let config = config();

    for size in [100, 1000].iter() {
        let mut graph = MemoryGraph::new();
        convert_events(
            &create_records(*size),
            &config,
            Shape::Nested,
            &mut graph,
            PROV,
        )
        .expect("convert");

        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| black_box(read_records(graph, BOOK, PROV)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_encode_flat,
    bench_convert,
    bench_read
);
criterion_main!(benches);
