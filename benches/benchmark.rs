use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use std::sync::Arc;

use policyrag::chunk::{Chunk, DocumentId};
use policyrag::chunker::chunk_text;
use policyrag::embedding::{EmbeddingRole, ResilientEmbedder};
use policyrag::index::VectorIndex;
use policyrag::ingest::IngestPipeline;
use policyrag::references::extract_references;

const DIMENSIONS: usize = 768;
const NUM_SENTENCES: usize = 2_000; // Sentences in the synthetic policy
const NUM_QUERIES: usize = 10; // Queries per retrieval iteration

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(20))
        .warm_up_time(std::time::Duration::from_secs(3))
        .configure_from_args()
}

fn synthetic_policy(sentences: usize, rng: &mut StdRng) -> String {
    const TOPICS: [&str; 6] = [
        "remote work",
        "travel expenses",
        "data retention",
        "badge access",
        "overtime approval",
        "vendor gifts",
    ];
    (0..sentences)
        .map(|i| {
            let topic = TOPICS[rng.gen_range(0..TOPICS.len())];
            format!(
                "Section {}.{} governs {} and requires written approval from a manager.",
                i / 10 + 1,
                i % 10,
                topic
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn chunk_policy(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let text = synthetic_policy(NUM_SENTENCES, &mut rng);

    let mut group = c.benchmark_group("chunk_policy");
    for chunk_size in [100usize, 500, 1000] {
        group.bench_with_input(
            BenchmarkId::new(format!("{}_sentences", NUM_SENTENCES), chunk_size),
            &chunk_size,
            |b, &chunk_size| b.iter(|| chunk_text(black_box(&text), chunk_size, chunk_size / 10)),
        );
    }
    group.finish();

    c.bench_function("extract_references", |b| {
        b.iter(|| extract_references(black_box(&text)))
    });
}

fn retrieve_chunks(c: &mut Criterion) {
    let embedder = ResilientEmbedder::fallback_only(DIMENSIONS);
    let mut rng = StdRng::seed_from_u64(11);
    let queries: Vec<Vec<f32>> = (0..NUM_QUERIES)
        .map(|i| {
            embedder
                .embed(&format!("question {} {}", i, rng.gen::<u32>()), EmbeddingRole::Query)
                .unwrap()
                .vector
        })
        .collect();

    let mut group = c.benchmark_group("retrieve");
    for num_chunks in [1_000usize, 10_000] {
        let index = VectorIndex::new(DIMENSIONS);
        for i in 0..num_chunks {
            let text = format!("Clause {} of the handbook.", i);
            let vector = embedder.embed(&text, EmbeddingRole::Document).unwrap().vector;
            index
                .insert(Chunk::new(DocumentId((i / 50) as u64), i % 50, text, vector, Vec::new()))
                .unwrap();
        }
        group.bench_with_input(
            BenchmarkId::new(format!("top5_{}_queries", NUM_QUERIES), num_chunks),
            &index,
            |b, index| {
                b.iter(|| {
                    for query in &queries {
                        black_box(index.retrieve(query, 5).unwrap());
                    }
                })
            },
        );
    }
    group.finish();
}

fn ingest_document(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let chunks = chunk_text(&synthetic_policy(400, &mut rng), 500, 50);
    let embedder = Arc::new(ResilientEmbedder::fallback_only(DIMENSIONS));

    c.bench_function(&format!("ingest_{}_chunks", chunks.len()), |b| {
        b.iter(|| {
            let index = Arc::new(VectorIndex::new(DIMENSIONS));
            let pipeline = IngestPipeline::new(index, Arc::clone(&embedder));
            black_box(pipeline.ingest(DocumentId(1), "bench", &chunks))
        })
    });
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = chunk_policy, retrieve_chunks, ingest_document
}
criterion_main!(benches);
