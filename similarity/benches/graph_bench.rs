//! Synthetic insert/search benchmark for the graph index.
//!
//! Generates its corpus in-process (deterministic embeddings of numbered
//! phrases) so the benchmark runs without an external dataset download.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use trajectory_similarity::embedder;
use trajectory_similarity::graph::index::GraphIndex;

const DIM: usize = 64;

fn corpus(n: usize) -> Vec<(String, trajectory_similarity::Vector)> {
    (0..n)
        .map(|i| {
            let text = format!("agent performed action number {i} on object {}", i % 37);
            (format!("id-{i}"), embedder::embed(&text, DIM))
        })
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let data = corpus(2_000);
    c.bench_function("graph_insert_2000", |b| {
        b.iter_batched(
            || GraphIndex::with_seed(DIM, 16, 200, 50, Some(1)),
            |index| {
                for (id, v) in &data {
                    index.insert(id.clone(), v.clone()).unwrap();
                }
                black_box(index);
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_search(c: &mut Criterion) {
    let data = corpus(2_000);
    let index = GraphIndex::with_seed(DIM, 16, 200, 50, Some(1));
    for (id, v) in &data {
        index.insert(id.clone(), v.clone()).unwrap();
    }
    let query = embedder::embed("agent performed action number 5 on object 5", DIM);

    c.bench_function("graph_search_top10_of_2000", |b| {
        b.iter(|| black_box(index.search(&query, 10).unwrap()));
    });
}

criterion_group!(benches, bench_insert, bench_search);
criterion_main!(benches);
