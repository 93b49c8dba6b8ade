use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use graphweave::config::LayoutMethod;
use graphweave::similarity::SimilarityEngine;
use graphweave::{GraphBuilder, GraphPipeline, LayoutStage, PipelineConfig, SourceRecord, TransformationOptions};
use serde_json::json;

const WORDS: [&str; 16] = [
    "retrieval", "agents", "planning", "evaluation", "embedding", "reranking", "prompting", "context",
    "latency", "throughput", "grounding", "tooling", "memory", "routing", "safety", "benchmark",
];

fn records(count: usize) -> Vec<SourceRecord> {
    (0..count)
        .map(|i| {
            let body: Vec<&str> = (0..40).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect();
            SourceRecord::new(format!("doc-{}", i), format!("Document {}", i), body.join(" "))
                .with_property("Tags", json!([WORDS[i % WORDS.len()], WORDS[(i + 5) % WORDS.len()]]))
        })
        .collect()
}

/// Benchmark candidate generation, dominated by pairwise scoring
fn bench_pair_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_scoring");

    for size in [50, 200, 500].iter() {
        let input = records(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            let options = TransformationOptions {
                include_insights: false,
                include_tags: false,
                ..Default::default()
            };
            let builder = GraphBuilder::new(options, SimilarityEngine::new(Default::default()));
            b.iter(|| builder.build(input));
        });
    }
    group.finish();
}

/// Benchmark the layout methods on a built node set
fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let output = GraphBuilder::new(TransformationOptions::default(), SimilarityEngine::new(Default::default()))
        .build(&records(300));
    let stage = LayoutStage::default();

    for method in [LayoutMethod::ForceDirected, LayoutMethod::Hierarchical, LayoutMethod::Circular] {
        group.bench_function(format!("{:?}", method), |b| {
            b.iter(|| {
                let mut nodes = output.nodes.clone();
                stage.apply(&mut nodes, &output.edges, method)
            });
        });
    }
    group.finish();
}

/// Benchmark a complete build
fn bench_full_pipeline(c: &mut Criterion) {
    let input = records(200);
    let pipeline = GraphPipeline::new(PipelineConfig::default());
    c.bench_function("full_pipeline_200", |b| b.iter(|| pipeline.run(&input, 1)));
}

criterion_group!(benches, bench_pair_scoring, bench_layout, bench_full_pipeline);
criterion_main!(benches);
