//! One full build: records in, positioned and clustered graph out
//!
//! Stages run in a fixed order: build, layout, clustering, edge filtering.
//! Layout runs on the candidate edges so that k-means and the
//! nearest-neighbour connectivity edges see real coordinates; clustering
//! runs before filtering so that cluster-level edge reduction sees real
//! cluster ids.

use crate::algo::{ClusteringStage, LayoutStage};
use crate::builder::GraphBuilder;
use crate::config::{ClusteringOptions, PipelineConfig, TransformationOptions};
use crate::filter::{EdgeFilter, FilterReport};
use crate::graph::Graph;
use crate::similarity::{SimilarityCache, SimilarityEngine};
use crate::source::SourceRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Counts collected while running the stages
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub records: usize,
    pub candidate_edges: usize,
    /// Non-finite coordinates reset by the layout stage
    pub layout_resets: usize,
    pub filter: FilterReport,
    pub duration: Duration,
}

/// Runs the stages with one configuration
#[derive(Debug, Clone, Default)]
pub struct GraphPipeline {
    config: PipelineConfig,
    similarity_cache: Option<Arc<SimilarityCache>>,
    reference_time: Option<DateTime<Utc>>,
}

impl GraphPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            similarity_cache: None,
            reference_time: None,
        }
    }

    /// Share a pairwise similarity cache across runs
    pub fn with_similarity_cache(mut self, cache: Arc<SimilarityCache>) -> Self {
        self.similarity_cache = Some(cache);
        self
    }

    /// Fix the time recency is measured against (defaults to the run start)
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build with the configured transformation options
    pub fn run(&self, records: &[SourceRecord], version: u64) -> Graph {
        self.run_with_options(records, &self.config.transformation, version).0
    }

    /// Build with explicit transformation options
    pub fn run_with_options(
        &self,
        records: &[SourceRecord],
        options: &TransformationOptions,
        version: u64,
    ) -> (Graph, BuildReport) {
        let started = Instant::now();
        let now = self.reference_time.unwrap_or_else(Utc::now);
        let mut report = BuildReport {
            records: records.len(),
            ..Default::default()
        };

        if records.is_empty() {
            debug!("No records, returning an empty graph");
            report.duration = started.elapsed();
            return (Graph::empty(version), report);
        }

        let mut engine = SimilarityEngine::new(self.config.similarity.clone()).with_reference_time(now);
        if let Some(cache) = &self.similarity_cache {
            engine = engine.with_cache(Arc::clone(cache));
        }
        let output = GraphBuilder::new(options.clone(), engine)
            .with_reference_time(now)
            .build(records);
        let mut nodes = output.nodes;
        report.candidate_edges = output.edges.len();

        report.layout_resets =
            LayoutStage::new(self.config.layout.clone()).apply(&mut nodes, &output.edges, options.layout_method);

        let clustering = ClusteringOptions {
            method: options.clustering_method,
            ..self.config.clustering.clone()
        };
        let clusters = ClusteringStage::new(clustering)
            .with_reference_time(now)
            .cluster(&mut nodes, &output.edges);

        let (edges, filter_report) = EdgeFilter::new(self.config.edge_filtering.clone())
            .with_reference_time(now)
            .filter_with_report(&nodes, output.edges);
        report.filter = filter_report;

        let graph = Graph::new(nodes, edges, clusters, version);
        report.duration = started.elapsed();
        info!(
            "Built graph v{}: {} nodes, {} edges ({} candidates), {} clusters in {:?}",
            version,
            graph.node_count(),
            graph.edge_count(),
            report.candidate_edges,
            graph.clusters.len(),
            report.duration
        );
        (graph, report)
    }
}
