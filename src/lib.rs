//! Graphweave
//!
//! Builds positioned, clustered, edge-bounded knowledge graphs from content
//! records for interactive 3D visualization.
//!
//! # Architecture
//!
//! A build runs these stages over one record set:
//!
//! - **Graph builder**: document nodes, derived insight and tag nodes,
//!   reference edges and candidate similarity edges scored by the
//!   multi-factor similarity engine
//! - **Layout**: force-directed, hierarchical or circular 3D positions
//! - **Clustering**: semantic, k-means or hierarchical clusters
//! - **Edge filtering**: per-node edge bounds, optional cluster-level
//!   reduction and a connectivity guarantee
//!
//! The orchestrator sits in front of the pipeline: it caches graphs by the
//! fingerprint of their transformation options, runs at most one build per
//! fingerprint, keeps the current graph and broadcasts lifecycle events.
//!
//! ## Example Usage
//!
//! ```rust
//! use graphweave::{GraphPipeline, PipelineConfig, SourceRecord};
//! use serde_json::json;
//!
//! let records = vec![
//!     SourceRecord::new("a", "Retrieval notes", "Chunking strategies for retrieval pipelines")
//!         .with_property("Tags", json!(["RAG"])),
//!     SourceRecord::new("b", "Agent notes", "Planning loops for tool-using agents")
//!         .with_property("Tags", json!(["Agents"])),
//! ];
//!
//! let graph = GraphPipeline::new(PipelineConfig::default()).run(&records, 1);
//! assert!(graph.validate().is_ok());
//! assert!(graph.get_node(&"a".into()).is_some());
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod builder;
pub mod cache;
pub mod config;
pub mod filter;
pub mod graph;
pub mod orchestrator;
pub mod pipeline;
pub mod similarity;
pub mod source;

// Re-export main types for convenience
pub use graph::{
    Cluster, ClusterType, Edge, EdgeId, EdgeType, Graph, GraphError, GraphEvent, GraphMetadata,
    GraphResult, GraphStatistics, Node, NodeId, NodeType, Vec3,
};

pub use config::{
    CacheConfig, ClusteringMethod, ClusteringOptions, ConfigError, ConfigResult,
    EdgeFilteringOptions, ImportanceWeights, LayoutConfig, LayoutMethod, PipelineConfig,
    TransformationOptions,
};

pub use similarity::{SimilarityConfig, SimilarityEngine, SimilarityFactors};

pub use builder::{GraphBuilder, InsightExtractor, InsightPattern};

pub use filter::{EdgeFilter, FilterReport};

pub use algo::{ClusteringStage, LayoutStage};

pub use cache::{CacheStats, TtlLruCache};

pub use pipeline::{BuildReport, GraphPipeline};

pub use orchestrator::{GraphOrchestrator, OrchestratorMetrics, PipelineError, PipelineResult};

pub use source::{ContentSource, JsonFileSource, SourceError, SourceRecord, SourceResult, StaticSource};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
