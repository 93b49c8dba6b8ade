//! Orchestrator metrics

use crate::cache::CacheStats;
use serde::Serialize;

/// Outcome of the latest build plus running totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetrics {
    pub builds: u64,
    pub failures: u64,
    /// Requests answered from the graph cache
    pub cache_hits: u64,
    /// Requests that joined a build already in flight
    pub coalesced: u64,
    pub last_duration_ms: u64,
    pub last_node_count: usize,
    pub last_edge_count: usize,
    pub last_cluster_count: usize,
    pub last_version: u64,
}

/// Snapshot returned by `GraphOrchestrator::metrics`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorMetrics {
    #[serde(flatten)]
    pub build: BuildMetrics,
    pub graph_cache: CacheStats,
    pub similarity_cache: CacheStats,
}

impl OrchestratorMetrics {
    /// Hit rate of the graph cache
    pub fn cache_hit_rate(&self) -> f64 {
        self.graph_cache.hit_rate()
    }
}
