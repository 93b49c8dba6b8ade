//! Graph lifecycle events
//!
//! Broadcast by the orchestrator to subscribers (renderers, exporters).

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GraphEvent {
    /// A build finished and became the current graph
    GraphUpdated {
        version: u64,
        fingerprint: String,
        node_count: usize,
        edge_count: usize,
        cluster_count: usize,
        duration_ms: u64,
    },
    /// Caches and the current graph were cleared
    CacheInvalidated { reason: String },
    /// A build failed; no graph was published
    BuildFailed { fingerprint: String, error: String },
}
