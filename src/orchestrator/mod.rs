//! Build orchestration
//!
//! The orchestrator owns the two caches, the current graph and the event
//! channel. Requests are keyed by the fingerprint of their transformation
//! options:
//!
//! - a cached graph is returned directly
//! - otherwise at most one build runs per fingerprint; callers arriving while
//!   it runs are queued and resolved in arrival order with the same result
//! - a failed build delivers the same error to every queued caller and
//!   publishes nothing
//!
//! Invalidation (`refresh`, or the update monitor noticing a source change)
//! clears both caches and the current graph without cancelling builds in
//! flight. Such a build still becomes the current graph when it lands, but
//! is not written to the graph cache.

pub mod fingerprint;
pub mod metrics;

pub use fingerprint::fingerprint;
pub use metrics::{BuildMetrics, OrchestratorMetrics};

use crate::cache::TtlLruCache;
use crate::config::{PipelineConfig, TransformationOptions};
use crate::graph::{Graph, GraphEvent};
use crate::pipeline::GraphPipeline;
use crate::similarity::SimilarityCache;
use crate::source::{ContentSource, SourceError};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the event channel; slow subscribers lag past this
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Build errors. `Clone` so one failure can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Built graph failed validation: {0}")]
    InvalidGraph(String),

    #[error("Build task failed: {0}")]
    Join(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

type Waiter = oneshot::Sender<PipelineResult<Arc<Graph>>>;

/// Coordinates builds, caches and subscribers
pub struct GraphOrchestrator {
    source: Arc<dyn ContentSource>,
    config: PipelineConfig,
    graph_cache: TtlLruCache<String, Arc<Graph>>,
    similarity_cache: Arc<SimilarityCache>,
    /// Queued callers per fingerprint with a build in flight
    in_flight: Mutex<FxHashMap<String, Vec<Waiter>>>,
    current: RwLock<Option<Arc<Graph>>>,
    metrics: RwLock<BuildMetrics>,
    events: broadcast::Sender<GraphEvent>,
    /// Bumped by every invalidation
    generation: AtomicU64,
    version: AtomicU64,
    last_check: Mutex<DateTime<Utc>>,
}

impl GraphOrchestrator {
    pub fn new(source: Arc<dyn ContentSource>, config: PipelineConfig) -> Arc<Self> {
        let cache = &config.cache;
        let graph_cache = TtlLruCache::new("graph", cache.graph_capacity, cache.graph_ttl());
        let similarity_cache = Arc::new(TtlLruCache::new(
            "similarity",
            cache.similarity_capacity,
            cache.similarity_ttl(),
        ));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        info!("Creating graph orchestrator over source {}", source.name());

        Arc::new(Self {
            source,
            config,
            graph_cache,
            similarity_cache,
            in_flight: Mutex::new(FxHashMap::default()),
            current: RwLock::new(None),
            metrics: RwLock::new(BuildMetrics::default()),
            events,
            generation: AtomicU64::new(0),
            version: AtomicU64::new(0),
            last_check: Mutex::new(Utc::now()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Receive graph lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    /// The most recently built graph, if any
    pub async fn current_graph(&self) -> Option<Arc<Graph>> {
        self.current.read().await.clone()
    }

    /// Graph for the configured transformation options
    pub async fn graph(self: &Arc<Self>) -> PipelineResult<Arc<Graph>> {
        self.get_graph(self.config.transformation.clone()).await
    }

    /// Graph for `options`, from cache or from a (shared) build
    pub async fn get_graph(self: &Arc<Self>, options: TransformationOptions) -> PipelineResult<Arc<Graph>> {
        let fingerprint = fingerprint(&options).map_err(|e| PipelineError::InvalidOptions(e.to_string()))?;

        if let Some(graph) = self.graph_cache.get(&fingerprint) {
            debug!("Graph cache hit for {}", short(&fingerprint));
            self.metrics.write().await.cache_hits += 1;
            return Ok(graph);
        }

        let (tx, rx) = oneshot::channel();
        let leader = match lock(&self.in_flight).entry(fingerprint.clone()) {
            Entry::Occupied(mut queued) => {
                queued.get_mut().push(tx);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![tx]);
                true
            }
        };

        if leader {
            let this = Arc::clone(self);
            let key = fingerprint.clone();
            tokio::spawn(async move {
                let result = this.build(&key, options).await;
                let waiters = lock(&this.in_flight).remove(&key).unwrap_or_default();
                debug!("Resolving {} waiters for {}", waiters.len(), short(&key));
                for waiter in waiters {
                    let _ = waiter.send(result.clone());
                }
            });
        } else {
            debug!("Joining build in flight for {}", short(&fingerprint));
            self.metrics.write().await.coalesced += 1;
        }

        rx.await
            .map_err(|_| PipelineError::Join("build task ended without a result".to_string()))?
    }

    async fn build(&self, fingerprint: &str, options: TransformationOptions) -> PipelineResult<Arc<Graph>> {
        let generation = self.generation.load(Ordering::SeqCst);
        match self.run_build(fingerprint, options, generation).await {
            Ok(graph) => Ok(graph),
            Err(e) => {
                warn!("Build {} failed: {}", short(fingerprint), e);
                self.metrics.write().await.failures += 1;
                let _ = self.events.send(GraphEvent::BuildFailed {
                    fingerprint: fingerprint.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_build(
        &self,
        fingerprint: &str,
        options: TransformationOptions,
        generation: u64,
    ) -> PipelineResult<Arc<Graph>> {
        info!("Building graph {} from source {}", short(fingerprint), self.source.name());
        let records = self.source.fetch_records().await?;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;

        let pipeline = GraphPipeline::new(self.config.clone()).with_similarity_cache(Arc::clone(&self.similarity_cache));
        let (graph, report) =
            tokio::task::spawn_blocking(move || pipeline.run_with_options(&records, &options, version))
                .await
                .map_err(|e| PipelineError::Join(e.to_string()))?;
        graph
            .validate()
            .map_err(|e| PipelineError::InvalidGraph(e.to_string()))?;
        let graph = Arc::new(graph);

        if self.generation.load(Ordering::SeqCst) == generation {
            self.graph_cache.insert(fingerprint.to_string(), Arc::clone(&graph));
        } else {
            debug!("Caches were invalidated during build {}, not caching it", short(fingerprint));
        }
        *self.current.write().await = Some(Arc::clone(&graph));

        let duration_ms = report.duration.as_millis() as u64;
        {
            let mut metrics = self.metrics.write().await;
            metrics.builds += 1;
            metrics.last_duration_ms = duration_ms;
            metrics.last_node_count = graph.node_count();
            metrics.last_edge_count = graph.edge_count();
            metrics.last_cluster_count = graph.clusters.len();
            metrics.last_version = version;
        }

        let _ = self.events.send(GraphEvent::GraphUpdated {
            version,
            fingerprint: fingerprint.to_string(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            cluster_count: graph.clusters.len(),
            duration_ms,
        });
        Ok(graph)
    }

    /// Clear both caches and the current graph. Builds in flight still
    /// complete; the next request for any fingerprint rebuilds.
    pub async fn refresh(&self) {
        self.invalidate("refresh requested").await;
    }

    async fn invalidate(&self, reason: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let graphs = self.graph_cache.clear();
        let pairs = self.similarity_cache.clear();
        *self.current.write().await = None;
        info!("Invalidated caches ({}): {} graphs, {} similarity pairs", reason, graphs, pairs);
        let _ = self.events.send(GraphEvent::CacheInvalidated {
            reason: reason.to_string(),
        });
    }

    /// Ask the source whether it changed since the last check; invalidate
    /// if it did. Returns whether a change was seen.
    pub async fn check_for_updates(&self) -> PipelineResult<bool> {
        let since = *lock(&self.last_check);
        let checked_at = Utc::now();
        let changed = self.source.has_changed(since).await?;
        *lock(&self.last_check) = checked_at;
        if changed {
            self.invalidate("source data changed").await;
        }
        Ok(changed)
    }

    /// Poll `check_for_updates` every `update_check_interval_secs`. Returns
    /// `None` when the interval is 0. The task ends once the orchestrator
    /// is dropped.
    pub fn spawn_update_monitor(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let secs = self.config.update_check_interval_secs;
        if secs == 0 {
            return None;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(this) = weak.upgrade() else {
                    debug!("Orchestrator dropped, stopping update monitor");
                    break;
                };
                if let Err(e) = this.check_for_updates().await {
                    warn!("Update check failed: {}", e);
                }
            }
        }))
    }

    /// Build counters plus cache statistics
    pub async fn metrics(&self) -> OrchestratorMetrics {
        OrchestratorMetrics {
            build: self.metrics.read().await.clone(),
            graph_cache: self.graph_cache.stats(),
            similarity_cache: self.similarity_cache.stats(),
        }
    }

    /// Number of fingerprints with a build in flight
    pub fn builds_in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fingerprint prefix for log lines
fn short(fingerprint: &str) -> &str {
    &fingerprint[..fingerprint.len().min(12)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceRecord, StaticSource};

    fn records() -> Vec<SourceRecord> {
        vec![
            SourceRecord::new("a", "Alpha", "Retrieval augmented generation pipelines"),
            SourceRecord::new("b", "Beta", "Agent planning and tool use"),
        ]
    }

    #[tokio::test]
    async fn test_second_request_hits_cache() {
        let orchestrator = GraphOrchestrator::new(Arc::new(StaticSource::new(records())), PipelineConfig::default());
        let first = orchestrator.graph().await.unwrap();
        let second = orchestrator.graph().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let metrics = orchestrator.metrics().await;
        assert_eq!(metrics.build.builds, 1);
        assert_eq!(metrics.build.cache_hits, 1);
        assert_eq!(metrics.graph_cache.len, 1);
        assert!((metrics.cache_hit_rate() - 0.5).abs() < 1e-9);
        assert_eq!(orchestrator.builds_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_refresh_clears_current_graph() {
        let orchestrator = GraphOrchestrator::new(Arc::new(StaticSource::new(records())), PipelineConfig::default());
        let first = orchestrator.graph().await.unwrap();
        assert!(orchestrator.current_graph().await.is_some());

        orchestrator.refresh().await;
        assert!(orchestrator.current_graph().await.is_none());

        let rebuilt = orchestrator.graph().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(rebuilt.metadata.version, first.metadata.version + 1);
    }

    #[tokio::test]
    async fn test_update_check_invalidates_on_change() {
        let source = Arc::new(StaticSource::new(records()));
        let orchestrator = GraphOrchestrator::new(source.clone(), PipelineConfig::default());
        orchestrator.graph().await.unwrap();
        assert!(!orchestrator.check_for_updates().await.unwrap());

        tokio::time::sleep(Duration::from_millis(5)).await;
        source.replace_records(vec![SourceRecord::new("c", "Gamma", "")]);
        assert!(orchestrator.check_for_updates().await.unwrap());
        assert!(orchestrator.current_graph().await.is_none());
        assert_eq!(orchestrator.graph().await.unwrap().node_count(), 1);
    }

    #[tokio::test]
    async fn test_monitor_disabled_by_zero_interval() {
        let orchestrator = GraphOrchestrator::new(Arc::new(StaticSource::new(records())), PipelineConfig::default());
        assert!(orchestrator.spawn_update_monitor().is_none());
    }

    #[test]
    fn test_short_fingerprint() {
        assert_eq!(short("0123456789abcdef"), "0123456789ab");
        assert_eq!(short("abc"), "abc");
    }
}
