//! Pipeline configuration
//!
//! Every struct is plain serde data with a full `Default`, so a YAML file
//! only needs to name the values it changes.

use crate::similarity::SimilarityConfig;
use graphweave_algorithms::ForceLayoutConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Clustering strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringMethod {
    #[default]
    Semantic,
    Kmeans,
    Hierarchical,
    None,
}

/// Layout strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMethod {
    #[default]
    ForceDirected,
    Hierarchical,
    Circular,
    Tree,
}

impl LayoutMethod {
    /// `Tree` is drawn with the hierarchical layout
    pub fn resolve(self) -> LayoutMethod {
        match self {
            LayoutMethod::Tree => LayoutMethod::Hierarchical,
            other => other,
        }
    }
}

/// What the graph builder emits, and how the result is clustered and laid out.
/// Its canonical serialization is the build fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformationOptions {
    pub include_insights: bool,
    pub include_tags: bool,
    pub include_references: bool,
    /// Deepest node depth emitted (documents are depth 0)
    pub max_depth: u32,
    /// Documents weaker than this are not emitted
    pub min_strength: f64,
    pub clustering_method: ClusteringMethod,
    pub layout_method: LayoutMethod,
}

impl Default for TransformationOptions {
    fn default() -> Self {
        Self {
            include_insights: true,
            include_tags: true,
            include_references: true,
            max_depth: 2,
            min_strength: 0.1,
            clustering_method: ClusteringMethod::Semantic,
            layout_method: LayoutMethod::ForceDirected,
        }
    }
}

/// Weights of the edge-importance components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceWeights {
    pub recency: f64,
    pub strength: f64,
    pub semantic: f64,
    pub interaction: f64,
    pub quality: f64,
}

impl Default for ImportanceWeights {
    fn default() -> Self {
        Self {
            recency: 0.3,
            strength: 0.3,
            semantic: 0.2,
            interaction: 0.1,
            quality: 0.1,
        }
    }
}

/// Edge reduction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgeFilteringOptions {
    pub max_edges_per_node: usize,
    pub min_edge_weight: f64,
    /// Replace inter-cluster edges with one summary edge per cluster pair
    pub clustering_enabled: bool,
    pub importance_weights: ImportanceWeights,
    /// Consider recent edges before older ones when filling per-node quotas
    pub preserve_recent_connections: bool,
    /// Age (days) under which an edge's newest endpoint counts as recent
    pub recent_window_days: i64,
}

impl Default for EdgeFilteringOptions {
    fn default() -> Self {
        Self {
            max_edges_per_node: 8,
            min_edge_weight: 0.2,
            clustering_enabled: false,
            importance_weights: ImportanceWeights::default(),
            preserve_recent_connections: true,
            recent_window_days: 7,
        }
    }
}

/// Clustering settings. `method` is overridden by
/// `TransformationOptions::clustering_method` inside the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusteringOptions {
    pub method: ClusteringMethod,
    pub max_clusters: usize,
    pub min_cluster_size: usize,
    /// Hierarchical merging stops once the best average link falls below this
    pub distance_threshold: f64,
    /// Semantic buckets come from tags; otherwise from node type
    pub consider_tags: bool,
    /// Blend creation-time proximity into hierarchical link strength
    pub consider_dates: bool,
    /// Blend quality closeness into hierarchical link strength
    pub consider_quality: bool,
    /// Tags preferred as a node's semantic bucket, highest priority first
    pub priority_tags: Vec<String>,
    pub seed: u64,
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self {
            method: ClusteringMethod::Semantic,
            max_clusters: 8,
            min_cluster_size: 3,
            distance_threshold: 0.3,
            consider_tags: true,
            consider_dates: false,
            consider_quality: false,
            priority_tags: [
                "agents",
                "llm",
                "rag",
                "prompting",
                "fine-tuning",
                "evaluation",
                "multimodal",
                "reasoning",
                "safety",
                "infrastructure",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            seed: 42,
        }
    }
}

/// Layout parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub force: ForceLayoutConfig,
    /// Radius of level 0 in the hierarchical layout
    pub base_radius: f64,
    /// Radius added per hierarchical level
    pub ring_spacing: f64,
    /// Height added per hierarchical level
    pub level_height: f64,
    pub circular_radius: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            force: ForceLayoutConfig::default(),
            base_radius: 200.0,
            ring_spacing: 150.0,
            level_height: 200.0,
            circular_radius: 300.0,
        }
    }
}

/// Capacities and TTLs of the two caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub graph_capacity: usize,
    pub graph_ttl_secs: u64,
    pub similarity_capacity: usize,
    pub similarity_ttl_secs: u64,
}

impl CacheConfig {
    pub fn graph_ttl(&self) -> Duration {
        Duration::from_secs(self.graph_ttl_secs)
    }

    pub fn similarity_ttl(&self) -> Duration {
        Duration::from_secs(self.similarity_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            graph_capacity: 16,
            graph_ttl_secs: 300,
            similarity_capacity: 50_000,
            similarity_ttl_secs: 3600,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub transformation: TransformationOptions,
    pub edge_filtering: EdgeFilteringOptions,
    pub clustering: ClusteringOptions,
    pub similarity: SimilarityConfig,
    pub layout: LayoutConfig,
    pub cache: CacheConfig,
    /// Seconds between source change probes; 0 disables the monitor
    pub update_check_interval_secs: u64,
}

impl PipelineConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&yaml)?;
        debug!("Loaded pipeline config from {:?}", path);
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject values the pipeline cannot honor
    pub fn validate(&self) -> ConfigResult<()> {
        let t = &self.transformation;
        unit("transformation.minStrength", t.min_strength)?;

        let f = &self.edge_filtering;
        unit("edgeFiltering.minEdgeWeight", f.min_edge_weight)?;
        if f.max_edges_per_node == 0 {
            return Err(ConfigError::Invalid("edgeFiltering.maxEdgesPerNode must be positive".into()));
        }
        let w = &f.importance_weights;
        for (name, value) in [
            ("recency", w.recency),
            ("strength", w.strength),
            ("semantic", w.semantic),
            ("interaction", w.interaction),
            ("quality", w.quality),
        ] {
            unit(&format!("edgeFiltering.importanceWeights.{}", name), value)?;
        }

        let c = &self.clustering;
        if c.max_clusters == 0 {
            return Err(ConfigError::Invalid("clustering.maxClusters must be positive".into()));
        }
        unit("clustering.distanceThreshold", c.distance_threshold)?;

        let s = &self.similarity;
        for (name, value) in s.weights.named() {
            unit(&format!("similarity.weights.{}", name), value)?;
        }
        for (name, value) in s.thresholds.named() {
            unit(&format!("similarity.thresholds.{}", name), value)?;
        }
        unit("similarity.minScore", s.min_score)?;
        unit("similarity.edgeThreshold", s.edge_threshold)?;
        if !(s.exponent.is_finite() && s.exponent > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "similarity.exponent must be positive, got {}",
                s.exponent
            )));
        }

        if self.cache.graph_capacity == 0 || self.cache.similarity_capacity == 0 {
            return Err(ConfigError::Invalid("cache capacities must be positive".into()));
        }
        Ok(())
    }
}

fn unit(name: &str, value: f64) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{} must be within [0, 1], got {}", name, value)))
    }
}
