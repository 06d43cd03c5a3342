use serde::{Deserialize, Serialize};

/// Matcher configuration: thresholds and knobs the predict pipeline
/// consults when a caller doesn't override them via a `SearchPlan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub min_top_k: usize,
    pub min_score: f32,
    pub min_confidence: f64,
    pub embedding_dim: usize,
    pub default_top_k: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_top_k: 3,
            min_score: 0.3,
            min_confidence: 20.0,
            embedding_dim: 384,
            default_top_k: 10,
        }
    }
}

/// Graph (HNSW) index configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
        }
    }
}

/// Cluster (IVF) index configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub n_clusters: usize,
    pub n_probe: usize,
    pub max_iter: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            n_clusters: 16,
            n_probe: 10,
            max_iter: 20,
        }
    }
}

/// Aggregate, file-loadable configuration for the whole engine. Individual
/// components are also constructible standalone with their own `Default`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    pub graph: GraphConfig,
    pub cluster: ClusterConfig,
}
