//! Shared CLI argument definitions for the engine's knobs, mirroring the
//! teacher's `utils::cli::CommandLineConfig` (defaults match
//! [`trajectory_types::EngineConfig`]'s `Default` impls one-for-one).

use clap::Args;
use trajectory_types::{ClusterConfig, EngineConfig, GraphConfig, MatcherConfig};

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Minimum topK below which a query short-circuits to low_confidence.
    #[arg(long, default_value_t = 3)]
    pub min_top_k: usize,

    /// Minimum cosine score an evidence candidate must clear.
    #[arg(long, default_value_t = 0.3)]
    pub min_score: f32,

    /// Minimum confidence below which a prediction is relabeled low_confidence.
    #[arg(long, default_value_t = 20.0)]
    pub min_confidence: f64,

    /// Embedding dimension.
    #[arg(long, default_value_t = 384)]
    pub embedding_dim: usize,

    /// Default topK when a query omits a search plan.
    #[arg(long, default_value_t = 10)]
    pub default_top_k: usize,

    /// Graph index per-layer neighbor cap.
    #[arg(long, default_value_t = 16)]
    pub graph_m: usize,

    /// Graph index construction-time candidate list size.
    #[arg(long, default_value_t = 200)]
    pub graph_ef_construction: usize,

    /// Graph index search-time candidate list size.
    #[arg(long, default_value_t = 50)]
    pub graph_ef_search: usize,

    /// Cluster index centroid count.
    #[arg(long, default_value_t = 16)]
    pub cluster_n_clusters: usize,

    /// Cluster index probed-centroid count at search time.
    #[arg(long, default_value_t = 10)]
    pub cluster_n_probe: usize,

    /// Cluster index max Lloyd iterations.
    #[arg(long, default_value_t = 20)]
    pub cluster_max_iter: usize,
}

impl Default for EngineArgs {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            min_top_k: engine.matcher.min_top_k,
            min_score: engine.matcher.min_score,
            min_confidence: engine.matcher.min_confidence,
            embedding_dim: engine.matcher.embedding_dim,
            default_top_k: engine.matcher.default_top_k,
            graph_m: engine.graph.m,
            graph_ef_construction: engine.graph.ef_construction,
            graph_ef_search: engine.graph.ef_search,
            cluster_n_clusters: engine.cluster.n_clusters,
            cluster_n_probe: engine.cluster.n_probe,
            cluster_max_iter: engine.cluster.max_iter,
        }
    }
}

impl From<EngineArgs> for EngineConfig {
    fn from(args: EngineArgs) -> Self {
        EngineConfig {
            matcher: MatcherConfig {
                min_top_k: args.min_top_k,
                min_score: args.min_score,
                min_confidence: args.min_confidence,
                embedding_dim: args.embedding_dim,
                default_top_k: args.default_top_k,
            },
            graph: GraphConfig {
                m: args.graph_m,
                ef_construction: args.graph_ef_construction,
                ef_search: args.graph_ef_search,
            },
            cluster: ClusterConfig {
                n_clusters: args.cluster_n_clusters,
                n_probe: args.cluster_n_probe,
                max_iter: args.cluster_max_iter,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_round_trip_into_engine_config() {
        let args = EngineArgs::default();
        let engine: EngineConfig = args.into();
        assert_eq!(engine, EngineConfig::default());
    }
}
