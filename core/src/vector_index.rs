//! The matcher's capability interface over "a vector index", satisfied by
//! either the graph (HNSW) or the cluster (IVF) index — the predict
//! pipeline does not care which kind is present. Keeps the matcher
//! parametric over the concrete ANN backend.

use crate::error::MatchError;
use trajectory_similarity::cluster::ClusterIndex;
use trajectory_similarity::graph::index::GraphIndex;
use trajectory_similarity::Vector;
use trajectory_types::SpanId;

pub trait VectorIndex: Send + Sync {
    fn insert(&self, id: SpanId, v: Vector) -> Result<(), MatchError>;
    /// `(id, distance, similarity)` triples, distance-ascending.
    fn search(&self, query: &Vector, k: usize) -> Result<Vec<(SpanId, f32, f32)>, MatchError>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VectorIndex for GraphIndex {
    fn insert(&self, id: SpanId, v: Vector) -> Result<(), MatchError> {
        Ok(GraphIndex::insert(self, id, v)?)
    }

    fn search(&self, query: &Vector, k: usize) -> Result<Vec<(SpanId, f32, f32)>, MatchError> {
        Ok(GraphIndex::search(self, query, k)?)
    }

    fn len(&self) -> usize {
        GraphIndex::len(self)
    }
}

impl VectorIndex for ClusterIndex {
    fn insert(&self, id: SpanId, v: Vector) -> Result<(), MatchError> {
        Ok(ClusterIndex::add(self, id, v)?)
    }

    fn search(&self, query: &Vector, k: usize) -> Result<Vec<(SpanId, f32, f32)>, MatchError> {
        Ok(ClusterIndex::search(self, query, k)?
            .into_iter()
            .map(|(id, sim)| (id, 1.0 - sim, sim))
            .collect())
    }

    fn len(&self) -> usize {
        ClusterIndex::size(self)
    }
}
