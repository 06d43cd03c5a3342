use super::{GraphStats, LayerIndex, Node, OrderedNode};
use crate::error::Error;
use crate::heap::BoundedMinHeap;
use crate::vector::Vector;

use ahash::AHashSet;
use parking_lot::{Mutex, RwLock};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::cmp::{min, Ordering, Reverse};
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU8, Ordering as AtomicOrdering};

/// A layered proximity graph index over fixed-dimension embeddings.
///
/// Nodes are keyed by caller-supplied ids rather than a content hash of
/// their embedding: the matcher needs `insert(span_id, embedding)` to be
/// addressable by the same id the span store already uses. Level
/// assignment therefore comes from an injectable seeded RNG rather than a
/// hash of the vector, per spec's "implementations SHOULD accept an
/// optional seed".
pub struct GraphIndex {
    dim: usize,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    inv_log_m: f64,
    top_layer: AtomicU8,
    entry_point: RwLock<Option<String>>,
    nodes: papaya::HashMap<String, Node>,
    graph: papaya::HashMap<LayerIndex, papaya::HashSet<String>>,
    rng: Mutex<SmallRng>,
}

impl GraphIndex {
    pub fn new(dim: usize, m: usize, ef_construction: usize, ef_search: usize) -> Self {
        Self::with_seed(dim, m, ef_construction, ef_search, None)
    }

    pub fn with_seed(
        dim: usize,
        m: usize,
        ef_construction: usize,
        ef_search: usize,
        seed: Option<u64>,
    ) -> Self {
        assert!(m > 1, "M must be > 1");
        let rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_entropy(),
        };
        Self {
            dim,
            m,
            ef_construction,
            ef_search,
            inv_log_m: 1.0 / (m as f64).ln(),
            top_layer: AtomicU8::new(0),
            entry_point: RwLock::new(None),
            nodes: papaya::HashMap::new(),
            graph: papaya::HashMap::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.pin().is_empty()
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        1.0 - crate::distance::cosine_similarity(a, b).unwrap_or(0.0)
    }

    /// `L = floor(-ln(U) * mL)`, `U` uniform in `(0, 1)`.
    fn assign_level(&self) -> u8 {
        let mut rng = self.rng.lock();
        let u: f64 = loop {
            let x: f64 = rng.gen();
            if x > 0.0 {
                break x;
            }
        };
        let level = (-u.ln() * self.inv_log_m).floor();
        level.clamp(0.0, 255.0) as u8
    }

    /// Algorithm 1 (INSERT). Silently no-ops if `id` already exists, same as
    /// re-inserting an unchanged span would be a waste of work rather than an
    /// error.
    pub fn insert(&self, id: String, v: Vector) -> Result<(), Error> {
        if v.dim() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: v.dim(),
            });
        }

        let nodes = self.nodes.pin();
        if nodes.contains_key(&id) {
            return Ok(());
        }

        let level = self.assign_level();
        let node = Node::new(id.clone(), v.clone(), level);
        let graph = self.graph.pin();

        let entry = self.entry_point.read().clone();
        let Some(mut ep) = entry else {
            for l in 0..=level {
                graph
                    .get_or_insert(LayerIndex(l as u16), papaya::HashSet::new())
                    .pin()
                    .insert(id.clone());
            }
            nodes.insert(id.clone(), node);
            *self.entry_point.write() = Some(id);
            self.top_layer.store(level, AtomicOrdering::Release);
            return Ok(());
        };

        let top_layer = self.top_layer.load(AtomicOrdering::Acquire);

        for l in ((level + 1)..=top_layer).rev() {
            let layer = LayerIndex(l as u16);
            let found = self.search_layer_locked(&v, &[ep.clone()], &layer, 1);
            if let Some(nearest) = found.into_iter().next() {
                ep = nearest.0;
            }
        }

        // Inserted before linking so the prune step below can resolve the
        // new node's own vector through `nodes.get` like any other
        // neighbour, instead of dropping it from consideration.
        nodes.insert(id.clone(), node);
        let node = nodes.get(&id).expect("just inserted above");

        let mut best = vec![ep];
        for l in (0..=min(level, top_layer)).rev() {
            let layer = LayerIndex(l as u16);
            let candidates = self.search_layer_locked(&v, &best, &layer, self.ef_construction);

            let m_l = if l == 0 { self.m * 2 } else { self.m };
            let mut sorted = candidates.clone();
            sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
            let neighbours: Vec<OrderedNode> = sorted.into_iter().take(m_l).collect();

            graph
                .get_or_insert(layer, papaya::HashSet::new())
                .pin()
                .insert(id.clone());

            for OrderedNode(nid, _) in &neighbours {
                if let Some(neighbour_node) = nodes.get(nid) {
                    neighbour_node
                        .neighbours
                        .pin()
                        .get_or_insert_with(layer, papaya::HashSet::new)
                        .pin()
                        .insert(id.clone());
                    neighbour_node.back_links.pin().insert(id.clone());

                    node.neighbours
                        .pin()
                        .get_or_insert_with(layer, papaya::HashSet::new)
                        .pin()
                        .insert(nid.clone());
                    node.back_links.pin().insert(nid.clone());
                }
            }

            for OrderedNode(nid, _) in &neighbours {
                if let Some(neighbour_node) = nodes.get(nid) {
                    let cap = if l == 0 { self.m * 2 } else { self.m };
                    let current: Vec<String> = {
                        let conn_guard = neighbour_node.neighbours.pin();
                        match conn_guard.get(&layer) {
                            Some(set) => set.pin().iter().cloned().collect(),
                            None => continue,
                        }
                    };
                    if current.len() > cap {
                        let mut scored: Vec<(String, f32)> = current
                            .iter()
                            .filter_map(|other_id| {
                                nodes.get(other_id).map(|n| {
                                    (
                                        other_id.clone(),
                                        self.distance(n.value.as_slice(), neighbour_node.value.as_slice()),
                                    )
                                })
                            })
                            .collect();
                        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
                        let kept: papaya::HashSet<String> =
                            scored.into_iter().take(cap).map(|(id, _)| id).collect();
                        neighbour_node.neighbours.pin().insert(layer, kept);
                    }
                }
            }

            best = candidates.into_iter().map(|OrderedNode(nid, _)| nid).collect();
        }

        {
            let mut ep_write = self.entry_point.write();
            let current_top = self.top_layer.load(AtomicOrdering::Acquire);
            if level > current_top {
                self.top_layer.store(level, AtomicOrdering::Release);
                *ep_write = Some(id);
            }
        }

        Ok(())
    }

    /// Algorithm 2 (SEARCH-LAYER). Best-first traversal bounded to `ef`
    /// results, returned distance-ascending.
    fn search_layer_locked(
        &self,
        query: &Vector,
        entries: &[String],
        layer: &LayerIndex,
        ef: usize,
    ) -> Vec<OrderedNode> {
        let nodes = self.nodes.pin();
        let mut visited: AHashSet<String> = entries.iter().cloned().collect();
        let mut candidates: BinaryHeap<Reverse<OrderedNode>> = BinaryHeap::new();
        let ef_nonzero = NonZeroUsize::new(ef.max(1)).expect("ef.max(1) is never zero");
        let mut result: BoundedMinHeap<OrderedNode> = BoundedMinHeap::new(ef_nonzero);

        for id in entries {
            if let Some(n) = nodes.get(id) {
                let d = self.distance(n.value.as_slice(), query.as_slice());
                candidates.push(Reverse(OrderedNode(id.clone(), d)));
                result.push(OrderedNode(id.clone(), d));
            }
        }

        while let Some(Reverse(OrderedNode(current_id, current_dist))) = candidates.pop() {
            if let Some(worst) = result.peek() {
                if current_dist > worst.1 && result.len() >= ef {
                    break;
                }
            }
            if let Some(node) = nodes.get(&current_id) {
                let neighbours_guard = node.neighbours.pin();
                if let Some(layer_neighbours) = neighbours_guard.get(layer) {
                    for nid in layer_neighbours.pin().iter() {
                        if visited.contains(nid) {
                            continue;
                        }
                        visited.insert(nid.clone());
                        if let Some(neighbour_node) = nodes.get(nid) {
                            let d = self.distance(neighbour_node.value.as_slice(), query.as_slice());
                            candidates.push(Reverse(OrderedNode(nid.clone(), d)));
                            result.push(OrderedNode(nid.clone(), d));
                        }
                    }
                }
            }
        }

        result.into_sorted_vec()
    }

    /// Algorithm 5 (K-NN-SEARCH). Falls back to an exact linear scan when
    /// the index has zero or one node, per spec.
    pub fn search(&self, query: &Vector, k: usize) -> Result<Vec<(String, f32, f32)>, Error> {
        if query.dim() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: query.dim(),
            });
        }
        let nodes = self.nodes.pin();
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        if nodes.len() == 1 || self.entry_point.read().is_none() {
            let mut scored: Vec<(String, f32, f32)> = nodes
                .iter()
                .map(|(id, n)| {
                    let d = self.distance(n.value.as_slice(), query.as_slice());
                    (id.clone(), d, 1.0 - d)
                })
                .collect();
            scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
            scored.truncate(k);
            return Ok(scored);
        }

        let (mut ep, top_layer) = {
            let guard = self.entry_point.read();
            (guard.clone().expect("checked is_some above"), self.top_layer.load(AtomicOrdering::Acquire))
        };

        for l in (1..=top_layer).rev() {
            let layer = LayerIndex(l as u16);
            let found = self.search_layer_locked(query, &[ep.clone()], &layer, 1);
            if let Some(nearest) = found.into_iter().next() {
                ep = nearest.0;
            }
        }

        let ef = self.ef_search.max(k);
        let found = self.search_layer_locked(query, &[ep], &LayerIndex(0), ef);
        Ok(found
            .into_iter()
            .take(k)
            .map(|OrderedNode(id, dist)| (id, dist, 1.0 - dist))
            .collect())
    }

    /// Node count, layer count (max layer + 1), mean degree, and per-layer
    /// population.
    pub fn stats(&self) -> GraphStats {
        let nodes = self.nodes.pin();
        let graph = self.graph.pin();

        let node_count = nodes.len();
        let layer_count = graph
            .iter()
            .map(|(l, _)| l.0 as usize + 1)
            .max()
            .unwrap_or(0);

        let mut nodes_per_layer = std::collections::HashMap::new();
        let mut total_degree = 0usize;
        let mut degree_samples = 0usize;

        for (layer, members) in graph.iter() {
            nodes_per_layer.insert(layer.0, members.pin().len());
        }

        for (_, node) in nodes.iter() {
            for (_, neighbours) in node.neighbours.pin().iter() {
                total_degree += neighbours.pin().len();
                degree_samples += 1;
            }
        }

        let mean_degree = if degree_samples == 0 {
            0.0
        } else {
            total_degree as f64 / degree_samples as f64
        };

        GraphStats {
            node_count,
            layer_count,
            mean_degree,
            nodes_per_layer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn idx() -> GraphIndex {
        GraphIndex::with_seed(2, 8, 32, 16, Some(42))
    }

    #[test]
    fn empty_index_returns_no_results() {
        let g = idx();
        let q = Vector::new(vec![1.0, 0.0]);
        assert_eq!(g.search(&q, 3).unwrap(), Vec::new());
    }

    #[test]
    fn single_node_uses_linear_scan() {
        let g = idx();
        g.insert("a".into(), Vector::new(vec![1.0, 0.0])).unwrap();
        let results = g.search(&Vector::new(vec![1.0, 0.0]), 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "a");
    }

    #[test]
    fn finds_nearest_among_several() {
        let g = idx();
        g.insert("close".into(), Vector::new(vec![1.0, 0.0])).unwrap();
        g.insert("far".into(), Vector::new(vec![0.0, 1.0])).unwrap();
        g.insert("mid".into(), Vector::new(vec![0.7, 0.3])).unwrap();

        let results = g.search(&Vector::new(vec![0.9, 0.1]), 1).unwrap();
        assert_eq!(results[0].0, "close");
    }

    #[test]
    fn dimension_mismatch_errors() {
        let g = idx();
        let err = g.insert("a".into(), Vector::new(vec![1.0, 0.0, 0.0])).unwrap_err();
        assert_eq!(err, Error::DimensionMismatch { expected: 2, found: 3 });
    }

    #[test]
    fn duplicate_insert_is_a_no_op() {
        let g = idx();
        g.insert("a".into(), Vector::new(vec![1.0, 0.0])).unwrap();
        g.insert("a".into(), Vector::new(vec![0.0, 1.0])).unwrap();
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn stats_report_node_and_layer_counts() {
        let g = idx();
        for i in 0..10 {
            g.insert(format!("n{i}"), Vector::new(vec![i as f32, (i * 2) as f32]))
                .unwrap();
        }
        let stats = g.stats();
        assert_eq!(stats.node_count, 10);
        assert!(stats.layer_count >= 1);
    }
}
