use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared-ownership embedding vector, the canonical currency type across the
/// embedder, graph index and cluster index. Cloning is a cheap pointer bump
/// so the same vector can live in a node's storage and in search results at
/// once without copying floats.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vector(pub Arc<Vec<f32>>);

impl Vector {
    pub fn new(v: Vec<f32>) -> Self {
        Self(Arc::new(v))
    }

    pub fn as_slice(&self) -> &[f32] {
        self.0.as_slice()
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }
}

impl PartialEq for Vector {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| (a - b).abs() < f32::EPSILON)
    }
}

impl Eq for Vector {}

impl Hash for Vector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for &v in self.0.iter() {
            let truncated = (v / f32::EPSILON).trunc() as i32;
            truncated.hash(state);
        }
    }
}

impl From<Vec<f32>> for Vector {
    fn from(v: Vec<f32>) -> Self {
        Self::new(v)
    }
}
