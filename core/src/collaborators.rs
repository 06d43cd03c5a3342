//! Capability interfaces for the matcher's external collaborators. Concrete
//! indices are injected through construction, keeping the matcher
//! parametric rather than polymorphic by inheritance. Temporal and quality
//! indices are genuinely out of scope for this crate — only their contract
//! is realized here as a trait, so the matcher never depends on a concrete
//! implementation.

use trajectory_types::{SpanId, TimeRange};

/// `add(id, timestamp)` / `findInRange` (inclusive both ends).
pub trait TemporalIndex: Send + Sync {
    fn add(&self, id: SpanId, timestamp: i64);
    fn find_in_range(&self, range: TimeRange) -> Vec<SpanId>;
}

/// `add(id, quality)` / `findAbove(threshold)`.
pub trait QualityIndex: Send + Sync {
    fn add(&self, id: SpanId, quality: u8);
    fn find_above(&self, threshold: u8) -> Vec<SpanId>;
}
