//! Shared data model for the trajectory-matching engine.
//!
//! This crate holds no logic, only the types exchanged between the indices,
//! the matcher, and any external collaborator: spans, query shapes,
//! predictions, and configuration.

pub mod config;
pub mod prediction;
pub mod span;

pub use config::{ClusterConfig, EngineConfig, GraphConfig, MatcherConfig};
pub use prediction::{Evidence, Prediction, PredictionMethod, QueryContext, SearchPlan, TimeRange};
pub use span::{Span, SpanContext, SpanId, SpanMetadata, SpanStatus};
