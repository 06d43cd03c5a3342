use crate::span::SpanId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The context half of a `predict(context, action, plan)` query. Distinct
/// from [`crate::span::SpanContext`]: a query additionally carries the
/// actions taken so far in the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

/// Search knobs for a single `predict` call. Absent fields fall back to the
/// matcher's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub top_k: usize,
    pub min_quality: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub filters: HashMap<String, String>,
}

/// A scored span surfaced as explainability evidence alongside a
/// prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: SpanId,
    pub score: f32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionMethod {
    TrajectoryMatching,
    Synthesis,
    Fallback,
    LowConfidence,
}

/// The result of a `predict` call: a synthesized output, a calibrated
/// confidence in 0..=100, and (when available) the evidence trail that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub output: String,
    pub confidence: f64,
    pub trajectories_used: usize,
    pub method: PredictionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<Evidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<SearchPlan>,
}

impl Prediction {
    pub fn low_confidence(confidence: f64) -> Self {
        Self {
            output: String::new(),
            confidence,
            trajectories_used: 0,
            method: PredictionMethod::LowConfidence,
            evidence: None,
            plan: None,
        }
    }
}
