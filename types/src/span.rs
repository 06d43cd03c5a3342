use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier of a [`Span`]. Kept as a plain `String` rather than a
/// newtype so it composes directly with the index crates, which key
/// everything by caller-supplied string ids.
pub type SpanId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanStatus {
    Pending,
    Completed,
    Failed,
}

/// The context a span was recorded under: the environment it ran in, the
/// stakes involved, and the chain of spans that preceded it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_span_ids: Vec<SpanId>,
}

/// Free-form, provider-originated facts about a span: a quality score in
/// 0..=100, a timestamp, and whatever key/value pairs the ingesting
/// collaborator chose to attach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub provider_fields: HashMap<String, String>,
}

/// A structured past event: the core consumes spans but never mutates them
/// once they are handed to a matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: SpanId,
    pub actor: String,
    pub action: String,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
    #[serde(default)]
    pub context: SpanContext,
    #[serde(default)]
    pub metadata: SpanMetadata,
    pub status: SpanStatus,
}

impl Span {
    /// `who did this if_ok context.environment`, omitting absent fields,
    /// joined with single spaces. Used both to embed the span for indexing
    /// and as a synthesis fallback when no outcome text is available.
    pub fn span_text(&self) -> String {
        let mut parts = vec![
            self.actor.as_str(),
            self.action.as_str(),
            self.object.as_str(),
        ];
        if let Some(ok) = self.success_outcome.as_deref() {
            parts.push(ok);
        }
        if let Some(env) = self.context.environment.as_deref() {
            parts.push(env);
        }
        parts.join(" ")
    }

    /// Evidence content: prefer the success outcome, then the failure
    /// outcome, then fall back to `span_text`.
    pub fn evidence_content(&self) -> String {
        self.success_outcome
            .clone()
            .or_else(|| self.failure_outcome.clone())
            .unwrap_or_else(|| self.span_text())
    }
}
