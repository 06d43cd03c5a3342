//! The orchestrating matcher: embed -> ANN -> filter -> rank -> synthesize
//! -> score.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use trajectory_similarity::embedder;
use trajectory_types::{
    Evidence, MatcherConfig, Prediction, PredictionMethod, QueryContext, SearchPlan, Span, SpanId,
};

use crate::collaborators::{QualityIndex, TemporalIndex};
use crate::inverted::{InvertedFilter, Seed};
use crate::vector_index::VectorIndex;

/// Optional collaborators attached via [`Matcher::set_indices`]. Every
/// field is non-owning: the matcher never constructs these itself, keeping
/// each collaborator's contract genuinely external.
#[derive(Default, Clone)]
pub struct Collaborators {
    pub vector: Option<Arc<dyn VectorIndex>>,
    pub inverted: Option<Arc<InvertedFilter>>,
    pub temporal: Option<Arc<dyn TemporalIndex>>,
    pub quality: Option<Arc<dyn QualityIndex>>,
}

/// Orchestrates `embed -> ANN -> filter -> rank -> synthesize -> score`
/// over an owned span store and non-owning references to its attached
/// indices.
pub struct Matcher {
    config: MatcherConfig,
    collaborators: Collaborators,
    spans: RwLock<HashMap<SpanId, Span>>,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            collaborators: Collaborators::default(),
            spans: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_indices(&mut self, collaborators: Collaborators) {
        self.collaborators = collaborators;
    }

    pub fn span_count(&self) -> usize {
        self.spans.read().len()
    }

    /// Inserts into the owned span store and, for each attached
    /// collaborator, forwards the fields it cares about.
    #[tracing::instrument(skip(self, span))]
    pub fn add_span(&self, span: Span) {
        let id = span.id.clone();

        if let Some(vector) = &self.collaborators.vector {
            let v = embedder::embed(&span.span_text(), self.config.embedding_dim);
            if let Err(err) = vector.insert(id.clone(), v) {
                tracing::warn!(span_id = %id, %err, "failed to index span embedding");
            }
        }

        if let Some(inverted) = &self.collaborators.inverted {
            inverted.add(id.clone(), "action", &span.action);
            if let Some(environment) = &span.context.environment {
                inverted.add(id.clone(), "domain", environment);
            }
        }

        if let Some(temporal) = &self.collaborators.temporal {
            if let Some(timestamp) = span.metadata.timestamp {
                temporal.add(id.clone(), timestamp);
            }
        }

        if let Some(quality) = &self.collaborators.quality {
            if let Some(score) = span.metadata.quality {
                quality.add(id.clone(), score);
            }
        }

        self.spans.write().insert(id, span);
    }

    fn build_query_text(context: &QueryContext, action: &str) -> String {
        let mut parts = vec![action.to_string()];
        if let Some(environment) = &context.environment {
            parts.push(environment.clone());
        }
        if let Some(stakes) = &context.stakes {
            parts.push(stakes.clone());
        }
        if !context.previous_actions.is_empty() {
            parts.push(context.previous_actions.join(" "));
        }
        parts.join(" ")
    }

    fn build_metadata(span: &Span) -> Option<HashMap<String, String>> {
        let mut metadata = span.metadata.provider_fields.clone();
        if let Some(quality) = span.metadata.quality {
            metadata.insert("quality".to_string(), quality.to_string());
        }
        if let Some(timestamp) = span.metadata.timestamp {
            metadata.insert("timestamp".to_string(), timestamp.to_string());
        }
        if metadata.is_empty() {
            None
        } else {
            Some(metadata)
        }
    }

    /// Resolve the caller's [`SearchPlan`], defaulting to `{topK:
    /// defaultTopK, minQuality: 60}` when absent.
    fn resolve_plan(&self, plan: Option<SearchPlan>) -> SearchPlan {
        plan.unwrap_or_else(|| SearchPlan {
            top_k: self.config.default_top_k,
            min_quality: 60,
            time_range: None,
            filters: HashMap::new(),
        })
    }

    /// Answer a `(context, action)` query with a synthesized prediction,
    /// calibrated confidence, and supporting evidence.
    #[tracing::instrument(skip(self, context, plan))]
    pub fn predict(&self, context: &QueryContext, action: &str, plan: Option<SearchPlan>) -> Prediction {
        let plan = self.resolve_plan(plan);

        // Short-circuit A.
        if plan.top_k < self.config.min_top_k {
            return Prediction::low_confidence(10.0);
        }

        let query_text = Self::build_query_text(context, action);
        let q = embedder::embed(&query_text, self.config.embedding_dim);

        let mut candidates: Vec<SpanId> = match &self.collaborators.vector {
            Some(vector) if !vector.is_empty() => vector
                .search(&q, plan.top_k * 3)
                .map(|hits| hits.into_iter().map(|(id, _, _)| id).collect())
                .unwrap_or_default(),
            _ => {
                let mut ids: Vec<SpanId> = self.spans.read().keys().cloned().collect();
                ids.sort();
                ids
            }
        };

        if let Some(inverted) = &self.collaborators.inverted {
            candidates = inverted.filter_by_action(Seed::Ids(&candidates), action, true);
        }

        if let (Some(temporal), Some(range)) = (&self.collaborators.temporal, plan.time_range) {
            candidates = intersect_preserving_shorter(candidates, temporal.find_in_range(range));
        }

        if let Some(quality) = &self.collaborators.quality {
            candidates = intersect_preserving_shorter(candidates, quality.find_above(plan.min_quality));
        }

        if let (Some(inverted), false) = (&self.collaborators.inverted, plan.filters.is_empty()) {
            candidates = intersect_preserving_shorter(candidates, inverted.find_all(&plan.filters));
        }

        // Short-circuit B.
        if candidates.is_empty() {
            return Prediction::low_confidence(5.0);
        }

        let mut evidence: Vec<Evidence> = Vec::new();
        {
            let spans = self.spans.read();
            for id in candidates.iter().take(plan.top_k) {
                let Some(span) = spans.get(id) else {
                    // Stale id from a collaborator out of sync with the span
                    // store; tolerated rather than treated as an error.
                    continue;
                };
                let span_vec = embedder::embed(&span.span_text(), self.config.embedding_dim);
                let score = embedder::cosine(&q, &span_vec).unwrap_or(0.0);
                if score < self.config.min_score {
                    continue;
                }
                evidence.push(Evidence {
                    id: id.clone(),
                    score,
                    content: span.evidence_content(),
                    metadata: Self::build_metadata(span),
                });
            }
        }

        // Short-circuit C.
        if evidence.is_empty() {
            return Prediction::low_confidence(15.0);
        }

        evidence.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        let output = synthesize(&evidence);
        let confidence = score_confidence(&evidence);

        // Short-circuit D.
        if confidence < self.config.min_confidence {
            return Prediction {
                output: format!("Low confidence ({confidence:.1}%) {output}"),
                confidence,
                trajectories_used: evidence.len(),
                method: PredictionMethod::LowConfidence,
                evidence: Some(evidence),
                plan: Some(plan),
            };
        }

        Prediction {
            output,
            confidence,
            trajectories_used: evidence.len(),
            method: PredictionMethod::TrajectoryMatching,
            evidence: Some(evidence),
            plan: Some(plan),
        }
    }

    /// Single-span evidence lookup: embed the query once and score it
    /// against one known id, without running the full ANN/filter pipeline.
    /// Used by the CLI's `explain` subcommand.
    pub fn evidence_for(&self, context: &QueryContext, action: &str, id: &SpanId) -> Option<Evidence> {
        let spans = self.spans.read();
        let span = spans.get(id)?;
        let q = embedder::embed(&Self::build_query_text(context, action), self.config.embedding_dim);
        let span_vec = embedder::embed(&span.span_text(), self.config.embedding_dim);
        let score = embedder::cosine(&q, &span_vec).ok()?;
        Some(Evidence {
            id: id.clone(),
            score,
            content: span.evidence_content(),
            metadata: Self::build_metadata(span),
        })
    }
}

/// Set intersection that preserves the order of the shorter operand,
/// matching the inverted filter's ordering contract so successive
/// narrowing steps stay deterministic.
fn intersect_preserving_shorter(a: Vec<SpanId>, b: Vec<SpanId>) -> Vec<SpanId> {
    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let longer_set: std::collections::HashSet<&SpanId> = longer.iter().collect();
    shorter
        .iter()
        .filter(|id| longer_set.contains(id))
        .cloned()
        .collect()
}

/// Sorted by score desc: verbatim top content above 0.8, else the mode of
/// the first five contents (ties broken by first-seen), else the top
/// content.
fn synthesize(evidence: &[Evidence]) -> String {
    let top = &evidence[0];
    if top.score > 0.8 {
        return top.content.clone();
    }
    if evidence.len() >= 3 {
        let window = &evidence[..5.min(evidence.len())];
        return mode_content(window);
    }
    top.content.clone()
}

fn mode_content(window: &[Evidence]) -> String {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for e in window {
        match counts.iter_mut().find(|(content, _)| content == &e.content) {
            Some(entry) => entry.1 += 1,
            None => counts.push((e.content.clone(), 1)),
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (content, count) in counts {
        let replace = match &best {
            None => true,
            Some((_, best_count)) => count > *best_count,
        };
        if replace {
            best = Some((content, count));
        }
    }
    best.map(|(content, _)| content).unwrap_or_default()
}

/// `clamp(0, 100, 100*(0.6*avg_score + 0.2*min(|ev|/5,1) + 0.2*exp(-5*var)))`.
fn score_confidence(evidence: &[Evidence]) -> f64 {
    let scores: Vec<f64> = evidence.iter().map(|e| e.score as f64).collect();
    let n = scores.len() as f64;
    let avg = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / n;
    let count_term = (evidence.len() as f64 / 5.0).min(1.0);
    let raw = 100.0 * (0.6 * avg + 0.2 * count_term + 0.2 * (-5.0 * variance).exp());
    raw.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trajectory_similarity::graph::index::GraphIndex;
    use trajectory_types::{SpanContext, SpanMetadata, SpanStatus};

    fn span(id: &str, action: &str, environment: &str, quality: u8, ok: &str) -> Span {
        Span {
            id: id.to_string(),
            actor: "agent".into(),
            action: action.to_string(),
            object: "query".into(),
            success_outcome: Some(ok.to_string()),
            failure_outcome: None,
            confirmation: None,
            context: SpanContext {
                environment: Some(environment.to_string()),
                ..Default::default()
            },
            metadata: SpanMetadata {
                quality: Some(quality),
                ..Default::default()
            },
            status: SpanStatus::Completed,
        }
    }

    fn matcher_with_graph() -> Matcher {
        let config = MatcherConfig::default();
        let graph = Arc::new(GraphIndex::with_seed(config.embedding_dim, 16, 200, 50, Some(11)));
        let mut matcher = Matcher::new(config);
        matcher.set_indices(Collaborators {
            vector: Some(graph),
            inverted: Some(Arc::new(InvertedFilter::new())),
            temporal: None,
            quality: None,
        });
        matcher
    }

    #[test]
    fn scenario_7_happy_path_returns_evidence() {
        let matcher = matcher_with_graph();
        matcher.add_span(span(
            "s1",
            "answer_capital_question",
            "geography",
            85,
            "The capital of France is Paris",
        ));
        matcher.add_span(span(
            "s2",
            "answer_capital_question",
            "geography",
            90,
            "The capital of Germany is Berlin",
        ));

        let context = QueryContext {
            environment: Some("geography".into()),
            ..Default::default()
        };
        let plan = SearchPlan {
            top_k: 5,
            min_quality: 60,
            time_range: None,
            filters: HashMap::new(),
        };
        let prediction = matcher.predict(&context, "What is the capital of Spain?", Some(plan));

        assert!(prediction.confidence > 0.0);
        assert!(matches!(
            prediction.method,
            PredictionMethod::TrajectoryMatching | PredictionMethod::LowConfidence
        ));
        let evidence = prediction.evidence.expect("evidence present");
        assert!(!evidence.is_empty());
        assert!(prediction.trajectories_used >= 1);
        for pair in evidence.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn scenario_8_short_circuit_on_small_top_k() {
        let matcher = matcher_with_graph();
        matcher.add_span(span("s1", "answer_capital_question", "geography", 85, "Paris"));
        matcher.add_span(span("s2", "answer_capital_question", "geography", 90, "Berlin"));

        let context = QueryContext {
            environment: Some("geography".into()),
            ..Default::default()
        };
        let plan = SearchPlan {
            top_k: 1,
            min_quality: 60,
            time_range: None,
            filters: HashMap::new(),
        };
        let prediction = matcher.predict(&context, "What is the capital of Spain?", Some(plan));

        assert_eq!(prediction.method, PredictionMethod::LowConfidence);
        assert_eq!(prediction.confidence, 10.0);
        assert_eq!(prediction.trajectories_used, 0);
    }

    #[test]
    fn empty_candidate_set_short_circuits_at_five_percent() {
        let matcher = matcher_with_graph();
        let context = QueryContext::default();
        let prediction = matcher.predict(&context, "anything", None);
        assert_eq!(prediction.method, PredictionMethod::LowConfidence);
        assert_eq!(prediction.confidence, 5.0);
    }

    #[test]
    fn stale_candidate_id_is_skipped_silently() {
        // A ghost id lives in the vector index (e.g. the host deleted the
        // span from its own ledger without telling the matcher) but was
        // never added through `add_span`, so the span store never saw it.
        let config = MatcherConfig::default();
        let graph = Arc::new(GraphIndex::with_seed(config.embedding_dim, 16, 200, 50, Some(11)));
        graph
            .insert("ghost".into(), embedder::embed("create_account prod", config.embedding_dim))
            .unwrap();
        let mut matcher = Matcher::new(config.clone());
        matcher.set_indices(Collaborators {
            vector: Some(graph),
            inverted: None,
            temporal: None,
            quality: None,
        });
        matcher.add_span(span("s1", "create_account", "prod", 80, "account created"));

        let context = QueryContext {
            environment: Some("prod".into()),
            ..Default::default()
        };
        let plan = SearchPlan {
            top_k: 5,
            min_quality: 60,
            time_range: None,
            filters: HashMap::new(),
        };
        let prediction = matcher.predict(&context, "create_account", Some(plan));
        if let Some(evidence) = prediction.evidence {
            assert!(evidence.iter().all(|e| e.id != "ghost"));
        }
    }

    #[test]
    fn mode_content_breaks_ties_by_first_seen() {
        let make = |id: &str, content: &str, score: f32| Evidence {
            id: id.to_string(),
            score,
            content: content.to_string(),
            metadata: None,
        };
        let evidence = vec![
            make("a", "alpha", 0.5),
            make("b", "beta", 0.5),
            make("c", "alpha", 0.4),
        ];
        assert_eq!(mode_content(&evidence), "alpha");
    }
}
