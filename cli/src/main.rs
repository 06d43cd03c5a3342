//! `trajectory-cli`: loads a JSON corpus of spans and either reports index
//! statistics (`seed`), answers a query (`query`), or explains one
//! candidate span against a query (`explain`).

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::sync::Arc;
use trajectory_core::{Collaborators, InvertedFilter, Matcher};
use trajectory_similarity::graph::index::GraphIndex;
use trajectory_types::{EngineConfig, QueryContext, SearchPlan, Span};

use crate::cli::{Cli, Commands, QueryContextArgs, SearchPlanArgs, SpanSource};

fn load_spans(source: &SpanSource) -> Result<Vec<Span>> {
    let content = fs::read_to_string(&source.spans)
        .with_context(|| format!("reading spans file {}", source.spans.display()))?;
    serde_json::from_str(&content).context("parsing spans JSON (expected a JSON array of spans)")
}

fn build_matcher(engine: EngineConfig, spans: &[Span]) -> (Matcher, Arc<GraphIndex>) {
    let graph = Arc::new(GraphIndex::new(
        engine.matcher.embedding_dim,
        engine.graph.m,
        engine.graph.ef_construction,
        engine.graph.ef_search,
    ));
    let inverted = Arc::new(InvertedFilter::new());

    let mut matcher = Matcher::new(engine.matcher);
    matcher.set_indices(Collaborators {
        vector: Some(graph.clone() as Arc<dyn trajectory_core::VectorIndex>),
        inverted: Some(inverted),
        temporal: None,
        quality: None,
    });

    for span in spans {
        matcher.add_span(span.clone());
    }

    (matcher, graph)
}

fn build_context(args: &QueryContextArgs) -> QueryContext {
    QueryContext {
        environment: args.environment.clone(),
        stakes: args.stakes.clone(),
        previous_actions: args.previous_actions.clone(),
    }
}

fn build_plan(args: &SearchPlanArgs, engine: &EngineConfig) -> Option<SearchPlan> {
    if args.top_k.is_none()
        && args.min_quality.is_none()
        && args.time_range.is_none()
        && args.filters.is_empty()
    {
        return None;
    }
    Some(SearchPlan {
        top_k: args.top_k.unwrap_or(engine.matcher.default_top_k),
        min_quality: args.min_quality.unwrap_or(60),
        time_range: args
            .time_range
            .map(|(start, end)| trajectory_types::TimeRange { start, end }),
        filters: args.filters.iter().cloned().collect(),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    trajectory_tracer::init_tracing(&cli.log_level);

    match cli.command {
        Commands::Seed(args) => {
            let spans = load_spans(&args.source)?;
            let engine: EngineConfig = args.engine.into();
            let (matcher, graph) = build_matcher(engine, &spans);
            let stats = graph.stats();
            println!(
                "{}",
                serde_json::json!({
                    "spans_loaded": matcher.span_count(),
                    "graph_node_count": stats.node_count,
                    "graph_layer_count": stats.layer_count,
                    "graph_mean_degree": stats.mean_degree,
                })
            );
        }
        Commands::Query(args) => {
            let spans = load_spans(&args.source)?;
            let engine: EngineConfig = args.engine.clone().into();
            let (matcher, _graph) = build_matcher(engine.clone(), &spans);
            let context = build_context(&args.context);
            let plan = build_plan(&args.plan, &engine);
            let prediction = matcher.predict(&context, &args.action, plan);
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Commands::Explain(args) => {
            let spans = load_spans(&args.source)?;
            let engine: EngineConfig = args.engine.into();
            let (matcher, _graph) = build_matcher(engine, &spans);
            let context = build_context(&args.context);
            match matcher.evidence_for(&context, &args.action, &args.id) {
                Some(evidence) => println!("{}", serde_json::to_string_pretty(&evidence)?),
                None => println!(
                    "{}",
                    serde_json::json!({ "id": args.id, "evidence": serde_json::Value::Null })
                ),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trajectory_types::{SpanContext, SpanMetadata, SpanStatus};

    fn sample_span(id: &str) -> Span {
        Span {
            id: id.to_string(),
            actor: "agent".into(),
            action: "create_user".into(),
            object: "account".into(),
            success_outcome: Some("user created".into()),
            failure_outcome: None,
            confirmation: None,
            context: SpanContext {
                environment: Some("prod".into()),
                ..Default::default()
            },
            metadata: SpanMetadata {
                quality: Some(80),
                ..Default::default()
            },
            status: SpanStatus::Completed,
        }
    }

    #[test]
    fn build_matcher_indexes_every_span() {
        let spans = vec![sample_span("a"), sample_span("b")];
        let (matcher, graph) = build_matcher(EngineConfig::default(), &spans);
        assert_eq!(matcher.span_count(), 2);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn build_plan_is_none_when_no_flags_given() {
        let args = SearchPlanArgs {
            top_k: None,
            min_quality: None,
            time_range: None,
            filters: Vec::new(),
        };
        assert!(build_plan(&args, &EngineConfig::default()).is_none());
    }

    #[test]
    fn build_plan_fills_defaults_for_omitted_fields() {
        let args = SearchPlanArgs {
            top_k: Some(5),
            min_quality: None,
            time_range: None,
            filters: Vec::new(),
        };
        let plan = build_plan(&args, &EngineConfig::default()).unwrap();
        assert_eq!(plan.top_k, 5);
        assert_eq!(plan.min_quality, 60);
    }

    #[test]
    fn load_spans_rejects_malformed_json() {
        let dir = std::env::temp_dir();
        let path = dir.join("trajectory_cli_bad_spans_test.json");
        std::fs::write(&path, "not json").unwrap();
        let err = load_spans(&SpanSource { spans: path.clone() }).unwrap_err();
        assert!(format!("{err:#}").contains("parsing spans JSON"));
        std::fs::remove_file(&path).ok();
    }
}
