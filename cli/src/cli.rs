//! Argument definitions for the `trajectory-cli` binary: a top-level `Cli`
//! wrapping a `Commands` subcommand enum, with the engine's shared knobs
//! flattened in via [`trajectory_utils::EngineArgs`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use trajectory_utils::EngineArgs;

#[derive(Parser)]
#[command(version, about = "Seed, query and explain the trajectory-matching engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tracing verbosity (also overridable via RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a JSON array of spans and report corpus/index statistics.
    Seed(SeedArgs),
    /// Load spans, then answer a single (context, action) query.
    Query(QueryArgs),
    /// Load spans, then explain whether one specific span id would qualify
    /// as evidence for a query.
    Explain(ExplainArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SpanSource {
    /// Path to a JSON file containing an array of spans.
    #[arg(long)]
    pub spans: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct QueryContextArgs {
    #[arg(long)]
    pub environment: Option<String>,
    #[arg(long)]
    pub stakes: Option<String>,
    /// May be passed more than once; order is preserved.
    #[arg(long = "previous-action")]
    pub previous_actions: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchPlanArgs {
    #[arg(long)]
    pub top_k: Option<usize>,
    #[arg(long)]
    pub min_quality: Option<u8>,
    /// `start:end`, inclusive both ends (unix timestamps).
    #[arg(long, value_parser = parse_time_range)]
    pub time_range: Option<(i64, i64)>,
    /// `field=value`, may be passed more than once.
    #[arg(long = "filter", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,
}

fn parse_time_range(s: &str) -> Result<(i64, i64), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected start:end, got {s}"))?;
    let start = start.parse::<i64>().map_err(|e| e.to_string())?;
    let end = end.parse::<i64>().map_err(|e| e.to_string())?;
    Ok((start, end))
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got {s}"))?;
    Ok((field.to_string(), value.to_string()))
}

#[derive(Args, Debug, Clone)]
pub struct SeedArgs {
    #[command(flatten)]
    pub source: SpanSource,
    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub source: SpanSource,
    /// The action string to predict against.
    pub action: String,
    #[command(flatten)]
    pub context: QueryContextArgs,
    #[command(flatten)]
    pub plan: SearchPlanArgs,
    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ExplainArgs {
    #[command(flatten)]
    pub source: SpanSource,
    pub action: String,
    /// The span id to explain.
    #[arg(long)]
    pub id: String,
    #[command(flatten)]
    pub context: QueryContextArgs,
    #[command(flatten)]
    pub engine: EngineArgs,
}
