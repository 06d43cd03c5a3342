use thiserror::Error;

/// Errors raised by the embedder and the two ANN indices.
///
/// Dimension mismatches and empty-input calibration are the only
/// user-visible failure modes; everything else (empty-index search, stale
/// ids) degrades silently rather than erroring.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("operation requires a non-empty input")]
    EmptyInput,
    #[error("id not found: {0}")]
    NotFound(String),
}
