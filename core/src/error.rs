use thiserror::Error;

/// Errors raised above the ANN indices: calibration, conformal uncertainty,
/// and argument validation at the matcher boundary.
#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error(transparent)]
    Similarity(#[from] trajectory_similarity::Error),
    #[error("operation requires a non-empty input")]
    EmptyInput,
}
