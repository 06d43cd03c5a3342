//! Orchestration layer above the ANN indices: the multi-field inverted
//! filter, Platt calibration, split-conformal uncertainty, and the
//! trajectory-matching [`matcher::Matcher`] itself.

pub mod calibration;
pub mod collaborators;
pub mod conformal;
pub mod error;
pub mod inverted;
pub mod matcher;
pub mod vector_index;

pub use calibration::PlattModel;
pub use collaborators::{QualityIndex, TemporalIndex};
pub use conformal::Interval;
pub use error::MatchError;
pub use inverted::{InvertedFilter, Seed};
pub use matcher::{Collaborators, Matcher};
pub use vector_index::VectorIndex;
