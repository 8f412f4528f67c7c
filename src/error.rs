use std::io;

use thiserror::Error;

/// Failures surfaced by loading and comparing laps.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no data for {what}")]
    DataUnavailable { what: String },
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("laps do not overlap in distance (reference {reference:?}, comparison {comparison:?})")]
    InsufficientOverlap {
        reference: (f64, f64),
        comparison: (f64, f64),
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub fn unavailable(what: impl Into<String>) -> Self {
        AnalysisError::DataUnavailable { what: what.into() }
    }
}
