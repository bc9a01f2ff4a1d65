use thiserror::Error;

/// Error taxonomy for the analysis core.
///
/// `NonConvergence` is deliberately its own variant: a model fit that did
/// not converge must never be read as a fitted-but-insignificant result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no paired observations between migration and curvature for river {river}")]
    DataJoin { river: String },

    #[error("degenerate statistics for river {river}: {reason}")]
    DegenerateStatistics { river: String, reason: String },

    #[error("mixed-effects fit did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
