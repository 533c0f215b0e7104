//! Error types for model fitting.

use capstan_data::DataError;
use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while fitting a linear factor model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No independent variables were supplied
    #[error("At least one factor is required")]
    NoFactors,

    /// Too few common dates for the number of parameters
    #[error("Insufficient overlap: need at least {required} common observations, got {actual}")]
    InsufficientOverlap {
        /// Required number of joined observations
        required: usize,
        /// Joined observations available
        actual: usize,
    },

    /// Design matrix is not of full column rank
    #[error("Singular design: rank {rank} for {columns} columns (collinear factors)")]
    SingularDesign {
        /// Numerical rank of the design matrix
        rank: usize,
        /// Number of design columns, intercept included
        columns: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Error building the model inputs
    #[error("Data error: {0}")]
    Data(#[from] DataError),
}
