//! Errors surfaced by the end-to-end pipeline.

use capstan_data::DataError;
use capstan_models::ModelError;
use capstan_output::{ExportError, ReportError};
use capstan_stats::StatsError;
use thiserror::Error;

/// Any failure of a pipeline step, wrapping the originating crate's error.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Data retrieval or transformation error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Regression error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Moment or clustering error
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// Export error
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Report error
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for the config schema
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A symbol the run needs is missing from the price panel
    #[error("No prices loaded for {0}")]
    MissingSymbol(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
