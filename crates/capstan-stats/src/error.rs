//! Error types for return statistics and clustering.

use thiserror::Error;

/// Errors raised while computing moments or clustering feature vectors.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Too few aligned observations for the higher moments
    #[error("Insufficient data for {ticker}: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Ticker whose series is too short
        ticker: String,
        /// Minimum number of observations
        required: usize,
        /// Observations available after alignment
        actual: usize,
    },

    /// Constant return series; skewness and kurtosis are undefined
    #[error("Return series for {ticker} has zero variance")]
    ZeroVariance {
        /// Ticker with the constant series
        ticker: String,
    },

    /// Same ticker supplied twice
    #[error("Duplicate ticker: {0}")]
    DuplicateTicker(String),

    /// Cluster count outside `[2, rows]`
    #[error("Invalid cluster count {k} for {rows} rows (need 2 <= k <= rows)")]
    InvalidClusterCount {
        /// Requested cluster count
        k: usize,
        /// Number of feature rows
        rows: usize,
    },

    /// Fewer distinct feature rows than clusters
    #[error("Cannot form {k} clusters from {distinct} distinct feature rows")]
    TooFewDistinctRows {
        /// Requested cluster count
        k: usize,
        /// Distinct rows after standardization
        distinct: usize,
    },

    /// NaN or infinite feature value
    #[error("Non-finite feature value for {ticker}")]
    NonFiniteFeature {
        /// Ticker carrying the bad value
        ticker: String,
    },
}

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;
