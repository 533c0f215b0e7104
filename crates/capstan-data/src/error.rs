//! Error types for data operations.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Too few observations for the requested transform
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Series dates are not strictly increasing
    #[error("Dates must be strictly increasing: {next} follows {previous}")]
    UnorderedDates {
        /// Date of the earlier observation
        previous: NaiveDate,
        /// Offending date
        next: NaiveDate,
    },

    /// Date and value vectors of different length
    #[error("Length mismatch: {dates} dates but {values} values")]
    LengthMismatch {
        /// Number of dates
        dates: usize,
        /// Number of values
        values: usize,
    },

    /// A price that cannot be used as a return denominator
    #[error("Invalid price {price} on {date}")]
    InvalidPrice {
        /// Observation date
        date: NaiveDate,
        /// Offending price
        price: f64,
    },

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: NaiveDate,
        /// End date of the range
        end: NaiveDate,
    },

    /// Missing data
    #[error("Missing data for {symbol}: {reason}")]
    MissingData {
        /// Symbol that was queried
        symbol: String,
        /// Reason for missing data
        reason: String,
    },

    /// Invalid symbol
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Yahoo Finance API error
    #[error("Yahoo Finance API error: {0}")]
    YahooApi(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(String),

    /// CSV reading error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Time conversion error
    #[error("Time conversion error: {0}")]
    TimeConversion(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<yahoo_finance_api::YahooError> for DataError {
    fn from(err: yahoo_finance_api::YahooError) -> Self {
        Self::YahooApi(err.to_string())
    }
}
