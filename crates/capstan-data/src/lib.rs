#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/capstan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod factors;
pub mod french;
pub mod returns;
pub mod series;
pub mod source;
pub mod yahoo;

pub use error::{DataError, Result};
pub use factors::{FactorColumn, FactorDataset, FactorRow};
pub use returns::{
    CAPM_ANNUAL_RISK_FREE_RATE, ReturnKind, ReturnSeries, RiskFreeRate, TRADING_DAYS_PER_YEAR,
    excess_returns, simple_returns,
};
pub use series::{AlignedColumns, DateRange, TimeSeries, inner_join};
pub use source::{FactorSource, InMemoryPriceSource, PriceSource};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
