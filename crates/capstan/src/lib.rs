#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/capstan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod pipeline;
pub mod universe;

// Re-export main types from sub-crates
pub use capstan_data as data;
pub use capstan_models as models;
pub use capstan_output as output;
pub use capstan_stats as stats;

pub use error::{PipelineError, Result};
pub use pipeline::{AnalysisConfig, PricePanel};
pub use universe::{StaticUniverse, Universe};

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
