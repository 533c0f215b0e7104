#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/capstan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;
pub mod summary;

pub use export::{CoefficientExport, ExportError, ExportFormat, Exporter};
pub use report::{Report, ReportBuilder, ReportError};
pub use summary::{ClusterSummary, FeatureTable, RegressionSummary};
