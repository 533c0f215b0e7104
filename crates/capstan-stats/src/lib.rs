#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/capstan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod error;
pub mod moments;

pub use cluster::{
    ClusterAssignment, ClusterConfig, ClusteringOutcome, Initialization, StockClusterer, elbow,
    standardize,
};
pub use error::{Result, StatsError};
pub use moments::{MIN_OBSERVATIONS, ReturnStatistics, StockFeatureVector};
