#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/capstan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod capm;
pub mod error;
pub mod fama_french;
pub mod linalg;
pub mod ols;
pub mod traits;

pub use capm::CapmModel;
pub use error::{ModelError, Result};
pub use fama_french::FamaFrenchModel;
pub use ols::{LinearFactorModel, OlsConfig, RegressionResult};
pub use traits::AssetPricingModel;
