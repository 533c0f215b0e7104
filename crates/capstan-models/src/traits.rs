//! Common interface of the asset-pricing models.

use crate::error::Result;
use crate::ols::RegressionResult;
use capstan_data::ReturnSeries;

/// A linear model explaining an asset's excess returns with a fixed set of factors.
pub trait AssetPricingModel {
    /// Short model name (e.g. "CAPM")
    fn name(&self) -> &str;

    /// Factor names, in the order slopes are reported
    fn factor_names(&self) -> &[&'static str];

    /// Fit the model to one asset's excess returns
    fn fit(&self, excess_returns: &ReturnSeries) -> Result<RegressionResult>;
}
