//! Capital Asset Pricing Model.
//!
//! Regresses an asset's excess return on the market's excess return:
//!
//! `R_i - R_f = alpha + beta * (R_m - R_f) + e`
//!
//! The slope is the asset's market beta; the intercept is Jensen's alpha.

use crate::error::Result;
use crate::ols::{LinearFactorModel, OlsConfig, RegressionResult};
use crate::traits::AssetPricingModel;
use capstan_data::{
    FactorColumn, ReturnKind, ReturnSeries, RiskFreeRate, TimeSeries, excess_returns,
    simple_returns,
};
use tracing::warn;

/// Single-factor market model.
#[derive(Debug, Clone)]
pub struct CapmModel {
    market_excess: ReturnSeries,
    estimator: LinearFactorModel,
}

impl CapmModel {
    /// Factor label of the market excess return.
    pub const MARKET_FACTOR: &'static str = FactorColumn::MarketExcess.label();

    const FACTORS: [&'static str; 1] = [Self::MARKET_FACTOR];

    /// Build from the market's excess return series.
    pub fn new(market_excess: ReturnSeries) -> Self {
        Self::with_config(market_excess, OlsConfig::default())
    }

    /// Build with a custom OLS configuration.
    pub fn with_config(market_excess: ReturnSeries, config: OlsConfig) -> Self {
        if market_excess.kind() != ReturnKind::Excess {
            warn!("CAPM market series is not net of the risk-free rate");
        }
        Self {
            market_excess,
            estimator: LinearFactorModel::with_config(config),
        }
    }

    /// Build from market index prices and a risk-free rate source.
    pub fn from_market_prices(prices: &TimeSeries, rate: &RiskFreeRate) -> Result<Self> {
        let returns = simple_returns(prices)?;
        Ok(Self::new(excess_returns(&returns, rate)?))
    }

    /// Market excess return series.
    pub const fn market_excess(&self) -> &ReturnSeries {
        &self.market_excess
    }
}

impl AssetPricingModel for CapmModel {
    fn name(&self) -> &str {
        "CAPM"
    }

    fn factor_names(&self) -> &[&'static str] {
        &Self::FACTORS
    }

    fn fit(&self, excess_returns: &ReturnSeries) -> Result<RegressionResult> {
        if excess_returns.kind() != ReturnKind::Excess {
            warn!(model = self.name(), "dependent series is not an excess return");
        }
        self.estimator.fit(
            excess_returns.series(),
            &[(Self::MARKET_FACTOR, self.market_excess.series())],
        )
    }
}
