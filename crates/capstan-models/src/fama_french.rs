//! Fama-French three-factor model.
//!
//! Extends CAPM with a size (`SMB`) and a value (`HML`) factor:
//!
//! `R_i - R_f = alpha + b * MKT_RF + s * SMB + h * HML + e`
//!
//! Factors and the risk-free rate both come from the published factor table,
//! so the dependent series should be net of that table's `RF` column.

use crate::error::Result;
use crate::ols::{LinearFactorModel, OlsConfig, RegressionResult};
use crate::traits::AssetPricingModel;
use capstan_data::{FactorColumn, FactorDataset, ReturnKind, ReturnSeries, TimeSeries};
use tracing::warn;

/// Three-factor model built from a factor table.
#[derive(Debug, Clone)]
pub struct FamaFrenchModel {
    market_excess: TimeSeries,
    smb: TimeSeries,
    hml: TimeSeries,
    estimator: LinearFactorModel,
}

impl FamaFrenchModel {
    /// Factor labels, in slope order.
    pub const FACTORS: [&'static str; 3] = [
        FactorColumn::MarketExcess.label(),
        FactorColumn::Smb.label(),
        FactorColumn::Hml.label(),
    ];

    /// Build from a parsed factor table.
    pub fn from_dataset(dataset: &FactorDataset) -> Self {
        Self::with_config(dataset, OlsConfig::default())
    }

    /// Build from a factor table with a custom OLS configuration.
    pub fn with_config(dataset: &FactorDataset, config: OlsConfig) -> Self {
        Self {
            market_excess: dataset.market_excess(),
            smb: dataset.smb(),
            hml: dataset.hml(),
            estimator: LinearFactorModel::with_config(config),
        }
    }
}

impl AssetPricingModel for FamaFrenchModel {
    fn name(&self) -> &str {
        "Fama-French 3"
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
            &[
                (Self::FACTORS[0], &self.market_excess),
                (Self::FACTORS[1], &self.smb),
                (Self::FACTORS[2], &self.hml),
            ],
        )
    }
}
