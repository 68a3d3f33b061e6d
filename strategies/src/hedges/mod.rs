//! Hedging strategy implementations
//!
//! The strategy set is closed: [`StrategyVariant`] wraps each implementation
//! and forwards the [`HedgeStrategy`] capability set.

mod collar;
mod delta_neutral;
mod protective_put;

pub use collar::CollarStrategy;
pub use delta_neutral::DeltaNeutralStrategy;
pub use protective_put::ProtectivePutStrategy;

use crate::config::{HedgeConfig, HedgeInstrumentMap, PremiumModel};
use crate::error::StrategyResult;
use crate::types::{HedgeRecommendation, StrategyKind};
use crate::HedgeStrategy;
use hedge_risk::pricing::{self, OptionInputs, OptionType};
use hedge_risk::{MarketData, Portfolio, Position, PositionKind, RiskError};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Time-value factor of the premium approximation
const APPROXIMATION_FACTOR: f64 = 0.4;

/// A registered hedging strategy
pub enum StrategyVariant {
    DeltaNeutral(DeltaNeutralStrategy),
    ProtectivePut(ProtectivePutStrategy),
    Collar(CollarStrategy),
}

impl StrategyVariant {
    /// Build the variant for `kind`; only delta-neutral uses the instrument map
    pub fn new(kind: StrategyKind, config: HedgeConfig, instruments: HedgeInstrumentMap) -> Self {
        match kind {
            StrategyKind::DeltaNeutral => {
                StrategyVariant::DeltaNeutral(DeltaNeutralStrategy::new(config, instruments))
            }
            StrategyKind::ProtectivePut => {
                StrategyVariant::ProtectivePut(ProtectivePutStrategy::new(config))
            }
            StrategyKind::Collar => StrategyVariant::Collar(CollarStrategy::new(config)),
        }
    }

    /// Variant with the default configuration for `kind`
    pub fn with_defaults(kind: StrategyKind) -> Self {
        Self::new(kind, HedgeConfig::for_kind(kind), HedgeInstrumentMap::default())
    }

    fn inner(&self) -> &dyn HedgeStrategy {
        match self {
            StrategyVariant::DeltaNeutral(s) => s,
            StrategyVariant::ProtectivePut(s) => s,
            StrategyVariant::Collar(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn HedgeStrategy {
        match self {
            StrategyVariant::DeltaNeutral(s) => s,
            StrategyVariant::ProtectivePut(s) => s,
            StrategyVariant::Collar(s) => s,
        }
    }
}

impl HedgeStrategy for StrategyVariant {
    fn kind(&self) -> StrategyKind {
        self.inner().kind()
    }

    fn config(&self) -> &HedgeConfig {
        self.inner().config()
    }

    fn config_mut(&mut self) -> &mut HedgeConfig {
        self.inner_mut().config_mut()
    }

    fn analyze_position(
        &self,
        position: &Position,
        market_data: &MarketData,
    ) -> StrategyResult<Option<HedgeRecommendation>> {
        self.inner().analyze_position(position, market_data)
    }

    fn analyze_portfolio(
        &self,
        portfolio: &Portfolio,
        market_data: &HashMap<String, MarketData>,
    ) -> StrategyResult<Vec<HedgeRecommendation>> {
        self.inner().analyze_portfolio(portfolio, market_data)
    }

    fn calculate_hedge_size(&self, position: &Position, target_delta: f64) -> f64 {
        self.inner().calculate_hedge_size(position, target_delta)
    }
}

impl From<DeltaNeutralStrategy> for StrategyVariant {
    fn from(strategy: DeltaNeutralStrategy) -> Self {
        StrategyVariant::DeltaNeutral(strategy)
    }
}

impl From<ProtectivePutStrategy> for StrategyVariant {
    fn from(strategy: ProtectivePutStrategy) -> Self {
        StrategyVariant::ProtectivePut(strategy)
    }
}

impl From<CollarStrategy> for StrategyVariant {
    fn from(strategy: CollarStrategy) -> Self {
        StrategyVariant::Collar(strategy)
    }
}

/// Estimate a per-unit option premium under the configured model
pub(crate) fn estimate_premium(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    config: &HedgeConfig,
    implied_volatility: Option<f64>,
) -> StrategyResult<f64> {
    if !(spot.is_finite() && spot > 0.0) {
        return Err(RiskError::InvalidPosition(format!(
            "spot price must be positive for premium estimate, got {}",
            spot
        ))
        .into());
    }
    if !(strike.is_finite() && strike > 0.0) {
        return Err(RiskError::InvalidPosition(format!(
            "strike must be positive for premium estimate, got {}",
            strike
        ))
        .into());
    }

    let premium = match config.premium_model {
        PremiumModel::Approximation => {
            let intrinsic = match option_type {
                OptionType::Call => (spot - strike).max(0.0),
                OptionType::Put => (strike - spot).max(0.0),
            };
            let time_value =
                spot * config.assumed_volatility * config.tenor_years().sqrt() * APPROXIMATION_FACTOR;
            intrinsic + time_value
        }
        PremiumModel::BlackScholes => {
            let volatility = implied_volatility
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(config.assumed_volatility);
            let inputs = OptionInputs::new(
                spot,
                strike,
                config.tenor_years(),
                config.risk_free_rate,
                volatility,
            );
            pricing::price(option_type, &inputs)
        }
    };

    Ok(premium)
}

/// Underlying of a derivative symbol: `AAPL_PUT_150` → `AAPL`, `BTC-USD` → `BTC`
pub(crate) fn base_symbol(symbol: &str) -> &str {
    symbol
        .split('_')
        .next()
        .and_then(|s| s.split('-').next())
        .and_then(|s| s.split('/').next())
        .unwrap_or(symbol)
}

/// Kind of instrument implied by a hedge symbol
pub(crate) fn instrument_kind(symbol: &str) -> PositionKind {
    if symbol.ends_with("=F") {
        PositionKind::Futures
    } else if symbol.ends_with("-PERP") || symbol.contains('/') {
        PositionKind::Perpetual
    } else {
        PositionKind::Spot
    }
}

/// Long non-option positions aggregated per symbol (size-weighted entry), in first-seen order
pub(crate) fn aggregate_long_positions(portfolio: &Portfolio) -> IndexMap<String, (f64, f64)> {
    let mut groups: IndexMap<String, (f64, f64)> = IndexMap::new();
    for position in portfolio
        .positions
        .iter()
        .filter(|p| p.is_long() && !p.is_option())
    {
        let entry = groups.entry(position.symbol.clone()).or_insert((0.0, 0.0));
        entry.0 += position.size;
        entry.1 += position.size * position.entry_price;
    }

    groups
        .into_iter()
        .map(|(symbol, (size, cost))| (symbol, (size, cost / size)))
        .collect()
}

/// Dollar amount with thousands separators, no decimals
pub(crate) fn format_usd(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
