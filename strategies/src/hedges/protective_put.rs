//! Protective put hedging for long positions

use super::{aggregate_long_positions, estimate_premium, format_usd};
use crate::config::HedgeConfig;
use crate::error::StrategyResult;
use crate::types::{reduction_keys, HedgeAction, HedgeRecommendation, StrategyKind, Urgency};
use crate::HedgeStrategy;
use hedge_risk::{MarketData, OptionType, Portfolio, Position, PositionKind};
use std::collections::HashMap;

/// Buys out-of-the-money puts against long spot holdings
pub struct ProtectivePutStrategy {
    config: HedgeConfig,
}

impl ProtectivePutStrategy {
    pub fn new(config: HedgeConfig) -> Self {
        Self { config }
    }
}

impl HedgeStrategy for ProtectivePutStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ProtectivePut
    }

    fn config(&self) -> &HedgeConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut HedgeConfig {
        &mut self.config
    }

    fn analyze_position(
        &self,
        position: &Position,
        market_data: &MarketData,
    ) -> StrategyResult<Option<HedgeRecommendation>> {
        if !self.config.enabled || !position.is_long() || position.is_option() {
            return Ok(None);
        }

        let position_value = position.market_value();
        if position_value < self.config.min_position_value {
            return Ok(None);
        }

        let spot = market_data.price;
        let strike = spot * (1.0 + self.config.protective_put_offset);
        let premium = estimate_premium(
            OptionType::Put,
            spot,
            strike,
            &self.config,
            market_data.implied_volatility,
        )?;
        let total_cost = premium * position.size;

        if total_cost > position_value * self.config.max_hedge_cost {
            tracing::debug!(
                symbol = %position.symbol,
                total_cost,
                position_value,
                "Protective put too expensive"
            );
            return Ok(None);
        }

        let max_loss_with_hedge = ((spot - strike) * position.size + total_cost).max(0.0);
        let protection = position_value - max_loss_with_hedge;

        let risk_reduction = HashMap::from([
            (reduction_keys::DOWNSIDE_PROTECTION.to_string(), protection),
            (
                reduction_keys::MAX_LOSS_REDUCTION.to_string(),
                protection / position_value,
            ),
            (
                reduction_keys::COST_RATIO.to_string(),
                total_cost / position_value,
            ),
        ]);

        Ok(Some(
            HedgeRecommendation::new(
                format!("{}_PUT_{:.0}", position.symbol, strike),
                HedgeAction::Buy,
                position.size,
                PositionKind::Put,
                StrategyKind::ProtectivePut,
            )
            .with_price(premium)
            .with_reasoning(format!(
                "Protective put for ${} long position",
                format_usd(position_value)
            ))
            .with_urgency(Urgency::Medium)
            .with_estimated_cost(total_cost)
            .with_risk_reduction(risk_reduction),
        ))
    }

    fn analyze_portfolio(
        &self,
        portfolio: &Portfolio,
        market_data: &HashMap<String, MarketData>,
    ) -> StrategyResult<Vec<HedgeRecommendation>> {
        let mut recommendations = Vec::new();

        for (symbol, (size, entry_price)) in aggregate_long_positions(portfolio) {
            let Some(data) = market_data.get(&symbol) else {
                continue;
            };

            let aggregate = Position::spot(symbol, size, entry_price, data.price);
            if let Some(rec) = self.analyze_position(&aggregate, data)? {
                recommendations.push(rec);
            }
        }

        Ok(recommendations)
    }

    /// One put per unit held
    fn calculate_hedge_size(&self, position: &Position, _target_delta: f64) -> f64 {
        position.size.max(0.0)
    }
}
