//! Collar hedging: long put financed by a short call

use super::{aggregate_long_positions, estimate_premium, format_usd};
use crate::config::HedgeConfig;
use crate::error::StrategyResult;
use crate::types::{reduction_keys, HedgeAction, HedgeRecommendation, StrategyKind, Urgency};
use crate::HedgeStrategy;
use hedge_risk::{MarketData, OptionType, Portfolio, Position, PositionKind};
use std::collections::HashMap;

pub struct CollarStrategy {
    config: HedgeConfig,
}

impl CollarStrategy {
    pub fn new(config: HedgeConfig) -> Self {
        Self { config }
    }
}

impl HedgeStrategy for CollarStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Collar
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
        let put_strike = spot * (1.0 + self.config.collar_put_offset);
        let call_strike = spot * (1.0 + self.config.collar_call_offset);

        let iv = market_data.implied_volatility;
        let put_premium = estimate_premium(OptionType::Put, spot, put_strike, &self.config, iv)?;
        let call_premium = estimate_premium(OptionType::Call, spot, call_strike, &self.config, iv)?;

        // Put paid minus call received; negative is a net credit
        let net_cost = (put_premium - call_premium) * position.size;
        if net_cost > position_value * self.config.max_hedge_cost {
            tracing::debug!(
                symbol = %position.symbol,
                net_cost,
                position_value,
                "Collar too expensive"
            );
            return Ok(None);
        }

        let downside_protection = (spot - put_strike) * position.size;
        let upside_cap = (call_strike - spot) * position.size - net_cost;

        let risk_reduction = HashMap::from([
            (
                reduction_keys::DOWNSIDE_PROTECTION.to_string(),
                downside_protection,
            ),
            (reduction_keys::UPSIDE_CAP.to_string(), upside_cap),
            (reduction_keys::NET_COST.to_string(), net_cost),
            (
                reduction_keys::COST_RATIO.to_string(),
                net_cost / position_value,
            ),
        ]);

        Ok(Some(
            HedgeRecommendation::new(
                format!(
                    "{}_COLLAR_{:.0}_{:.0}",
                    position.symbol, put_strike, call_strike
                ),
                HedgeAction::Collar,
                position.size,
                // Reported under the call leg; the put leg shares the symbol
                PositionKind::Call,
                StrategyKind::Collar,
            )
            .with_price((put_premium + call_premium) / 2.0)
            .with_reasoning(format!(
                "Collar strategy for ${} position",
                format_usd(position_value)
            ))
            .with_urgency(Urgency::Medium)
            .with_estimated_cost(net_cost.abs())
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

    fn calculate_hedge_size(&self, position: &Position, _target_delta: f64) -> f64 {
        position.size.max(0.0)
    }
}
