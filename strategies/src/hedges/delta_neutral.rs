//! Delta-neutral hedging through futures, perpetuals or ETFs

use super::{base_symbol, instrument_kind};
use crate::config::{HedgeConfig, HedgeInstrumentMap};
use crate::error::StrategyResult;
use crate::types::{HedgeAction, HedgeRecommendation, StrategyKind};
use crate::HedgeStrategy;
use hedge_risk::{Greeks, MarketData, Portfolio, Position};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Estimated trading cost of a delta hedge, as a fraction of hedge notional
const HEDGE_COST_RATE: f64 = 0.001;

/// Neutralizes directional exposure with a linear hedge instrument
///
/// Reads the size-scaled delta stored on positions; Greeks must be refreshed
/// before analysis.
pub struct DeltaNeutralStrategy {
    config: HedgeConfig,
    instruments: HedgeInstrumentMap,
}

impl DeltaNeutralStrategy {
    pub fn new(config: HedgeConfig, instruments: HedgeInstrumentMap) -> Self {
        Self {
            config,
            instruments,
        }
    }

    pub fn instruments(&self) -> &HedgeInstrumentMap {
        &self.instruments
    }

    pub fn instruments_mut(&mut self) -> &mut HedgeInstrumentMap {
        &mut self.instruments
    }

    fn analyze_exposure(
        &self,
        position: &Position,
        market_data: &MarketData,
    ) -> Option<HedgeRecommendation> {
        if !self.config.enabled {
            return None;
        }

        let current_delta = position.delta();
        let abs_delta = current_delta.abs();
        if abs_delta < self.config.delta_threshold {
            return None;
        }

        let hedge_size = self.calculate_hedge_size(position, 0.0);
        if hedge_size.abs() < self.config.min_hedge_size {
            return None;
        }

        let hedge_cost = hedge_size.abs() * market_data.price * HEDGE_COST_RATE;
        let notional = position.market_value().abs();
        if hedge_cost > notional * self.config.max_hedge_cost {
            tracing::debug!(
                symbol = %position.symbol,
                hedge_cost,
                notional,
                "Delta hedge too expensive"
            );
            return None;
        }

        let instrument = self.instruments.resolve(&position.symbol);
        let urgency = self.determine_urgency(abs_delta / self.config.delta_threshold);
        let risk_reduction = self.expected_risk_reduction(-current_delta, 0.0);

        // Negative hedge size offsets long delta
        let action = if hedge_size < 0.0 {
            HedgeAction::Sell
        } else {
            HedgeAction::Buy
        };

        Some(
            HedgeRecommendation::new(
                instrument.as_str(),
                action,
                hedge_size.abs(),
                instrument_kind(&instrument),
                StrategyKind::DeltaNeutral,
            )
            .with_price(market_data.price)
            .with_reasoning(format!(
                "Delta hedge: neutralizing {:.3} delta exposure",
                current_delta
            ))
            .with_urgency(urgency)
            .with_estimated_cost(hedge_cost)
            .with_risk_reduction(risk_reduction),
        )
    }
}

impl HedgeStrategy for DeltaNeutralStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DeltaNeutral
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
        Ok(self.analyze_exposure(position, market_data))
    }

    /// Net delta per underlying and hedge each net exposure once
    ///
    /// Triggers on the portfolio's total delta; once triggered, every
    /// underlying whose net delta also reaches `delta_threshold` is hedged.
    /// The hedge instrument resolves on the underlying, even when the only
    /// quote available is for one of its derivatives.
    fn analyze_portfolio(
        &self,
        portfolio: &Portfolio,
        market_data: &HashMap<String, MarketData>,
    ) -> StrategyResult<Vec<HedgeRecommendation>> {
        let mut recommendations = Vec::new();
        if !self.config.enabled {
            return Ok(recommendations);
        }

        let total_delta = portfolio.total_delta();
        if total_delta.abs() < self.config.delta_threshold {
            return Ok(recommendations);
        }

        // base symbol -> (net delta, first original symbol)
        let mut net_deltas: IndexMap<&str, (f64, &str)> = IndexMap::new();
        for position in &portfolio.positions {
            let entry = net_deltas
                .entry(base_symbol(&position.symbol))
                .or_insert((0.0, position.symbol.as_str()));
            entry.0 += position.delta();
        }

        for (base, (net_delta, original)) in net_deltas {
            let Some(data) = market_data.get(base).or_else(|| market_data.get(original)) else {
                tracing::debug!(underlying = base, "No market data for delta hedge");
                continue;
            };

            // Pairs like `ETH-USD` are mapped whole; derivative symbols never are
            let underlying = if self.instruments.get(base).is_none()
                && self.instruments.get(original).is_some()
            {
                original
            } else {
                base
            };

            // Synthetic spot position on the underlying carrying the net delta
            let synthetic = Position::spot(underlying, net_delta, data.price, data.price).with_greeks(
                Greeks {
                    delta: net_delta,
                    ..Greeks::zero()
                },
            );

            if let Some(rec) = self.analyze_exposure(&synthetic, data) {
                recommendations.push(rec);
            }
        }

        Ok(recommendations)
    }

    fn calculate_hedge_size(&self, position: &Position, target_delta: f64) -> f64 {
        -(position.delta() - target_delta) * self.config.hedge_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{reduction_keys, Urgency};
    use approx::assert_abs_diff_eq;
    use hedge_risk::PositionKind;

    fn strategy() -> DeltaNeutralStrategy {
        DeltaNeutralStrategy::new(HedgeConfig::delta_neutral(), HedgeInstrumentMap::default())
    }

    fn with_delta(position: Position, delta: f64) -> Position {
        position.with_greeks(Greeks {
            delta,
            ..Greeks::zero()
        })
    }

    #[test]
    fn test_long_spot_sells_mapped_instrument() {
        let position = with_delta(Position::spot("AAPL", 1000.0, 150.0, 155.0), 1.0);
        let rec = strategy()
            .analyze_position(&position, &MarketData::new("AAPL", 155.0))
            .unwrap()
            .unwrap();

        assert_eq!(rec.symbol, "QQQ");
        assert_eq!(rec.action, HedgeAction::Sell);
        assert_eq!(rec.size, 1.0);
        assert_eq!(rec.strategy, StrategyKind::DeltaNeutral);
        assert_eq!(rec.price, Some(155.0));
        assert_eq!(rec.reasoning, "Delta hedge: neutralizing 1.000 delta exposure");
        assert_abs_diff_eq!(rec.estimated_cost, 0.155, epsilon = 1e-12);
        // severity 1.0 / 0.1 = 10
        assert_eq!(rec.urgency, Urgency::Critical);
        assert_eq!(rec.reduction(reduction_keys::DELTA_REDUCTION), 1.0);
        assert_abs_diff_eq!(rec.reduction(reduction_keys::VAR_REDUCTION), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_short_delta_buys() {
        let position = with_delta(
            Position::new("BTC-USD", PositionKind::Perpetual, -30.0, 60_000.0, 61_000.0),
            -25.0,
        );
        let rec = strategy()
            .analyze_position(&position, &MarketData::new("BTC-USD", 61_000.0))
            .unwrap()
            .unwrap();

        assert_eq!(rec.symbol, "BTC/USDT");
        assert_eq!(rec.instrument, PositionKind::Perpetual);
        assert_eq!(rec.action, HedgeAction::Buy);
        assert_eq!(rec.size, 25.0);
    }

    #[test]
    fn test_below_threshold_is_skipped() {
        let position = with_delta(Position::spot("AAPL", 1.0, 150.0, 155.0), 0.05);
        let rec = strategy()
            .analyze_position(&position, &MarketData::new("AAPL", 155.0))
            .unwrap();
        assert!(rec.is_none());
    }

    #[test]
    fn test_small_hedge_is_skipped() {
        let strategy = DeltaNeutralStrategy::new(
            HedgeConfig {
                hedge_ratio: 0.5,
                ..HedgeConfig::delta_neutral()
            },
            HedgeInstrumentMap::default(),
        );
        // hedge −0.9 below min_hedge_size
        let position = with_delta(Position::spot("AAPL", 100.0, 150.0, 155.0), 1.8);
        assert!(strategy
            .analyze_position(&position, &MarketData::new("AAPL", 155.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unmapped_symbol_uses_perp() {
        let position = with_delta(Position::spot("NVDA", 100.0, 400.0, 420.0), 3.0);
        let rec = strategy()
            .analyze_position(&position, &MarketData::new("NVDA", 420.0))
            .unwrap()
            .unwrap();
        assert_eq!(rec.symbol, "NVDA-PERP");
    }

    #[test]
    fn test_disabled_strategy_returns_nothing() {
        let mut strategy = strategy();
        strategy.config_mut().enabled = false;
        let position = with_delta(Position::spot("AAPL", 1000.0, 150.0, 155.0), 1.0);
        assert!(strategy
            .analyze_position(&position, &MarketData::new("AAPL", 155.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_hedge_size_with_target() {
        let strategy = DeltaNeutralStrategy::new(
            HedgeConfig {
                hedge_ratio: 0.8,
                ..HedgeConfig::delta_neutral()
            },
            HedgeInstrumentMap::default(),
        );
        let position = with_delta(Position::spot("AAPL", 1.0, 1.0, 1.0), 50.0);
        assert_abs_diff_eq!(strategy.calculate_hedge_size(&position, 10.0), -32.0, epsilon = 1e-12);
    }

    #[test]
    fn test_portfolio_nets_delta_per_underlying() {
        let mut portfolio = Portfolio::new();
        portfolio.add_position(with_delta(Position::spot("AAPL", 1000.0, 150.0, 155.0), 1.0));
        portfolio.add_position(with_delta(
            Position::new("AAPL_CALL_160", PositionKind::Call, 10.0, 3.0, 155.0),
            4.5,
        ));
        portfolio.add_position(with_delta(
            Position::new("AAPL_PUT_140", PositionKind::Put, 10.0, 1.0, 155.0),
            -1.5,
        ));

        let mut market_data = HashMap::new();
        market_data.insert("AAPL".to_string(), MarketData::new("AAPL", 155.0));

        let recs = strategy().analyze_portfolio(&portfolio, &market_data).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].symbol, "QQQ");
        assert_eq!(recs[0].size, 4.0);
        assert_eq!(recs[0].action, HedgeAction::Sell);
    }

    #[test]
    fn test_portfolio_falls_back_to_original_symbol_for_market_data() {
        let mut portfolio = Portfolio::new();
        portfolio.add_position(with_delta(
            Position::new("ETH-USD", PositionKind::Spot, 10.0, 3000.0, 3100.0),
            10.0,
        ));

        let mut market_data = HashMap::new();
        market_data.insert("ETH-USD".to_string(), MarketData::new("ETH-USD", 3100.0));

        let recs = strategy().analyze_portfolio(&portfolio, &market_data).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].symbol, "ETH/USDT");
    }

    #[test]
    fn test_portfolio_hedges_only_underlyings_above_delta_threshold() {
        let strategy = DeltaNeutralStrategy::new(
            HedgeConfig {
                delta_threshold: 500.0,
                rebalance_threshold: 100.0,
                ..HedgeConfig::delta_neutral()
            },
            HedgeInstrumentMap::default(),
        );

        let mut portfolio = Portfolio::new();
        portfolio.add_position(with_delta(Position::spot("AAPL", 600.0, 150.0, 155.0), 600.0));
        // Between rebalance_threshold and delta_threshold
        portfolio.add_position(with_delta(Position::spot("MSFT", 300.0, 300.0, 310.0), 300.0));

        let mut market_data = HashMap::new();
        market_data.insert("AAPL".to_string(), MarketData::new("AAPL", 155.0));
        market_data.insert("MSFT".to_string(), MarketData::new("MSFT", 310.0));

        let recs = strategy.analyze_portfolio(&portfolio, &market_data).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].symbol, "QQQ");
        assert_eq!(recs[0].size, 600.0);
        assert_eq!(recs[0].price, Some(155.0));
    }

    #[test]
    fn test_options_only_underlying_resolves_mapped_instrument() {
        let mut portfolio = Portfolio::new();
        portfolio.add_position(with_delta(
            Position::new("AAPL_CALL_150", PositionKind::Call, 100.0, 5.0, 155.0),
            68.0,
        ));

        // Only the option itself is quoted
        let mut market_data = HashMap::new();
        market_data.insert(
            "AAPL_CALL_150".to_string(),
            MarketData::new("AAPL_CALL_150", 155.0),
        );

        let recs = strategy().analyze_portfolio(&portfolio, &market_data).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].symbol, "QQQ");
        assert_eq!(recs[0].action, HedgeAction::Sell);
        assert_eq!(recs[0].size, 68.0);
    }

    #[test]
    fn test_unmapped_option_underlying_uses_underlying_perp() {
        let mut portfolio = Portfolio::new();
        portfolio.add_position(with_delta(
            Position::new("NVDA_PUT_400", PositionKind::Put, 10.0, 12.0, 420.0),
            -4.0,
        ));

        let mut market_data = HashMap::new();
        market_data.insert(
            "NVDA_PUT_400".to_string(),
            MarketData::new("NVDA_PUT_400", 420.0),
        );

        let recs = strategy().analyze_portfolio(&portfolio, &market_data).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].symbol, "NVDA-PERP");
        assert_eq!(recs[0].action, HedgeAction::Buy);
    }

    #[test]
    fn test_portfolio_below_threshold() {
        let mut portfolio = Portfolio::new();
        portfolio.add_position(with_delta(Position::spot("AAPL", 10.0, 150.0, 155.0), 1.0));
        portfolio.add_position(with_delta(Position::spot("MSFT", -10.0, 300.0, 310.0), -0.95));

        let mut market_data = HashMap::new();
        market_data.insert("AAPL".to_string(), MarketData::new("AAPL", 155.0));
        market_data.insert("MSFT".to_string(), MarketData::new("MSFT", 310.0));

        assert!(strategy()
            .analyze_portfolio(&portfolio, &market_data)
            .unwrap()
            .is_empty());
    }
}
