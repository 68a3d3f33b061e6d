//! # hedge-strategies: Hedge recommendation engine
//!
//! This library turns portfolio risk into ranked, budget-constrained hedge
//! recommendations.
//!
//! ## Core Components
//!
//! - **HedgeStrategy Trait**: Capability set every hedging strategy implements
//! - **Strategies**: Delta-neutral, protective put and collar, held as [`StrategyVariant`]s
//! - **StrategyManager**: Ordered strategy registry with ranking, selection and performance tracking
//! - **EngineConfig**: YAML/JSON configuration for thresholds, strategies and hedge instruments
//!
//! ## Example Usage
//!
//! ```rust
//! use hedge_risk::{Portfolio, Position, RiskCalculator, RiskThresholds};
//! use hedge_strategies::{HedgeAction, StrategyKind, StrategyManager};
//!
//! let mut portfolio = Portfolio::new();
//! portfolio.add_position(Position::spot("AAPL", 1000.0, 150.0, 155.0));
//! RiskCalculator::default().refresh_portfolio_greeks(&mut portfolio);
//!
//! let mut manager = StrategyManager::new(RiskThresholds::default());
//! let recommendations = manager.get_hedge_recommendations(&portfolio, None);
//!
//! let delta_hedge = recommendations
//!     .iter()
//!     .find(|r| r.strategy == StrategyKind::DeltaNeutral)
//!     .unwrap();
//! assert_eq!(delta_hedge.symbol, "QQQ");
//! assert_eq!(delta_hedge.action, HedgeAction::Sell);
//! ```

pub mod config;
pub mod error;
pub mod hedges;
pub mod manager;
pub mod metrics;
pub mod types;

// Re-export main types
pub use config::{EngineConfig, FallbackMode, HedgeConfig, HedgeInstrumentMap, PremiumModel};
pub use error::{StrategyError, StrategyResult};
pub use hedges::{CollarStrategy, DeltaNeutralStrategy, ProtectivePutStrategy, StrategyVariant};
pub use manager::{HedgeCycleReport, StrategyManager};
pub use metrics::{MetricType, StrategyMetric, StrategyPerformance};
pub use types::{
    ExecutionCost, HedgeAction, HedgeRecommendation, RiskType, StrategyKind, StrategyRanking,
    Urgency,
};

use hedge_risk::{MarketData, Portfolio, Position};
use std::collections::HashMap;
use types::reduction_keys;

/// Commission as a fraction of notional
pub const COMMISSION_RATE: f64 = 0.0001;

/// Commission floor per hedge
pub const MIN_COMMISSION: f64 = 1.0;

/// Notional above which market impact is charged
pub const MARKET_IMPACT_THRESHOLD: f64 = 100_000.0;

/// Market impact as a fraction of notional
pub const MARKET_IMPACT_RATE: f64 = 0.0005;

/// Base trait all hedging strategies implement
///
/// Analysis methods return `Ok(None)` / an empty list when no hedge is
/// needed; errors are reserved for inputs that cannot be priced.
pub trait HedgeStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn config(&self) -> &HedgeConfig;

    fn config_mut(&mut self) -> &mut HedgeConfig;

    /// Analyze a single position against its market snapshot
    fn analyze_position(
        &self,
        position: &Position,
        market_data: &MarketData,
    ) -> StrategyResult<Option<HedgeRecommendation>>;

    /// Analyze a whole portfolio
    fn analyze_portfolio(
        &self,
        portfolio: &Portfolio,
        market_data: &HashMap<String, MarketData>,
    ) -> StrategyResult<Vec<HedgeRecommendation>>;

    /// Signed hedge quantity needed to move `position` toward `target_delta`
    fn calculate_hedge_size(&self, position: &Position, target_delta: f64) -> f64;

    fn is_enabled(&self) -> bool {
        self.config().enabled
    }

    /// Estimate the full execution cost of a recommendation
    fn estimate_execution_cost(
        &self,
        recommendation: &HedgeRecommendation,
        market_data: &MarketData,
    ) -> ExecutionCost {
        let size = recommendation.size.abs();
        let notional = (size * recommendation.price.unwrap_or(market_data.price)).abs();

        let spread_cost = market_data
            .bid_ask_spread()
            .map(|spread| spread * size / 2.0)
            .unwrap_or(0.0);
        let slippage_cost = notional * self.config().max_slippage;
        let commission_cost = (notional * COMMISSION_RATE).max(MIN_COMMISSION);
        let market_impact_cost = if notional > MARKET_IMPACT_THRESHOLD {
            notional * MARKET_IMPACT_RATE
        } else {
            0.0
        };

        ExecutionCost::new(
            self.kind(),
            recommendation.estimated_cost,
            spread_cost,
            slippage_cost,
            commission_cost,
            market_impact_cost,
            notional,
        )
    }

    /// Urgency from breach severity (exposure / threshold)
    fn determine_urgency(&self, severity: f64) -> Urgency {
        Urgency::from_severity(severity)
    }

    /// Expected reduction from a hedge with the given delta and gamma
    fn expected_risk_reduction(&self, hedge_delta: f64, hedge_gamma: f64) -> HashMap<String, f64> {
        HashMap::from([
            (reduction_keys::DELTA_REDUCTION.to_string(), hedge_delta.abs()),
            (reduction_keys::GAMMA_REDUCTION.to_string(), hedge_gamma.abs()),
            (
                reduction_keys::VAR_REDUCTION.to_string(),
                (hedge_delta.abs() * 0.1).min(0.5),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hedge_risk::PositionKind;

    fn strategy() -> StrategyVariant {
        StrategyVariant::new(
            StrategyKind::DeltaNeutral,
            HedgeConfig::delta_neutral(),
            HedgeInstrumentMap::default(),
        )
    }

    fn recommendation(size: f64, price: f64) -> HedgeRecommendation {
        HedgeRecommendation::new(
            "QQQ",
            HedgeAction::Sell,
            size,
            PositionKind::Spot,
            StrategyKind::DeltaNeutral,
        )
        .with_price(price)
        .with_estimated_cost(5.0)
    }

    #[test]
    fn test_execution_cost_small_order() {
        let market_data = MarketData::new("QQQ", 400.0).with_quote(399.9, 400.1);
        let cost = strategy().estimate_execution_cost(&recommendation(10.0, 400.0), &market_data);

        // notional 4,000
        assert_abs_diff_eq!(cost.bid_ask_spread_cost, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cost.slippage_cost, 4.0, epsilon = 1e-9);
        assert_eq!(cost.commission_cost, MIN_COMMISSION);
        assert_eq!(cost.market_impact_cost, 0.0);
        assert_abs_diff_eq!(cost.total_cost, 11.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cost.cost_percentage, 11.0 / 4_000.0, epsilon = 1e-12);
        assert_eq!(cost.strategy, StrategyKind::DeltaNeutral);
    }

    #[test]
    fn test_execution_cost_large_order() {
        let market_data = MarketData::new("QQQ", 400.0);
        let cost = strategy().estimate_execution_cost(&recommendation(500.0, 400.0), &market_data);

        // notional 200,000
        assert_eq!(cost.bid_ask_spread_cost, 0.0);
        assert_abs_diff_eq!(cost.commission_cost, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cost.market_impact_cost, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_execution_cost_uses_market_price_without_recommendation_price() {
        let mut rec = recommendation(10.0, 0.0);
        rec.price = None;
        let cost = strategy().estimate_execution_cost(&rec, &MarketData::new("QQQ", 200.0));
        assert_abs_diff_eq!(cost.slippage_cost, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_expected_risk_reduction() {
        let reduction = strategy().expected_risk_reduction(-12.0, 0.0);
        assert_eq!(reduction[reduction_keys::DELTA_REDUCTION], 12.0);
        assert_eq!(reduction[reduction_keys::GAMMA_REDUCTION], 0.0);
        assert_eq!(reduction[reduction_keys::VAR_REDUCTION], 0.5);

        let small = strategy().expected_risk_reduction(2.0, 0.1);
        assert_abs_diff_eq!(small[reduction_keys::VAR_REDUCTION], 0.2, epsilon = 1e-12);
    }
}
