//! Strategy manager: registry, analysis, ranking and selection
//!
//! The manager owns an ordered registry of [`StrategyVariant`]s keyed by
//! [`StrategyKind`]. One call operates on one portfolio snapshot; the caller
//! guarantees the snapshot is not mutated for the duration of the call.

use crate::config::{EngineConfig, FallbackMode, HedgeConfig};
use crate::error::{StrategyError, StrategyResult};
use crate::hedges::StrategyVariant;
use crate::metrics::StrategyPerformance;
use crate::types::{
    reduction_keys, HedgeAction, HedgeRecommendation, RiskType, StrategyKind, StrategyRanking,
    Urgency,
};
use crate::HedgeStrategy;
use hedge_risk::{
    BreachReport, GreeksFailure, MarketData, Portfolio, PositionKind, RiskCalculator,
    RiskThresholds,
};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Default selection budget as a fraction of |portfolio value|
pub const DEFAULT_BUDGET_FRACTION: f64 = 0.02;

/// Hedges scoring above this are selected even when their risk type is covered
pub const HIGH_QUALITY_SCORE: f64 = 0.8;

/// Cost ratio multiplier in the cost score (zero at 5% of portfolio value)
const COST_SCORE_DECAY: f64 = 20.0;

/// Lower bound on |portfolio delta| when normalizing delta reduction
const MIN_DELTA_NORMALIZER: f64 = 0.1;

/// Price assumed for a hedge instrument with no quote and no recommendation price
const PROXY_PRICE: f64 = 100.0;

const FALLBACK_HEDGE_FRACTION: f64 = 0.5;
const FALLBACK_COST_RATE: f64 = 0.005;

/// Outcome of [`StrategyManager::run_hedge_cycle`]
#[derive(Debug)]
pub struct HedgeCycleReport {
    pub breaches: BreachReport,

    /// Tagged recommendations from every enabled strategy
    pub recommendations: Vec<HedgeRecommendation>,

    /// Ranked best first
    pub rankings: Vec<StrategyRanking>,

    /// Budget-constrained selection, in ranked order
    pub selected: Vec<HedgeRecommendation>,

    /// Positions skipped during the Greeks refresh
    pub greeks_failures: Vec<GreeksFailure>,
}

/// Hedge strategy manager
///
/// # Example
///
/// ```
/// use hedge_risk::RiskThresholds;
/// use hedge_strategies::{HedgeStrategy, StrategyKind, StrategyManager};
///
/// let mut manager = StrategyManager::new(RiskThresholds::default());
/// assert_eq!(manager.strategy_kinds().len(), 3);
///
/// manager.enable_strategy(StrategyKind::Collar, false).unwrap();
/// assert!(!manager.strategy(StrategyKind::Collar).unwrap().is_enabled());
///
/// manager.remove_strategy(StrategyKind::ProtectivePut).unwrap();
/// assert_eq!(
///     manager.strategy_kinds(),
///     vec![StrategyKind::DeltaNeutral, StrategyKind::Collar]
/// );
/// ```
pub struct StrategyManager {
    thresholds: RiskThresholds,

    /// Registered strategies in evaluation order
    strategies: IndexMap<StrategyKind, StrategyVariant>,

    performance: IndexMap<StrategyKind, StrategyPerformance>,

    fallback: FallbackMode,
}

impl StrategyManager {
    /// Manager with the three default strategies registered
    pub fn new(thresholds: RiskThresholds) -> Self {
        let mut manager = Self {
            thresholds,
            strategies: IndexMap::new(),
            performance: IndexMap::new(),
            fallback: FallbackMode::default(),
        };
        for kind in StrategyKind::ALL {
            manager.add_strategy(StrategyVariant::with_defaults(kind));
        }
        manager
    }

    /// Build a manager from a validated engine configuration
    pub fn from_config(config: &EngineConfig) -> StrategyResult<Self> {
        config.validate()?;

        let mut manager = Self {
            thresholds: config.thresholds.clone(),
            strategies: IndexMap::new(),
            performance: IndexMap::new(),
            fallback: config.fallback,
        };
        for (kind, hedge_config) in &config.strategies {
            manager.add_strategy(StrategyVariant::new(
                *kind,
                hedge_config.clone(),
                config.instruments.clone(),
            ));
        }
        Ok(manager)
    }

    pub fn with_fallback_mode(mut self, fallback: FallbackMode) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn fallback_mode(&self) -> FallbackMode {
        self.fallback
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: RiskThresholds) {
        self.thresholds = thresholds;
    }

    /// Register a strategy, replacing any existing one of the same kind
    pub fn add_strategy(&mut self, strategy: StrategyVariant) {
        let kind = strategy.kind();
        if self.strategies.insert(kind, strategy).is_some() {
            tracing::info!(strategy = %kind, "Replaced hedge strategy");
        }
        self.performance
            .entry(kind)
            .or_insert_with(|| StrategyPerformance::new(kind));
    }

    /// Unregister a strategy and drop its performance counters
    pub fn remove_strategy(&mut self, kind: StrategyKind) -> StrategyResult<StrategyVariant> {
        let strategy = self
            .strategies
            .shift_remove(&kind)
            .ok_or_else(|| StrategyError::StrategyNotFound(kind.to_string()))?;
        self.performance.shift_remove(&kind);
        Ok(strategy)
    }

    pub fn enable_strategy(&mut self, kind: StrategyKind, enabled: bool) -> StrategyResult<()> {
        let strategy = self
            .strategies
            .get_mut(&kind)
            .ok_or_else(|| StrategyError::StrategyNotFound(kind.to_string()))?;
        strategy.config_mut().enabled = enabled;
        tracing::info!(strategy = %kind, enabled, "Strategy toggled");
        Ok(())
    }

    pub fn strategy(&self, kind: StrategyKind) -> Option<&StrategyVariant> {
        self.strategies.get(&kind)
    }

    pub fn strategy_mut(&mut self, kind: StrategyKind) -> Option<&mut StrategyVariant> {
        self.strategies.get_mut(&kind)
    }

    pub fn strategy_config(&self, kind: StrategyKind) -> Option<&HedgeConfig> {
        self.strategies.get(&kind).map(|s| s.config())
    }

    /// Registered kinds in evaluation order
    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.keys().copied().collect()
    }

    /// Run every enabled strategy if any threshold is breached
    ///
    /// Each recommendation's reasoning is tagged with its strategy id. A
    /// failing strategy is logged and contributes nothing.
    pub fn analyze_portfolio(
        &mut self,
        portfolio: &Portfolio,
        market_data: &HashMap<String, MarketData>,
    ) -> Vec<HedgeRecommendation> {
        let breaches = self.thresholds.check_breach(portfolio);
        if !breaches.any() {
            tracing::debug!("No risk thresholds breached");
            return Vec::new();
        }
        self.run_strategies(portfolio, market_data)
    }

    fn run_strategies(
        &mut self,
        portfolio: &Portfolio,
        market_data: &HashMap<String, MarketData>,
    ) -> Vec<HedgeRecommendation> {
        let mut all_recommendations = Vec::new();

        for (kind, strategy) in &self.strategies {
            if !strategy.is_enabled() {
                continue;
            }

            match strategy.analyze_portfolio(portfolio, market_data) {
                Ok(mut recommendations) => {
                    for rec in &mut recommendations {
                        rec.tag_reasoning();
                    }
                    self.performance
                        .entry(*kind)
                        .or_insert_with(|| StrategyPerformance::new(*kind))
                        .record_recommendations(recommendations.len());

                    tracing::debug!(
                        strategy = %kind,
                        count = recommendations.len(),
                        "Strategy analysis complete"
                    );
                    all_recommendations.extend(recommendations);
                }
                Err(e) => {
                    tracing::error!(strategy = %kind, error = %e, "Strategy analysis failed");
                }
            }
        }

        tracing::info!(
            count = all_recommendations.len(),
            "Generated hedge recommendations"
        );
        all_recommendations
    }

    /// Recommendations for a portfolio, synthesizing market data from
    /// current prices when none is supplied
    ///
    /// Under [`FallbackMode::DefaultDeltaHedge`] a non-empty portfolio with
    /// no recommendations gets one flagged fallback hedge.
    pub fn get_hedge_recommendations(
        &mut self,
        portfolio: &Portfolio,
        market_data: Option<&HashMap<String, MarketData>>,
    ) -> Vec<HedgeRecommendation> {
        let synthesized;
        let market_data = match market_data {
            Some(data) => data,
            None => {
                synthesized = synthesize_market_data(portfolio);
                &synthesized
            }
        };

        let mut recommendations = self.analyze_portfolio(portfolio, market_data);

        if recommendations.is_empty() && self.fallback == FallbackMode::DefaultDeltaHedge {
            if let Some(rec) = fallback_recommendation(portfolio) {
                tracing::info!(symbol = %rec.symbol, "Using fallback delta hedge");
                recommendations.push(rec);
            }
        }

        recommendations
    }

    /// Score and sort recommendations, best first
    ///
    /// Ties keep their input order.
    pub fn rank_recommendations(
        &self,
        recommendations: &[HedgeRecommendation],
        portfolio: &Portfolio,
        market_data: &HashMap<String, MarketData>,
    ) -> Vec<StrategyRanking> {
        let portfolio_value = portfolio.total_market_value();
        let portfolio_delta = portfolio.total_delta().abs().max(MIN_DELTA_NORMALIZER);

        let mut rankings: Vec<StrategyRanking> = recommendations
            .iter()
            .map(|rec| {
                let proxy;
                let data = match market_data.get(&rec.symbol) {
                    Some(data) => data,
                    None => {
                        proxy = MarketData::new(rec.symbol.as_str(), rec.price.unwrap_or(PROXY_PRICE));
                        &proxy
                    }
                };

                let cost = match self.strategies.get(&rec.strategy) {
                    Some(strategy) => strategy.estimate_execution_cost(rec, data),
                    None => StrategyVariant::with_defaults(rec.strategy)
                        .estimate_execution_cost(rec, data),
                };

                let effectiveness = effectiveness_score(rec, portfolio_delta);
                let cost_score = if portfolio_value != 0.0 {
                    (1.0 - cost.total_cost / portfolio_value.abs() * COST_SCORE_DECAY).max(0.0)
                } else {
                    0.0
                };

                StrategyRanking::new(
                    rec.clone(),
                    cost,
                    effectiveness,
                    rec.urgency.score(),
                    cost_score,
                )
            })
            .collect();

        rankings.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        rankings
    }

    /// Greedy budget-constrained selection over the ranked recommendations
    ///
    /// `max_cost` defaults to 2% of |portfolio value|.
    pub fn select_optimal_hedges(
        &self,
        recommendations: &[HedgeRecommendation],
        portfolio: &Portfolio,
        market_data: &HashMap<String, MarketData>,
        max_cost: Option<f64>,
    ) -> Vec<HedgeRecommendation> {
        let rankings = self.rank_recommendations(recommendations, portfolio, market_data);
        select_from_rankings(&rankings, budget_for(portfolio, max_cost))
    }

    /// Record the outcome of acting on a recommendation
    pub fn update_strategy_performance(
        &mut self,
        kind: StrategyKind,
        executed: bool,
        cost: f64,
        risk_reduction: f64,
        execution_time: Duration,
    ) -> StrategyResult<()> {
        let performance = self
            .performance
            .get_mut(&kind)
            .ok_or_else(|| StrategyError::StrategyNotFound(kind.to_string()))?;
        performance.record_outcome(executed, cost, risk_reduction, execution_time.as_secs_f64());
        Ok(())
    }

    pub fn get_strategy_performance_report(&self) -> &IndexMap<StrategyKind, StrategyPerformance> {
        &self.performance
    }

    /// One full pass: refresh prices and Greeks, check breaches, analyse, rank, select
    pub fn run_hedge_cycle(
        &mut self,
        portfolio: &mut Portfolio,
        market_data: &HashMap<String, MarketData>,
        calculator: &RiskCalculator,
        max_cost: Option<f64>,
    ) -> HedgeCycleReport {
        let updated = portfolio.apply_market_data(market_data);
        let greeks_failures = calculator.refresh_portfolio_greeks(portfolio);
        let breaches = self.thresholds.check_breach(portfolio);

        let recommendations = if breaches.any() {
            self.run_strategies(portfolio, market_data)
        } else {
            Vec::new()
        };

        let rankings = self.rank_recommendations(&recommendations, portfolio, market_data);
        let selected = select_from_rankings(&rankings, budget_for(portfolio, max_cost));

        tracing::info!(
            updated,
            breached = ?breaches.breached(),
            recommendations = recommendations.len(),
            selected = selected.len(),
            greeks_failures = greeks_failures.len(),
            "Hedge cycle complete"
        );

        HedgeCycleReport {
            breaches,
            recommendations,
            rankings,
            selected,
            greeks_failures,
        }
    }
}

impl Default for StrategyManager {
    fn default() -> Self {
        Self::new(RiskThresholds::default())
    }
}

fn budget_for(portfolio: &Portfolio, max_cost: Option<f64>) -> f64 {
    max_cost.unwrap_or_else(|| portfolio.total_market_value().abs() * DEFAULT_BUDGET_FRACTION)
}

fn select_from_rankings(rankings: &[StrategyRanking], budget: f64) -> Vec<HedgeRecommendation> {
    let mut selected = Vec::new();
    let mut total_cost = 0.0;
    let mut covered: HashSet<RiskType> = HashSet::new();

    for ranking in rankings {
        let cost = ranking.cost.total_cost;
        if total_cost + cost > budget {
            continue;
        }

        let risk_type = RiskType::from_reasoning(&ranking.recommendation.reasoning);
        if !covered.contains(&risk_type) || ranking.total_score > HIGH_QUALITY_SCORE {
            selected.push(ranking.recommendation.clone());
            total_cost += cost;
            covered.insert(risk_type);
        }
    }

    tracing::debug!(
        selected = selected.len(),
        total_cost,
        budget,
        "Selected hedges"
    );
    selected
}

/// Average of normalized delta reduction and doubled VaR reduction, in [0, 1]
fn effectiveness_score(rec: &HedgeRecommendation, portfolio_delta: f64) -> f64 {
    if rec.risk_reduction.is_empty() {
        return 0.5;
    }

    let delta_score = (rec.reduction(reduction_keys::DELTA_REDUCTION) / portfolio_delta).min(1.0);
    let var_score = rec.reduction(reduction_keys::VAR_REDUCTION) * 2.0;
    ((delta_score + var_score) / 2.0).clamp(0.0, 1.0)
}

/// One quote per position symbol at its current price
fn synthesize_market_data(portfolio: &Portfolio) -> HashMap<String, MarketData> {
    let mut market_data = HashMap::new();
    for position in &portfolio.positions {
        market_data
            .entry(position.symbol.clone())
            .or_insert_with(|| MarketData::new(position.symbol.as_str(), position.current_price));
    }
    market_data
}

fn fallback_recommendation(portfolio: &Portfolio) -> Option<HedgeRecommendation> {
    let position = portfolio.positions.first()?;

    let action = if position.size > 0.0 {
        HedgeAction::Sell
    } else {
        HedgeAction::Buy
    };
    let risk_reduction = HashMap::from([
        (reduction_keys::DELTA_REDUCTION.to_string(), 0.5),
        (reduction_keys::VAR_REDUCTION.to_string(), 0.2),
    ]);

    let mut rec = HedgeRecommendation::new(
        position.symbol.as_str(),
        action,
        position.size.abs() * FALLBACK_HEDGE_FRACTION,
        PositionKind::Spot,
        StrategyKind::DeltaNeutral,
    )
    .with_price(position.current_price)
    .with_reasoning("Basic delta-neutral hedge recommendation")
    .with_urgency(Urgency::Medium)
    .with_estimated_cost((position.size * position.current_price).abs() * FALLBACK_COST_RATE)
    .with_risk_reduction(risk_reduction);
    rec.fallback = true;

    Some(rec)
}
