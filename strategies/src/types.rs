//! Core types for hedge recommendations and their ranking

use chrono::{DateTime, Utc};
use hedge_risk::PositionKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifies a hedging strategy variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    DeltaNeutral,
    ProtectivePut,
    Collar,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::DeltaNeutral,
        StrategyKind::ProtectivePut,
        StrategyKind::Collar,
    ];

    /// Stable identifier, also used as the reasoning tag
    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::DeltaNeutral => "delta_neutral",
            StrategyKind::ProtectivePut => "protective_put",
            StrategyKind::Collar => "collar",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Reasoning prefix, e.g. `[collar]`
    pub fn tag(&self) -> String {
        format!("[{}]", self.id())
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Hedge order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HedgeAction {
    Buy,
    Sell,
    /// Buy a put and sell a call against the same position
    Collar,
}

impl fmt::Display for HedgeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HedgeAction::Buy => write!(f, "BUY"),
            HedgeAction::Sell => write!(f, "SELL"),
            HedgeAction::Collar => write!(f, "COLLAR"),
        }
    }
}

/// How soon a hedge should be executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Map a breach severity (exposure / threshold) to an urgency level
    pub fn from_severity(severity: f64) -> Self {
        if severity > 3.0 {
            Urgency::Critical
        } else if severity > 2.0 {
            Urgency::High
        } else if severity > 1.5 {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }

    /// Normalized score used in ranking
    pub fn score(&self) -> f64 {
        match self {
            Urgency::Low => 0.25,
            Urgency::Medium => 0.5,
            Urgency::High => 0.75,
            Urgency::Critical => 1.0,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Low => write!(f, "LOW"),
            Urgency::Medium => write!(f, "MEDIUM"),
            Urgency::High => write!(f, "HIGH"),
            Urgency::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Risk-reduction map keys
pub mod reduction_keys {
    pub const DELTA_REDUCTION: &str = "delta_reduction";
    pub const GAMMA_REDUCTION: &str = "gamma_reduction";
    pub const VAR_REDUCTION: &str = "var_reduction";
    pub const DOWNSIDE_PROTECTION: &str = "downside_protection";
    pub const MAX_LOSS_REDUCTION: &str = "max_loss_reduction";
    pub const UPSIDE_CAP: &str = "upside_cap";
    pub const NET_COST: &str = "net_cost";
    pub const COST_RATIO: &str = "cost_ratio";
}

/// A single hedge proposal produced by a strategy
///
/// `size` is always a non-negative quantity; direction lives in `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeRecommendation {
    /// Instrument to trade (hedge instrument or synthetic option symbol)
    pub symbol: String,

    pub action: HedgeAction,

    pub size: f64,

    pub instrument: PositionKind,

    /// Originating strategy
    pub strategy: StrategyKind,

    /// Reference price (underlying price or option premium)
    pub price: Option<f64>,

    pub reasoning: String,

    pub urgency: Urgency,

    /// Cost known at creation time (premium, estimated fees)
    pub estimated_cost: f64,

    /// Expected risk reduction keyed by [`reduction_keys`]
    pub risk_reduction: HashMap<String, f64>,

    /// Synthesized by the manager's fallback mode rather than a strategy
    #[serde(default)]
    pub fallback: bool,

    pub timestamp: DateTime<Utc>,
}

impl HedgeRecommendation {
    pub fn new(
        symbol: impl Into<String>,
        action: HedgeAction,
        size: f64,
        instrument: PositionKind,
        strategy: StrategyKind,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            size,
            instrument,
            strategy,
            price: None,
            reasoning: String::new(),
            urgency: Urgency::Low,
            estimated_cost: 0.0,
            risk_reduction: HashMap::new(),
            fallback: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_estimated_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = cost;
        self
    }

    pub fn with_risk_reduction(mut self, risk_reduction: HashMap<String, f64>) -> Self {
        self.risk_reduction = risk_reduction;
        self
    }

    pub fn reduction(&self, key: &str) -> f64 {
        self.risk_reduction.get(key).copied().unwrap_or(0.0)
    }

    /// Prefix the reasoning with the strategy tag, once
    pub fn tag_reasoning(&mut self) {
        let tag = self.strategy.tag();
        if !self.reasoning.starts_with(&tag) {
            self.reasoning = format!("{} {}", tag, self.reasoning);
        }
    }
}

/// Breakdown of a recommendation's expected execution cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCost {
    pub strategy: StrategyKind,

    /// Carried over from the recommendation
    pub estimated_cost: f64,

    pub bid_ask_spread_cost: f64,

    pub slippage_cost: f64,

    pub commission_cost: f64,

    pub market_impact_cost: f64,

    /// Sum of all components
    pub total_cost: f64,

    /// total_cost / notional (0 for zero notional)
    pub cost_percentage: f64,
}

impl ExecutionCost {
    pub fn new(
        strategy: StrategyKind,
        estimated_cost: f64,
        bid_ask_spread_cost: f64,
        slippage_cost: f64,
        commission_cost: f64,
        market_impact_cost: f64,
        notional: f64,
    ) -> Self {
        let total_cost =
            estimated_cost + bid_ask_spread_cost + slippage_cost + commission_cost + market_impact_cost;
        let cost_percentage = if notional > 0.0 {
            total_cost / notional
        } else {
            0.0
        };

        Self {
            strategy,
            estimated_cost,
            bid_ask_spread_cost,
            slippage_cost,
            commission_cost,
            market_impact_cost,
            total_cost,
            cost_percentage,
        }
    }
}

/// Scoring weights for ranking
pub const EFFECTIVENESS_WEIGHT: f64 = 0.4;
pub const URGENCY_WEIGHT: f64 = 0.3;
pub const COST_WEIGHT: f64 = 0.3;

/// A recommendation with its cost and scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRanking {
    pub strategy: StrategyKind,
    pub recommendation: HedgeRecommendation,
    pub cost: ExecutionCost,
    pub effectiveness_score: f64,
    pub urgency_score: f64,
    pub cost_score: f64,
    pub total_score: f64,
}

impl StrategyRanking {
    pub fn new(
        recommendation: HedgeRecommendation,
        cost: ExecutionCost,
        effectiveness_score: f64,
        urgency_score: f64,
        cost_score: f64,
    ) -> Self {
        let total_score = effectiveness_score * EFFECTIVENESS_WEIGHT
            + urgency_score * URGENCY_WEIGHT
            + cost_score * COST_WEIGHT;

        Self {
            strategy: recommendation.strategy,
            recommendation,
            cost,
            effectiveness_score,
            urgency_score,
            cost_score,
            total_score,
        }
    }
}

/// Primary risk a hedge addresses, used to avoid redundant selections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    Delta,
    Downside,
    Volatility,
    General,
}

impl RiskType {
    /// Classify by keywords in the reasoning text
    pub fn from_reasoning(reasoning: &str) -> Self {
        let text = reasoning.to_lowercase();
        if text.contains("delta") {
            RiskType::Delta
        } else if text.contains("protective") {
            RiskType::Downside
        } else if text.contains("collar") {
            RiskType::Volatility
        } else {
            RiskType::General
        }
    }
}
