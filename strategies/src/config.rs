//! Hedge strategy and engine configuration
//!
//! Everything here is plain serde data with defaults, loadable from YAML or JSON.

use crate::error::{StrategyError, StrategyResult};
use crate::types::StrategyKind;
use hedge_risk::pricing::DAYS_PER_YEAR;
use hedge_risk::{RiskCalculatorConfig, RiskThresholds};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How option premiums are estimated by the option-based strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumModel {
    /// `intrinsic + spot·σ·√T·0.4`; no pricer call
    #[default]
    Approximation,

    /// Full Black-Scholes price at the assumed (or market implied) volatility
    BlackScholes,
}

/// Per-strategy tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgeConfig {
    pub enabled: bool,

    /// |delta| at which delta hedging triggers
    pub delta_threshold: f64,

    /// Per-underlying |net delta| hedged once the portfolio has triggered
    pub rebalance_threshold: f64,

    /// Fraction of the delta gap to hedge
    pub hedge_ratio: f64,

    /// Hedges smaller than this are skipped
    pub min_hedge_size: f64,

    /// Protective put strike offset from spot (negative = OTM)
    pub protective_put_offset: f64,

    /// Collar put strike offset from spot (negative = OTM)
    pub collar_put_offset: f64,

    /// Collar call strike offset from spot (positive = OTM)
    pub collar_call_offset: f64,

    /// Cost cap as a fraction of the hedged position's value
    pub max_hedge_cost: f64,

    /// Slippage assumed in execution cost estimates, as a fraction of notional
    pub max_slippage: f64,

    /// Smallest position value worth hedging
    pub min_position_value: f64,

    /// Option tenor used for premium estimates
    pub hedge_tenor_days: u32,

    pub min_time_to_expiry_days: u32,

    pub max_time_to_expiry_days: u32,

    pub premium_model: PremiumModel,

    /// Volatility used for premium estimates without market implied volatility
    pub assumed_volatility: f64,

    /// Rate used by the Black-Scholes premium model
    pub risk_free_rate: f64,

    pub confidence_level: f64,
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delta_threshold: 0.1,
            rebalance_threshold: 0.05,
            hedge_ratio: 1.0,
            min_hedge_size: 1.0,
            protective_put_offset: -0.20,
            collar_put_offset: -0.02,
            collar_call_offset: 0.03,
            max_hedge_cost: 0.02,
            max_slippage: 0.001,
            min_position_value: 0.0,
            hedge_tenor_days: 30,
            min_time_to_expiry_days: 7,
            max_time_to_expiry_days: 60,
            premium_model: PremiumModel::Approximation,
            assumed_volatility: 0.25,
            risk_free_rate: 0.05,
            confidence_level: 0.95,
        }
    }
}

impl HedgeConfig {
    /// Delta-neutral defaults: 0.5% cost cap
    pub fn delta_neutral() -> Self {
        Self {
            max_hedge_cost: 0.005,
            ..Default::default()
        }
    }

    /// Protective put defaults: 2% cost cap, $10,000 minimum position
    pub fn protective_put() -> Self {
        Self {
            max_hedge_cost: 0.02,
            min_position_value: 10_000.0,
            ..Default::default()
        }
    }

    /// Collar defaults: 1.5% net cost cap, $25,000 minimum position, 14-day minimum tenor
    pub fn collar() -> Self {
        Self {
            max_hedge_cost: 0.015,
            min_position_value: 25_000.0,
            min_time_to_expiry_days: 14,
            ..Default::default()
        }
    }

    pub fn for_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::DeltaNeutral => Self::delta_neutral(),
            StrategyKind::ProtectivePut => Self::protective_put(),
            StrategyKind::Collar => Self::collar(),
        }
    }

    /// Option tenor in years, on the pricer's day count
    pub fn tenor_years(&self) -> f64 {
        self.hedge_tenor_days as f64 / DAYS_PER_YEAR
    }

    pub fn validate(&self) -> StrategyResult<()> {
        fn non_negative(name: &str, value: f64) -> StrategyResult<()> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(StrategyError::Configuration(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )))
            }
        }
        fn positive(name: &str, value: f64) -> StrategyResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(StrategyError::Configuration(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        }

        non_negative("delta_threshold", self.delta_threshold)?;
        non_negative("rebalance_threshold", self.rebalance_threshold)?;
        positive("hedge_ratio", self.hedge_ratio)?;
        non_negative("min_hedge_size", self.min_hedge_size)?;
        positive("max_hedge_cost", self.max_hedge_cost)?;
        non_negative("max_slippage", self.max_slippage)?;
        non_negative("min_position_value", self.min_position_value)?;
        positive("assumed_volatility", self.assumed_volatility)?;

        if self.rebalance_threshold > self.delta_threshold {
            return Err(StrategyError::Configuration(format!(
                "rebalance_threshold ({}) must not exceed delta_threshold ({})",
                self.rebalance_threshold, self.delta_threshold
            )));
        }

        for (name, offset) in [
            ("protective_put_offset", self.protective_put_offset),
            ("collar_put_offset", self.collar_put_offset),
        ] {
            if !(offset > -1.0 && offset <= 0.0) {
                return Err(StrategyError::Configuration(format!(
                    "{} must be in (-1, 0], got {}",
                    name, offset
                )));
            }
        }
        non_negative("collar_call_offset", self.collar_call_offset)?;

        if self.max_slippage >= 1.0 {
            return Err(StrategyError::Configuration(format!(
                "max_slippage must be below 1, got {}",
                self.max_slippage
            )));
        }

        if self.min_time_to_expiry_days > self.max_time_to_expiry_days {
            return Err(StrategyError::Configuration(format!(
                "min_time_to_expiry_days ({}) exceeds max_time_to_expiry_days ({})",
                self.min_time_to_expiry_days, self.max_time_to_expiry_days
            )));
        }
        if self.hedge_tenor_days == 0
            || self.hedge_tenor_days < self.min_time_to_expiry_days
            || self.hedge_tenor_days > self.max_time_to_expiry_days
        {
            return Err(StrategyError::Configuration(format!(
                "hedge_tenor_days ({}) must be positive and within [{}, {}]",
                self.hedge_tenor_days, self.min_time_to_expiry_days, self.max_time_to_expiry_days
            )));
        }

        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(StrategyError::Configuration(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }

        Ok(())
    }
}

/// Underlying → hedge instrument table
///
/// Unmapped symbols hedge with `"{symbol}-PERP"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HedgeInstrumentMap {
    mapping: IndexMap<String, String>,
}

impl Default for HedgeInstrumentMap {
    fn default() -> Self {
        let mapping = [
            ("AAPL", "QQQ"),
            ("GOOGL", "QQQ"),
            ("MSFT", "QQQ"),
            ("TSLA", "QQQ"),
            ("SPY", "ES=F"),
            ("QQQ", "NQ=F"),
            ("BTC-USD", "BTC/USDT"),
            ("ETH-USD", "ETH/USDT"),
        ]
        .into_iter()
        .map(|(underlying, instrument)| (underlying.to_string(), instrument.to_string()))
        .collect();

        Self { mapping }
    }
}

impl HedgeInstrumentMap {
    pub fn empty() -> Self {
        Self {
            mapping: IndexMap::new(),
        }
    }

    /// Instrument used to hedge `symbol`
    pub fn resolve(&self, symbol: &str) -> String {
        self.mapping
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| format!("{}-PERP", symbol))
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.mapping.get(symbol).map(String::as_str)
    }

    /// Add or replace a mapping, returning the previous instrument
    pub fn insert(
        &mut self,
        underlying: impl Into<String>,
        instrument: impl Into<String>,
    ) -> Option<String> {
        self.mapping.insert(underlying.into(), instrument.into())
    }

    pub fn remove(&mut self, underlying: &str) -> Option<String> {
        self.mapping.shift_remove(underlying)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Behaviour of `get_hedge_recommendations` when analysis yields nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Return the empty result as-is
    Disabled,

    /// Propose hedging half of the first position, flagged as a fallback
    #[default]
    DefaultDeltaHedge,
}

/// Complete engine configuration
///
/// # Example
///
/// ```
/// use hedge_strategies::{EngineConfig, FallbackMode, StrategyKind};
///
/// let yaml = r#"
/// fallback: disabled
/// thresholds:
///   max_delta: 50.0
/// strategies:
///   delta_neutral:
///     delta_threshold: 50.0
///     rebalance_threshold: 10.0
///     max_hedge_cost: 0.005
/// "#;
///
/// let config = EngineConfig::from_yaml(yaml).unwrap();
/// assert_eq!(config.fallback, FallbackMode::Disabled);
/// assert_eq!(config.strategies.len(), 1);
/// assert!(config.strategies.contains_key(&StrategyKind::DeltaNeutral));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: RiskThresholds,

    pub calculator: RiskCalculatorConfig,

    pub instruments: HedgeInstrumentMap,

    pub fallback: FallbackMode,

    /// Registered strategies in evaluation order
    pub strategies: IndexMap<StrategyKind, HedgeConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            calculator: RiskCalculatorConfig::default(),
            instruments: HedgeInstrumentMap::default(),
            fallback: FallbackMode::default(),
            strategies: StrategyKind::ALL
                .into_iter()
                .map(|kind| (kind, HedgeConfig::for_kind(kind)))
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> StrategyResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> StrategyResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> StrategyResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> StrategyResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> StrategyResult<()> {
        self.thresholds.validate()?;
        self.calculator.validate()?;
        for (kind, config) in &self.strategies {
            config.validate().map_err(|e| {
                StrategyError::Configuration(format!("strategy {}: {}", kind, e))
            })?;
        }
        Ok(())
    }
}
