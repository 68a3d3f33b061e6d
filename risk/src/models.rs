//! Position, portfolio and market data structures
//!
//! Greek fields stored on a [`Position`] are **total exposure**: the per-unit
//! sensitivity multiplied by the signed position size. Portfolio aggregates are
//! plain sums of these fields and must never be scaled by size again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Instrument kind of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionKind {
    Spot,
    Futures,
    Perpetual,
    Call,
    Put,
}

impl PositionKind {
    /// Whether this kind is an option contract
    pub fn is_option(&self) -> bool {
        matches!(self, PositionKind::Call | PositionKind::Put)
    }
}

impl fmt::Display for PositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PositionKind::Spot => "spot",
            PositionKind::Futures => "futures",
            PositionKind::Perpetual => "perpetual",
            PositionKind::Call => "call",
            PositionKind::Put => "put",
        };
        write!(f, "{}", name)
    }
}

/// Option sensitivities
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Greeks {
    /// Delta: ∂V/∂S
    pub delta: f64,

    /// Gamma: ∂²V/∂S²
    pub gamma: f64,

    /// Theta: ∂V/∂t (per calendar day)
    pub theta: f64,

    /// Vega: ∂V/∂σ (per 1 vol point)
    pub vega: f64,

    /// Rho: ∂V/∂r (per 1% rate move)
    pub rho: f64,
}

impl Greeks {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Multiply every sensitivity by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            theta: self.theta * factor,
            vega: self.vega * factor,
            rho: self.rho * factor,
        }
    }
}

/// A single holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument symbol (e.g. "AAPL", "BTC-USD")
    pub symbol: String,

    pub kind: PositionKind,

    /// Signed size (positive = long, negative = short)
    pub size: f64,

    pub entry_price: f64,

    pub current_price: f64,

    /// Option strike (options only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike: Option<f64>,

    /// Option expiry (options only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,

    /// Implied volatility (options only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_volatility: Option<f64>,

    /// Size-scaled Greeks, set by the risk calculator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeks: Option<Greeks>,

    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Create a non-option position
    pub fn new(
        symbol: impl Into<String>,
        kind: PositionKind,
        size: f64,
        entry_price: f64,
        current_price: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            size,
            entry_price,
            current_price,
            strike: None,
            expiry: None,
            implied_volatility: None,
            greeks: None,
            timestamp: Utc::now(),
        }
    }

    /// Shorthand for a spot position
    pub fn spot(symbol: impl Into<String>, size: f64, entry_price: f64, current_price: f64) -> Self {
        Self::new(symbol, PositionKind::Spot, size, entry_price, current_price)
    }

    /// Create an option position
    #[allow(clippy::too_many_arguments)]
    pub fn option(
        symbol: impl Into<String>,
        kind: PositionKind,
        size: f64,
        entry_price: f64,
        current_price: f64,
        strike: f64,
        expiry: DateTime<Utc>,
        implied_volatility: Option<f64>,
    ) -> Self {
        Self {
            strike: Some(strike),
            expiry: Some(expiry),
            implied_volatility,
            ..Self::new(symbol, kind, size, entry_price, current_price)
        }
    }

    /// Attach precomputed exposure Greeks
    pub fn with_greeks(mut self, greeks: Greeks) -> Self {
        self.greeks = Some(greeks);
        self
    }

    /// size × current price
    pub fn market_value(&self) -> f64 {
        self.size * self.current_price
    }

    /// size × (current − entry)
    pub fn unrealized_pnl(&self) -> f64 {
        self.size * (self.current_price - self.entry_price)
    }

    pub fn is_option(&self) -> bool {
        self.kind.is_option()
    }

    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    /// Delta exposure, zero until computed
    pub fn delta(&self) -> f64 {
        self.greeks.map(|g| g.delta).unwrap_or(0.0)
    }
}

/// Ordered collection of positions plus cash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub positions: Vec<Position>,

    pub cash: f64,

    /// Last mutation time
    pub timestamp: DateTime<Utc>,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::new()
    }
}

impl Portfolio {
    pub fn new() -> Self {
        Self::with_cash(0.0)
    }

    pub fn with_cash(cash: f64) -> Self {
        Self {
            positions: Vec::new(),
            cash,
            timestamp: Utc::now(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.push(position);
        self.timestamp = Utc::now();
    }

    /// Remove the first position equal to `position`
    pub fn remove_position(&mut self, position: &Position) -> bool {
        match self.positions.iter().position(|p| p == position) {
            Some(index) => {
                self.positions.remove(index);
                self.timestamp = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn positions_by_symbol(&self, symbol: &str) -> Vec<&Position> {
        self.positions.iter().filter(|p| p.symbol == symbol).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Σ position market values + cash, recomputed on every call
    pub fn total_market_value(&self) -> f64 {
        self.positions.iter().map(Position::market_value).sum::<f64>() + self.cash
    }

    pub fn total_pnl(&self) -> f64 {
        self.positions.iter().map(Position::unrealized_pnl).sum()
    }

    /// Sum of size-scaled Greeks across all positions
    pub fn total_greeks(&self) -> Greeks {
        self.positions
            .iter()
            .filter_map(|p| p.greeks)
            .fold(Greeks::zero(), |acc, g| Greeks {
                delta: acc.delta + g.delta,
                gamma: acc.gamma + g.gamma,
                theta: acc.theta + g.theta,
                vega: acc.vega + g.vega,
                rho: acc.rho + g.rho,
            })
    }

    pub fn total_delta(&self) -> f64 {
        self.total_greeks().delta
    }

    pub fn total_gamma(&self) -> f64 {
        self.total_greeks().gamma
    }

    pub fn total_theta(&self) -> f64 {
        self.total_greeks().theta
    }

    pub fn total_vega(&self) -> f64 {
        self.total_greeks().vega
    }

    pub fn total_rho(&self) -> f64 {
        self.total_greeks().rho
    }

    /// Update current prices from a symbol-keyed snapshot; returns the number of positions touched
    pub fn apply_market_data(&mut self, market_data: &HashMap<String, MarketData>) -> usize {
        let mut updated = 0;
        for position in &mut self.positions {
            if let Some(data) = market_data.get(&position.symbol) {
                position.current_price = data.price;
                position.timestamp = data.timestamp;
                updated += 1;
            }
        }
        if updated > 0 {
            self.timestamp = Utc::now();
        }
        updated
    }
}

/// Market snapshot for a single symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,

    /// Last traded price
    pub price: f64,

    #[serde(default)]
    pub bid: Option<f64>,

    #[serde(default)]
    pub ask: Option<f64>,

    #[serde(default)]
    pub volume: Option<f64>,

    #[serde(default)]
    pub implied_volatility: Option<f64>,

    #[serde(default)]
    pub historical_volatility: Option<f64>,

    pub timestamp: DateTime<Utc>,
}

impl MarketData {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            bid: None,
            ask: None,
            volume: None,
            implied_volatility: None,
            historical_volatility: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    pub fn with_implied_volatility(mut self, volatility: f64) -> Self {
        self.implied_volatility = Some(volatility);
        self
    }

    /// ask − bid when both sides are quoted
    pub fn bid_ask_spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Quote midpoint, falling back to the last price
    pub fn mid_price(&self) -> f64 {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => (bid + ask) / 2.0,
            _ => self.price,
        }
    }
}

/// Portfolio-level risk summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRiskMetrics {
    pub total_value: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
    pub unrealized_pnl: f64,

    /// Value at Risk (loss magnitude), zero when not computed
    pub var: f64,

    pub timestamp: DateTime<Utc>,
}

impl PortfolioRiskMetrics {
    /// P&L as a percentage of the cost basis
    pub fn pnl_percentage(&self) -> f64 {
        let basis = self.total_value - self.unrealized_pnl;
        if basis == 0.0 {
            return 0.0;
        }
        self.unrealized_pnl / basis * 100.0
    }
}
