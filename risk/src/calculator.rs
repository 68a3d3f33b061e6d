//! Position and portfolio risk calculation
//!
//! Applies the Black-Scholes pricer to positions and estimates portfolio risk:
//! - Size-scaled Greeks per position (total exposure, not per-unit)
//! - Historical-simulation VaR over a return sample
//! - Pearson correlation matrix of log returns
//! - Bootstrap (Monte Carlo) portfolio VaR from historical prices

use crate::error::{Result, RiskError};
use crate::models::{Greeks, Portfolio, PortfolioRiskMetrics, Position};
use crate::pricing::{self, OptionInputs, OptionType};
use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Risk calculator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskCalculatorConfig {
    /// Annualised risk-free rate (default: 5%)
    pub risk_free_rate: f64,

    /// Volatility assumed for options without implied volatility (default: 20%)
    pub default_volatility: f64,

    /// Bootstrap draws per symbol for portfolio VaR (default: 10,000)
    pub var_simulations: usize,

    /// Price observations used for portfolio VaR (default: 252)
    pub lookback_days: usize,

    /// Random seed for reproducible portfolio VaR (None = random)
    pub random_seed: Option<u64>,
}

impl Default for RiskCalculatorConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            default_volatility: 0.20,
            var_simulations: 10_000,
            lookback_days: 252,
            random_seed: None,
        }
    }
}

impl RiskCalculatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(RiskError::Configuration(
                "risk_free_rate must be finite".to_string(),
            ));
        }
        if !(self.default_volatility.is_finite() && self.default_volatility > 0.0) {
            return Err(RiskError::Configuration(format!(
                "default_volatility must be positive, got {}",
                self.default_volatility
            )));
        }
        if self.var_simulations == 0 {
            return Err(RiskError::Configuration(
                "var_simulations must be positive".to_string(),
            ));
        }
        if self.lookback_days < 2 {
            return Err(RiskError::Configuration(format!(
                "lookback_days must be at least 2, got {}",
                self.lookback_days
            )));
        }
        Ok(())
    }
}

/// Correlation matrix with its row/column labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Symbols in row/column order (sorted)
    pub symbols: Vec<String>,

    pub matrix: DMatrix<f64>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Correlation between two symbols, if both are present
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        Some(self.matrix[(i, j)])
    }
}

/// A position whose Greeks could not be computed
#[derive(Debug)]
pub struct GreeksFailure {
    /// Index of the position in the portfolio
    pub index: usize,

    pub symbol: String,

    pub error: RiskError,
}

/// Risk calculation engine
pub struct RiskCalculator {
    config: RiskCalculatorConfig,
}

impl Default for RiskCalculator {
    fn default() -> Self {
        Self::new(RiskCalculatorConfig::default())
    }
}

impl RiskCalculator {
    pub fn new(config: RiskCalculatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskCalculatorConfig {
        &self.config
    }

    /// Compute and store size-scaled Greeks on `position`
    pub fn calculate_position_greeks(&self, position: &mut Position) -> Result<Greeks> {
        self.calculate_position_greeks_at(position, Utc::now())
    }

    /// Same as [`calculate_position_greeks`](Self::calculate_position_greeks) with an explicit valuation time
    pub fn calculate_position_greeks_at(
        &self,
        position: &mut Position,
        now: DateTime<Utc>,
    ) -> Result<Greeks> {
        let greeks = match OptionType::from_kind(position.kind) {
            None => {
                // Linear instruments: unit delta in the direction of the position
                let delta = if position.size > 0.0 {
                    1.0
                } else if position.size < 0.0 {
                    -1.0
                } else {
                    0.0
                };
                Greeks { delta, ..Greeks::zero() }
            }
            Some(option_type) => {
                let inputs = self.option_inputs(position, now)?;
                pricing::greeks(option_type, &inputs).scaled(position.size)
            }
        };

        position.greeks = Some(greeks);
        Ok(greeks)
    }

    fn option_inputs(&self, position: &Position, now: DateTime<Utc>) -> Result<OptionInputs> {
        let strike = position.strike.ok_or_else(|| {
            RiskError::InvalidPosition(format!("Option {} has no strike", position.symbol))
        })?;
        let expiry = position.expiry.ok_or_else(|| {
            RiskError::InvalidPosition(format!("Option {} has no expiry", position.symbol))
        })?;

        if !(strike.is_finite() && strike > 0.0) {
            return Err(RiskError::InvalidPosition(format!(
                "Option {} strike must be positive, got {}",
                position.symbol, strike
            )));
        }
        if !(position.current_price.is_finite() && position.current_price > 0.0) {
            return Err(RiskError::InvalidPosition(format!(
                "Option {} underlying price must be positive, got {}",
                position.symbol, position.current_price
            )));
        }

        let volatility = match position.implied_volatility {
            Some(v) if v.is_finite() && v > 0.0 => v,
            Some(v) => {
                return Err(RiskError::InvalidPosition(format!(
                    "Option {} implied volatility must be positive, got {}",
                    position.symbol, v
                )))
            }
            None => self.config.default_volatility,
        };

        Ok(OptionInputs::new(
            position.current_price,
            strike,
            pricing::time_to_expiry(expiry, now),
            self.config.risk_free_rate,
            volatility,
        ))
    }

    /// Recompute Greeks for every position
    ///
    /// Failing positions are logged, have their Greeks cleared and are
    /// returned; the remaining positions are still processed.
    pub fn refresh_portfolio_greeks(&self, portfolio: &mut Portfolio) -> Vec<GreeksFailure> {
        let now = Utc::now();
        let mut failures = Vec::new();

        for (index, position) in portfolio.positions.iter_mut().enumerate() {
            if let Err(error) = self.calculate_position_greeks_at(position, now) {
                tracing::warn!(
                    symbol = %position.symbol,
                    index,
                    error = %error,
                    "Skipping position in Greeks refresh"
                );
                position.greeks = None;
                failures.push(GreeksFailure {
                    index,
                    symbol: position.symbol.clone(),
                    error,
                });
            }
        }

        failures
    }

    /// Refresh Greeks and summarise portfolio risk
    pub fn calculate_portfolio_risk(
        &self,
        portfolio: &mut Portfolio,
        var: Option<f64>,
    ) -> PortfolioRiskMetrics {
        let failures = self.refresh_portfolio_greeks(portfolio);
        if !failures.is_empty() {
            tracing::warn!(failed = failures.len(), "Portfolio risk computed with partial Greeks");
        }

        // Position Greeks are already exposures; sum without re-scaling
        let totals = portfolio.total_greeks();

        PortfolioRiskMetrics {
            total_value: portfolio.total_market_value(),
            delta: totals.delta,
            gamma: totals.gamma,
            theta: totals.theta,
            vega: totals.vega,
            rho: totals.rho,
            unrealized_pnl: portfolio.total_pnl(),
            var: var.unwrap_or(0.0),
            timestamp: Utc::now(),
        }
    }

    /// Historical-simulation VaR
    ///
    /// Sorts the sample ascending and returns the negated `(1 − confidence)`
    /// quantile as a loss magnitude. Zero for an empty sample or when the
    /// quantile index falls outside the sample, which includes any
    /// confidence level outside `[0, 1]`.
    pub fn calculate_var(&self, returns: &[f64], confidence_level: f64) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        if !(0.0..=1.0).contains(&confidence_level) {
            tracing::warn!(confidence_level, "VaR confidence level outside [0, 1]");
            return 0.0;
        }

        let mut sorted = returns.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let index = ((1.0 - confidence_level) * sorted.len() as f64).floor() as usize;
        match sorted.get(index) {
            Some(value) => -value,
            None => 0.0,
        }
    }

    /// Pearson correlation of log returns
    ///
    /// Series shorter than two prices, or with non-positive prices, are
    /// dropped. The remaining series are truncated to their most recent
    /// common length.
    pub fn calculate_correlation_matrix(
        &self,
        price_series: &HashMap<String, Vec<f64>>,
    ) -> CorrelationMatrix {
        let mut symbols: Vec<&String> = price_series.keys().collect();
        symbols.sort();

        let mut labels = Vec::new();
        let mut returns = Vec::new();
        for symbol in symbols {
            let prices = &price_series[symbol];
            if prices.len() < 2 {
                continue;
            }
            if !all_positive(prices) {
                tracing::warn!(symbol = %symbol, "Dropping price series with non-positive prices");
                continue;
            }
            labels.push(symbol.clone());
            returns.push(log_returns(prices));
        }

        let n = labels.len();
        if n == 0 {
            return CorrelationMatrix {
                symbols: labels,
                matrix: DMatrix::zeros(0, 0),
            };
        }

        let common = returns.iter().map(Vec::len).min().unwrap_or(0);
        let tails: Vec<&[f64]> = returns.iter().map(|r| &r[r.len() - common..]).collect();

        let mut matrix = DMatrix::identity(n, n);
        for i in 0..n {
            for j in (i + 1)..n {
                let rho = pearson(tails[i], tails[j]);
                matrix[(i, j)] = rho;
                matrix[(j, i)] = rho;
            }
        }

        CorrelationMatrix {
            symbols: labels,
            matrix,
        }
    }

    /// Bootstrap portfolio VaR
    ///
    /// For each symbol held, resamples its historical log returns
    /// `var_simulations` times, scales them by the symbol's aggregate
    /// notional, pools the draws across symbols and applies
    /// [`calculate_var`](Self::calculate_var). A symbol whose lookback window
    /// holds a non-positive or non-finite price is left out.
    pub fn calculate_portfolio_var(
        &self,
        positions: &[Position],
        price_history: &HashMap<String, Vec<f64>>,
        confidence_level: f64,
    ) -> f64 {
        let mut rng = match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut seen = HashSet::new();
        let mut pooled = Vec::new();

        for symbol in positions.iter().map(|p| p.symbol.as_str()) {
            if !seen.insert(symbol) {
                continue;
            }
            let Some(history) = price_history.get(symbol) else {
                continue;
            };

            let start = history.len().saturating_sub(self.config.lookback_days);
            let prices = &history[start..];
            if prices.len() < 2 {
                continue;
            }
            if !all_positive(prices) {
                tracing::warn!(symbol, "Skipping VaR history with non-positive prices");
                continue;
            }

            let returns = log_returns(prices);
            let exposure: f64 = positions
                .iter()
                .filter(|p| p.symbol == symbol)
                .map(Position::market_value)
                .sum();

            let picker = Uniform::new(0, returns.len());
            pooled.extend(
                (0..self.config.var_simulations)
                    .map(|_| exposure * returns[picker.sample(&mut rng)]),
            );
        }

        self.calculate_var(&pooled, confidence_level)
    }
}

fn all_positive(prices: &[f64]) -> bool {
    prices.iter().all(|p| p.is_finite() && *p > 0.0)
}

fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}
