//! Risk limits and breach detection
//!
//! Thresholds are plain configuration, typically loaded from YAML or JSON.
//! Every check is a pure function of the snapshot it is given.

use crate::calculator::CorrelationMatrix;
use crate::error::{Result, RiskError};
use crate::models::Portfolio;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Portfolio risk limits
///
/// Greek caps apply to the absolute aggregate exposure; size caps apply to
/// absolute market values. VaR caps are fractions of portfolio value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub max_delta: f64,
    pub max_gamma: f64,
    pub max_vega: f64,
    pub max_theta: f64,

    /// 95% VaR cap as a fraction of portfolio value
    pub max_var_95: f64,

    /// 99% VaR cap as a fraction of portfolio value
    pub max_var_99: f64,

    /// Cap on any single position's |market value|
    pub max_position_size: f64,

    /// Cap on |total market value|
    pub max_portfolio_size: f64,

    /// |ρ| above which a pair is reported as concentrated
    pub correlation_threshold: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            max_delta: 0.1,
            max_gamma: 0.05,
            max_vega: 0.1,
            max_theta: 0.05,
            max_var_95: 0.02,
            max_var_99: 0.05,
            max_position_size: 100_000.0,
            max_portfolio_size: 500_000.0,
            correlation_threshold: 0.8,
        }
    }
}

/// Result of [`RiskThresholds::check_breach`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachReport {
    pub delta: bool,
    pub gamma: bool,
    pub vega: bool,
    pub theta: bool,
    pub portfolio_size: bool,
    pub position_size: bool,
}

impl BreachReport {
    /// True if any limit is breached
    pub fn any(&self) -> bool {
        self.delta
            || self.gamma
            || self.vega
            || self.theta
            || self.portfolio_size
            || self.position_size
    }

    /// Names of breached limits
    pub fn breached(&self) -> Vec<&'static str> {
        self.as_map()
            .into_iter()
            .filter_map(|(name, hit)| hit.then_some(name))
            .collect()
    }

    pub fn as_map(&self) -> IndexMap<&'static str, bool> {
        IndexMap::from([
            ("delta", self.delta),
            ("gamma", self.gamma),
            ("vega", self.vega),
            ("theta", self.theta),
            ("portfolio_size", self.portfolio_size),
            ("position_size", self.position_size),
        ])
    }
}

/// Result of [`RiskThresholds::check_var`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarBreach {
    pub var_95: bool,
    pub var_99: bool,
}

impl VarBreach {
    pub fn any(&self) -> bool {
        self.var_95 || self.var_99
    }
}

/// Symbol pair whose correlation exceeds the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub first: String,
    pub second: String,
    pub correlation: f64,
}

impl RiskThresholds {
    /// Load thresholds from a YAML string
    ///
    /// # Example
    ///
    /// ```
    /// use hedge_risk::RiskThresholds;
    ///
    /// let yaml = r#"
    /// max_delta: 500.0
    /// max_position_size: 250000.0
    /// "#;
    ///
    /// let thresholds = RiskThresholds::from_yaml(yaml).unwrap();
    /// assert_eq!(thresholds.max_delta, 500.0);
    /// assert_eq!(thresholds.max_gamma, 0.05); // default
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let thresholds: Self = serde_yaml::from_str(yaml)?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Load thresholds from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let thresholds: Self = serde_json::from_str(json)?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        let caps = [
            ("max_delta", self.max_delta),
            ("max_gamma", self.max_gamma),
            ("max_vega", self.max_vega),
            ("max_theta", self.max_theta),
            ("max_var_95", self.max_var_95),
            ("max_var_99", self.max_var_99),
            ("max_position_size", self.max_position_size),
            ("max_portfolio_size", self.max_portfolio_size),
        ];
        for (name, value) in caps {
            if !(value.is_finite() && value > 0.0) {
                return Err(RiskError::Configuration(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )));
            }
        }

        if !(self.correlation_threshold > 0.0 && self.correlation_threshold <= 1.0) {
            return Err(RiskError::Configuration(format!(
                "correlation_threshold must be in (0, 1], got {}",
                self.correlation_threshold
            )));
        }

        Ok(())
    }

    /// Check aggregate Greeks and notional against the caps
    ///
    /// Reads the Greeks already stored on the positions; refresh them first.
    ///
    /// # Example
    ///
    /// ```
    /// use hedge_risk::{Greeks, Portfolio, Position, RiskThresholds};
    ///
    /// let mut portfolio = Portfolio::new();
    /// portfolio.add_position(
    ///     Position::spot("AAPL", 1000.0, 150.0, 155.0)
    ///         .with_greeks(Greeks { delta: 1.0, ..Greeks::zero() }),
    /// );
    ///
    /// let report = RiskThresholds::default().check_breach(&portfolio);
    /// assert!(report.delta);
    /// assert!(report.position_size); // 155,000 > 100,000
    /// ```
    pub fn check_breach(&self, portfolio: &Portfolio) -> BreachReport {
        let greeks = portfolio.total_greeks();

        BreachReport {
            delta: greeks.delta.abs() > self.max_delta,
            gamma: greeks.gamma.abs() > self.max_gamma,
            vega: greeks.vega.abs() > self.max_vega,
            theta: greeks.theta.abs() > self.max_theta,
            portfolio_size: portfolio.total_market_value().abs() > self.max_portfolio_size,
            position_size: portfolio
                .positions
                .iter()
                .any(|p| p.market_value().abs() > self.max_position_size),
        }
    }

    /// Pairs whose |ρ| exceeds `correlation_threshold` (upper triangle only)
    pub fn check_correlation(&self, correlations: &CorrelationMatrix) -> Vec<CorrelatedPair> {
        let n = correlations.symbols.len();
        let mut pairs = Vec::new();

        for i in 0..n {
            for j in (i + 1)..n {
                let rho = correlations.matrix[(i, j)];
                if rho.abs() > self.correlation_threshold {
                    pairs.push(CorrelatedPair {
                        first: correlations.symbols[i].clone(),
                        second: correlations.symbols[j].clone(),
                        correlation: rho,
                    });
                }
            }
        }

        pairs
    }

    /// Compare VaR figures against the fractional caps
    ///
    /// A non-positive portfolio value never breaches.
    pub fn check_var(&self, var_95: f64, var_99: f64, portfolio_value: f64) -> VarBreach {
        let value = portfolio_value.abs();
        if value == 0.0 {
            return VarBreach::default();
        }

        VarBreach {
            var_95: var_95 / value > self.max_var_95,
            var_99: var_99 / value > self.max_var_99,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Greeks, Position};
    use nalgebra::DMatrix;

    fn with_delta(symbol: &str, size: f64, price: f64, delta: f64) -> Position {
        Position::spot(symbol, size, price, price).with_greeks(Greeks {
            delta,
            ..Greeks::zero()
        })
    }

    #[test]
    fn test_defaults_are_valid() {
        let thresholds = RiskThresholds::default();
        assert!(thresholds.validate().is_ok());
        assert_eq!(thresholds.max_delta, 0.1);
        assert_eq!(thresholds.correlation_threshold, 0.8);
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
max_delta: 250.0
max_portfolio_size: 1000000.0
"#;
        let thresholds = RiskThresholds::from_yaml(yaml).unwrap();
        assert_eq!(thresholds.max_delta, 250.0);
        assert_eq!(thresholds.max_portfolio_size, 1_000_000.0);
        assert_eq!(thresholds.max_vega, 0.1);
    }

    #[test]
    fn test_json_rejects_bad_correlation() {
        let json = r#"{ "correlation_threshold": 1.5 }"#;
        let result = RiskThresholds::from_json(json);
        assert!(matches!(result, Err(RiskError::Configuration(_))));
    }

    #[test]
    fn test_negative_cap_rejected() {
        let result = RiskThresholds::from_yaml("max_gamma: -1.0");
        assert!(matches!(result, Err(RiskError::Configuration(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        let result = RiskThresholds::from_yaml("max_delta: [not, a, number]");
        assert!(matches!(result, Err(RiskError::Yaml(_))));
    }

    #[test]
    fn test_empty_portfolio_no_breach() {
        let report = RiskThresholds::default().check_breach(&Portfolio::new());
        assert!(!report.any());
        assert!(report.breached().is_empty());
        assert!(report.as_map().values().all(|hit| !hit));
    }

    #[test]
    fn test_delta_breach_uses_absolute_value() {
        let thresholds = RiskThresholds {
            max_delta: 5.0,
            ..Default::default()
        };

        let mut portfolio = Portfolio::new();
        portfolio.add_position(with_delta("A", 10.0, 10.0, -6.0));
        assert!(thresholds.check_breach(&portfolio).delta);

        portfolio.add_position(with_delta("B", 10.0, 10.0, 3.0));
        assert!(!thresholds.check_breach(&portfolio).delta);
    }

    #[test]
    fn test_size_breaches() {
        let thresholds = RiskThresholds::default();
        let mut portfolio = Portfolio::new();
        portfolio.add_position(Position::spot("A", -1_000.0, 120.0, 120.0));

        let report = thresholds.check_breach(&portfolio);
        assert!(report.position_size);
        assert!(!report.portfolio_size);
        assert_eq!(report.breached(), vec!["position_size"]);

        for _ in 0..5 {
            portfolio.add_position(Position::spot("B", 1_000.0, 99.0, 99.0));
        }
        // 495,000 − 120,000 < 500,000
        assert!(!thresholds.check_breach(&portfolio).portfolio_size);
        portfolio.add_position(Position::spot("C", 1_000.0, 99.0, 99.0));
        portfolio.add_position(Position::spot("C", 1_000.0, 99.0, 99.0));
        assert!(thresholds.check_breach(&portfolio).portfolio_size);
    }

    #[test]
    fn test_check_breach_is_pure() {
        let thresholds = RiskThresholds::default();
        let mut portfolio = Portfolio::new();
        portfolio.add_position(with_delta("AAPL", 1000.0, 155.0, 1.0));

        let first = thresholds.check_breach(&portfolio);
        let second = thresholds.check_breach(&portfolio);
        assert_eq!(first, second);
        assert_eq!(first.as_map(), second.as_map());
    }

    #[test]
    fn test_check_correlation() {
        let correlations = CorrelationMatrix {
            symbols: vec!["A".into(), "B".into(), "C".into()],
            matrix: DMatrix::from_row_slice(
                3,
                3,
                &[1.0, 0.95, 0.1, 0.95, 1.0, -0.85, 0.1, -0.85, 1.0],
            ),
        };

        let pairs = RiskThresholds::default().check_correlation(&correlations);
        assert_eq!(pairs.len(), 2);
        assert_eq!((pairs[0].first.as_str(), pairs[0].second.as_str()), ("A", "B"));
        assert_eq!((pairs[1].first.as_str(), pairs[1].second.as_str()), ("B", "C"));
        assert_eq!(pairs[1].correlation, -0.85);
    }

    #[test]
    fn test_check_var() {
        let thresholds = RiskThresholds::default();

        let ok = thresholds.check_var(1_000.0, 3_000.0, 100_000.0);
        assert!(!ok.any());

        let breach = thresholds.check_var(2_500.0, 4_000.0, 100_000.0);
        assert!(breach.var_95);
        assert!(!breach.var_99);

        assert!(!thresholds.check_var(10.0, 10.0, 0.0).any());
    }
}
