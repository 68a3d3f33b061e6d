//! # hedge-risk: Option pricing and portfolio risk for the hedging engine
//!
//! This library provides the risk side of the hedging decision engine:
//! positions and portfolios, Black-Scholes pricing with Greeks, VaR and
//! correlation estimates, and threshold checks that decide when a
//! portfolio needs hedging.
//!
//! ## Core Components
//!
//! - **pricing**: Black-Scholes price, Greeks and implied volatility
//! - **RiskCalculator**: Size-scaled position Greeks, historical and bootstrap VaR, correlations
//! - **RiskThresholds**: YAML/JSON-loadable limits and breach detection
//!
//! ## Example Usage
//!
//! ```rust
//! use hedge_risk::{Portfolio, Position, RiskCalculator, RiskThresholds};
//!
//! let mut portfolio = Portfolio::new();
//! portfolio.add_position(Position::spot("AAPL", 1000.0, 150.0, 155.0));
//!
//! let calculator = RiskCalculator::default();
//! let failures = calculator.refresh_portfolio_greeks(&mut portfolio);
//! assert!(failures.is_empty());
//!
//! let thresholds = RiskThresholds::default();
//! let report = thresholds.check_breach(&portfolio);
//! assert!(report.delta); // |1.0| > 0.1
//! ```

mod calculator;
mod error;
mod models;
pub mod pricing;
mod thresholds;

pub use calculator::{CorrelationMatrix, GreeksFailure, RiskCalculator, RiskCalculatorConfig};
pub use error::{Result, RiskError};
pub use models::{Greeks, MarketData, Portfolio, PortfolioRiskMetrics, Position, PositionKind};
pub use pricing::{OptionInputs, OptionType};
pub use thresholds::{BreachReport, CorrelatedPair, RiskThresholds, VarBreach};
