//! Error types for the hedging strategies

use hedge_risk::RiskError;
use thiserror::Error;

/// Main error type for strategy operations
#[derive(Error, Debug)]
pub enum StrategyError {
    /// Pricing or risk calculation failed
    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    /// Out-of-range or missing hedge configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Strategy is not registered with the manager
    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for strategy operations
pub type StrategyResult<T> = Result<T, StrategyError>;
