//! Error types for risk calculations

use thiserror::Error;

/// Errors that can occur while pricing positions or evaluating risk
#[derive(Error, Debug)]
pub enum RiskError {
    /// Out-of-range or missing threshold / calculator configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Position cannot be priced (missing strike/expiry, non-positive inputs)
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Root finder could not bracket or converge
    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RiskError>;
