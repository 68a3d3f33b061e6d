//! Strategy performance tracking and metrics for monitoring

use crate::types::StrategyKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metric type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    /// Counter metric (monotonically increasing)
    Counter,
    /// Gauge metric (can go up or down)
    Gauge,
}

/// Strategy metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyMetric {
    pub timestamp: DateTime<Utc>,

    pub strategy: StrategyKind,

    pub metric_type: MetricType,

    /// Metric name (e.g., "hedge.total_cost_usd")
    pub metric_name: String,

    pub value: f64,

    /// Additional labels for dimensions
    pub labels: HashMap<String, String>,
}

impl StrategyMetric {
    /// Create a new counter metric
    pub fn counter(strategy: StrategyKind, name: &str, value: f64) -> Self {
        Self::build(strategy, MetricType::Counter, name, value)
    }

    /// Create a new gauge metric
    pub fn gauge(strategy: StrategyKind, name: &str, value: f64) -> Self {
        Self::build(strategy, MetricType::Gauge, name, value)
    }

    fn build(strategy: StrategyKind, metric_type: MetricType, name: &str, value: f64) -> Self {
        let labels = HashMap::from([("strategy".to_string(), strategy.id().to_string())]);
        Self {
            timestamp: Utc::now(),
            strategy,
            metric_type,
            metric_name: name.to_string(),
            value,
            labels,
        }
    }
}

/// Standard hedge metric names
pub mod metric_names {
    /// Recommendations issued
    pub const RECOMMENDATIONS_TOTAL: &str = "hedge.recommendations_total";

    /// Recommendations reported as executed
    pub const EXECUTED_TOTAL: &str = "hedge.executed_total";

    /// Cumulative execution cost in USD
    pub const TOTAL_COST_USD: &str = "hedge.total_cost_usd";

    /// Cumulative risk reduction
    pub const TOTAL_RISK_REDUCTION: &str = "hedge.total_risk_reduction";

    /// Executed / issued
    pub const EXECUTION_RATE: &str = "hedge.execution_rate";

    /// Risk reduction per unit of cost
    pub const COST_EFFICIENCY: &str = "hedge.cost_efficiency";

    /// Running average execution time in seconds
    pub const AVG_EXECUTION_TIME_SECS: &str = "hedge.avg_execution_time_secs";
}

/// Running performance counters for one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub strategy: StrategyKind,

    pub total_recommendations: u64,

    pub executed_recommendations: u64,

    pub total_cost: f64,

    pub total_risk_reduction: f64,

    /// Mirrors `execution_rate()` as of the last update
    pub success_rate: f64,

    /// Running average over executed hedges, in seconds
    pub avg_execution_time: f64,

    pub last_execution: Option<DateTime<Utc>>,
}

impl StrategyPerformance {
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            total_recommendations: 0,
            executed_recommendations: 0,
            total_cost: 0.0,
            total_risk_reduction: 0.0,
            success_rate: 0.0,
            avg_execution_time: 0.0,
            last_execution: None,
        }
    }

    /// Executed / issued; 0 before any recommendation
    pub fn execution_rate(&self) -> f64 {
        if self.total_recommendations == 0 {
            0.0
        } else {
            self.executed_recommendations as f64 / self.total_recommendations as f64
        }
    }

    /// Risk reduction per dollar spent; 0 before any cost
    pub fn cost_efficiency(&self) -> f64 {
        if self.total_cost > 0.0 {
            self.total_risk_reduction / self.total_cost
        } else {
            0.0
        }
    }

    pub(crate) fn record_recommendations(&mut self, count: usize) {
        self.total_recommendations += count as u64;
        self.success_rate = self.execution_rate();
    }

    pub(crate) fn record_outcome(
        &mut self,
        executed: bool,
        cost: f64,
        risk_reduction: f64,
        execution_time: f64,
    ) {
        if executed {
            self.executed_recommendations += 1;
            self.total_cost += cost;
            self.total_risk_reduction += risk_reduction;
            self.last_execution = Some(Utc::now());

            let n = self.executed_recommendations as f64;
            self.avg_execution_time += (execution_time - self.avg_execution_time) / n;
        }
        self.success_rate = self.execution_rate();
    }

    /// Snapshot of the counters as metrics
    pub fn to_metrics(&self) -> Vec<StrategyMetric> {
        vec![
            StrategyMetric::counter(
                self.strategy,
                metric_names::RECOMMENDATIONS_TOTAL,
                self.total_recommendations as f64,
            ),
            StrategyMetric::counter(
                self.strategy,
                metric_names::EXECUTED_TOTAL,
                self.executed_recommendations as f64,
            ),
            StrategyMetric::counter(self.strategy, metric_names::TOTAL_COST_USD, self.total_cost),
            StrategyMetric::counter(
                self.strategy,
                metric_names::TOTAL_RISK_REDUCTION,
                self.total_risk_reduction,
            ),
            StrategyMetric::gauge(
                self.strategy,
                metric_names::EXECUTION_RATE,
                self.execution_rate(),
            ),
            StrategyMetric::gauge(
                self.strategy,
                metric_names::COST_EFFICIENCY,
                self.cost_efficiency(),
            ),
            StrategyMetric::gauge(
                self.strategy,
                metric_names::AVG_EXECUTION_TIME_SECS,
                self.avg_execution_time,
            ),
        ]
    }
}
