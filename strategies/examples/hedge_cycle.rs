//! Example: Running one hedge cycle over a small book
//!
//! Loads the engine configuration (defaults to `config/default.yaml`, or the
//! path given as the first argument), refreshes a sample portfolio against a
//! market snapshot and prints the ranked and selected hedges.
//!
//! ```text
//! RUST_LOG=hedge_strategies=debug cargo run --example hedge_cycle
//! ```

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use hedge_risk::{MarketData, Portfolio, Position, PositionKind, RiskCalculator};
use hedge_strategies::{EngineConfig, StrategyManager};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Hedge Cycle Example ===\n");

    // 1. Load configuration
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("{}/config/default.yaml", env!("CARGO_MANIFEST_DIR")));
    let config = EngineConfig::from_yaml_file(&path)
        .with_context(|| format!("loading engine config from {}", path))?;

    println!("Configuration: {}", path);
    println!("  Strategies: {:?}", config.strategies.keys().collect::<Vec<_>>());
    println!("  Max delta: {}", config.thresholds.max_delta);
    println!("  Fallback: {:?}", config.fallback);
    println!();

    let mut manager = StrategyManager::from_config(&config)?;
    let calculator = RiskCalculator::new(config.calculator.clone());

    // 2. Build the book
    let expiry = Utc::now() + Duration::days(30);
    let mut portfolio = Portfolio::with_cash(25_000.0);
    portfolio.add_position(Position::spot("AAPL", 1000.0, 150.0, 155.0));
    portfolio.add_position(Position::spot("MSFT", 150.0, 310.0, 330.0));
    portfolio.add_position(Position::option(
        "AAPL_CALL_160",
        PositionKind::Call,
        -20.0,
        3.10,
        155.0,
        160.0,
        expiry,
        Some(0.27),
    ));
    portfolio.add_position(Position::new("BTC-USD", PositionKind::Spot, 2.0, 58_000.0, 61_000.0));

    // 3. Market snapshot
    let market_data: HashMap<String, MarketData> = [
        MarketData::new("AAPL", 157.5).with_quote(157.48, 157.52),
        MarketData::new("MSFT", 331.2).with_quote(331.15, 331.25),
        MarketData::new("BTC-USD", 61_250.0).with_quote(61_240.0, 61_260.0),
        MarketData::new("QQQ", 438.0).with_quote(437.98, 438.02),
    ]
    .into_iter()
    .map(|data| (data.symbol.clone(), data))
    .collect();

    // 4. Run the cycle
    let report = manager.run_hedge_cycle(&mut portfolio, &market_data, &calculator, None);

    println!("Portfolio:");
    println!("  Value: ${:.2}", portfolio.total_market_value());
    println!("  Delta: {:.3}", portfolio.total_delta());
    println!("  Gamma: {:.4}", portfolio.total_gamma());
    println!("  Vega:  {:.3}", portfolio.total_vega());
    println!("  Breached: {:?}", report.breaches.breached());
    for failure in &report.greeks_failures {
        println!("  Greeks failed for {}: {}", failure.symbol, failure.error);
    }
    println!();

    println!("Ranked recommendations:");
    for ranking in &report.rankings {
        let rec = &ranking.recommendation;
        println!(
            "  {:.3}  {} {:.2} {} ({:?}, cost ${:.2})",
            ranking.total_score,
            rec.action,
            rec.size,
            rec.symbol,
            rec.urgency,
            ranking.cost.total_cost
        );
        println!("         {}", rec.reasoning);
    }
    println!();

    println!("Selected hedges:");
    for rec in &report.selected {
        println!("  {} {:.2} {}", rec.action, rec.size, rec.symbol);
    }
    println!();

    println!("Strategy performance:");
    for (kind, performance) in manager.get_strategy_performance_report() {
        println!(
            "  {}: {} recommendations, execution rate {:.1}%",
            kind,
            performance.total_recommendations,
            performance.execution_rate() * 100.0
        );
    }

    Ok(())
}
