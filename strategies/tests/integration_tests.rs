//! Integration tests for the hedge recommendation engine

use approx::assert_abs_diff_eq;
use chrono::{Duration as ChronoDuration, Utc};
use hedge_risk::{
    BreachReport, MarketData, Portfolio, Position, PositionKind, RiskCalculator, RiskThresholds,
};
use hedge_strategies::metrics::metric_names;
use hedge_strategies::{
    DeltaNeutralStrategy, EngineConfig, FallbackMode, HedgeAction, HedgeConfig,
    HedgeInstrumentMap, HedgeStrategy, PremiumModel, ProtectivePutStrategy, StrategyError,
    StrategyKind, StrategyManager,
};
use std::collections::HashMap;
use std::time::Duration;

fn config_path(name: &str) -> String {
    format!("{}/config/{}.yaml", env!("CARGO_MANIFEST_DIR"), name)
}

fn load_config(name: &str) -> EngineConfig {
    EngineConfig::from_yaml_file(config_path(name)).expect("Failed to load engine config")
}

fn aapl_position() -> Position {
    Position::spot("AAPL", 1000.0, 150.0, 155.0)
}

#[test]
fn test_aapl_delta_breach_hedged_with_qqq() {
    let mut portfolio = Portfolio::new();
    portfolio.add_position(aapl_position());
    let calculator = RiskCalculator::default();
    assert!(calculator.refresh_portfolio_greeks(&mut portfolio).is_empty());

    let thresholds = RiskThresholds {
        max_delta: 0.1,
        ..RiskThresholds::default()
    };
    assert!(thresholds.check_breach(&portfolio).delta);

    let strategy =
        DeltaNeutralStrategy::new(HedgeConfig::delta_neutral(), HedgeInstrumentMap::default());
    let rec = strategy
        .analyze_position(&portfolio.positions[0], &MarketData::new("AAPL", 155.0))
        .unwrap()
        .expect("delta hedge expected");

    assert_eq!(rec.symbol, "QQQ");
    assert!(matches!(rec.action, HedgeAction::Buy | HedgeAction::Sell));
    assert_eq!(rec.action, HedgeAction::Sell);
}

#[test]
fn test_short_position_gets_no_protective_put() {
    let mut position = Position::spot("AAPL", -500.0, 150.0, 155.0);
    RiskCalculator::default()
        .calculate_position_greeks(&mut position)
        .unwrap();

    let strategy = ProtectivePutStrategy::new(HedgeConfig::protective_put());
    let rec = strategy
        .analyze_position(&position, &MarketData::new("AAPL", 155.0))
        .unwrap();
    assert!(rec.is_none());
}

#[test]
fn test_empty_portfolio() {
    let portfolio = Portfolio::new();
    let mut manager = StrategyManager::new(RiskThresholds::default());

    assert!(manager.get_hedge_recommendations(&portfolio, None).is_empty());

    let report = manager.thresholds().check_breach(&portfolio);
    assert_eq!(report, BreachReport::default());
    assert!(!report.any());
}

#[test]
fn test_facade_with_synthesized_market_data() {
    let mut portfolio = Portfolio::new();
    portfolio.add_position(aapl_position());
    RiskCalculator::default().refresh_portfolio_greeks(&mut portfolio);

    let mut manager = StrategyManager::default();
    let recs = manager.get_hedge_recommendations(&portfolio, None);

    assert_eq!(recs.len(), 2);
    assert!(recs.iter().all(|r| !r.fallback));
    assert_eq!(recs[0].symbol, "QQQ");
    assert_eq!(
        recs[0].reasoning,
        "[delta_neutral] Delta hedge: neutralizing 1.000 delta exposure"
    );
    assert_eq!(recs[1].symbol, "AAPL_COLLAR_152_160");
    assert_eq!(recs[1].action, HedgeAction::Collar);
}

#[test]
fn test_options_only_book_hedges_with_underlying_instrument() {
    let mut portfolio = Portfolio::new();
    portfolio.add_position(Position::option(
        "AAPL_CALL_150",
        PositionKind::Call,
        100.0,
        6.0,
        155.0,
        150.0,
        Utc::now() + ChronoDuration::days(30),
        Some(0.25),
    ));
    assert!(RiskCalculator::default()
        .refresh_portfolio_greeks(&mut portfolio)
        .is_empty());

    let mut manager = StrategyManager::default();
    let recs = manager.get_hedge_recommendations(&portfolio, None);

    let delta_hedge = recs
        .iter()
        .find(|r| r.strategy == StrategyKind::DeltaNeutral)
        .expect("delta hedge expected");
    assert_eq!(delta_hedge.symbol, "QQQ");
    assert_eq!(delta_hedge.action, HedgeAction::Sell);
    assert!(!delta_hedge.fallback);
    assert_abs_diff_eq!(delta_hedge.size, portfolio.total_delta(), epsilon = 1e-9);
}

#[test]
fn test_default_config_matches_builtin_defaults() {
    let config = load_config("default");
    let builtin = EngineConfig::default();

    assert_eq!(config.fallback, FallbackMode::DefaultDeltaHedge);
    assert_eq!(config.thresholds, builtin.thresholds);
    assert_eq!(config.instruments, builtin.instruments);
    assert_eq!(config.strategies, builtin.strategies);
    assert_eq!(config.calculator.var_simulations, 10_000);
    assert_eq!(config.calculator.lookback_days, 252);
    assert!(config.calculator.random_seed.is_none());
}

#[test]
fn test_options_desk_config() {
    let config = load_config("options_desk");

    assert_eq!(config.fallback, FallbackMode::Disabled);
    assert_eq!(config.calculator.random_seed, Some(7));
    assert_eq!(config.instruments.resolve("BTC-USD"), "BTC-PERP");
    assert_eq!(config.instruments.resolve("AAPL"), "AAPL-PERP");
    assert_eq!(
        config.strategies[&StrategyKind::ProtectivePut].premium_model,
        PremiumModel::BlackScholes
    );
    // Omitted thresholds keep their defaults
    assert_eq!(config.thresholds.max_var_95, 0.02);

    let manager = StrategyManager::from_config(&config).unwrap();
    assert_eq!(
        manager.strategy_kinds(),
        vec![StrategyKind::ProtectivePut, StrategyKind::DeltaNeutral]
    );
    assert_eq!(manager.fallback_mode(), FallbackMode::Disabled);
    assert_eq!(
        manager
            .strategy_config(StrategyKind::DeltaNeutral)
            .unwrap()
            .hedge_ratio,
        0.8
    );
}

#[test]
fn test_options_desk_protective_put() {
    let config = load_config("options_desk");
    let mut manager = StrategyManager::from_config(&config).unwrap();

    let mut portfolio = Portfolio::new();
    portfolio.add_position(Position::spot("SPY", 600.0, 440.0, 450.0));
    RiskCalculator::new(config.calculator.clone()).refresh_portfolio_greeks(&mut portfolio);

    // 270,000 exceeds the 250,000 position cap
    assert!(manager.thresholds().check_breach(&portfolio).position_size);

    let recs = manager.get_hedge_recommendations(&portfolio, None);
    assert_eq!(recs.len(), 1);

    let rec = &recs[0];
    assert_eq!(rec.strategy, StrategyKind::ProtectivePut);
    assert_eq!(rec.symbol, "SPY_PUT_405");
    assert_eq!(
        rec.reasoning,
        "[protective_put] Protective put for $270,000 long position"
    );
    assert!(rec.estimated_cost <= 270_000.0 * 0.03);
}

#[test]
fn test_invalid_strategy_config_rejected() {
    let yaml = r#"
strategies:
  collar:
    collar_put_offset: 0.1
"#;
    match EngineConfig::from_yaml(yaml) {
        Err(StrategyError::Configuration(msg)) => assert!(msg.contains("strategy collar")),
        other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_invalid_thresholds_rejected() {
    let yaml = r#"
thresholds:
  max_delta: -1.0
"#;
    assert!(matches!(
        EngineConfig::from_yaml(yaml),
        Err(StrategyError::Risk(_))
    ));
}

#[test]
fn test_config_yaml_round_trip() {
    let config = EngineConfig::default();
    let reloaded = EngineConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
    assert_eq!(reloaded.strategies, config.strategies);
    assert_eq!(reloaded.instruments, config.instruments);
}

#[test]
fn test_hedge_cycle_isolates_bad_positions() {
    let mut portfolio = Portfolio::with_cash(5_000.0);
    portfolio.add_position(aapl_position());
    // Option without strike or expiry cannot be priced
    portfolio.add_position(Position::new(
        "AAPL_CALL_160",
        PositionKind::Call,
        10.0,
        3.0,
        155.0,
    ));

    let market_data = HashMap::from([("AAPL".to_string(), MarketData::new("AAPL", 158.0))]);
    let mut manager = StrategyManager::default();
    let report = manager.run_hedge_cycle(
        &mut portfolio,
        &market_data,
        &RiskCalculator::default(),
        None,
    );

    assert_eq!(report.greeks_failures.len(), 1);
    assert_eq!(report.greeks_failures[0].symbol, "AAPL_CALL_160");
    assert!(portfolio.positions[1].greeks.is_none());

    assert!(report.breaches.delta);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.strategy == StrategyKind::DeltaNeutral && r.symbol == "QQQ"));

    let budget = portfolio.total_market_value().abs() * 0.02;
    let spent: f64 = report
        .rankings
        .iter()
        .filter(|r| report.selected.iter().any(|s| s.symbol == r.recommendation.symbol))
        .map(|r| r.cost.total_cost)
        .sum();
    assert!(spent <= budget);
}

#[test]
fn test_performance_tracking_through_manager() {
    let mut portfolio = Portfolio::new();
    portfolio.add_position(aapl_position());
    RiskCalculator::default().refresh_portfolio_greeks(&mut portfolio);

    let mut manager = StrategyManager::default();
    manager.get_hedge_recommendations(&portfolio, None);
    manager.get_hedge_recommendations(&portfolio, None);

    manager
        .update_strategy_performance(
            StrategyKind::DeltaNeutral,
            true,
            1.5,
            0.9,
            Duration::from_secs(2),
        )
        .unwrap();

    let perf = &manager.get_strategy_performance_report()[&StrategyKind::DeltaNeutral];
    assert_eq!(perf.total_recommendations, 2);
    assert_eq!(perf.executed_recommendations, 1);
    assert_abs_diff_eq!(perf.execution_rate(), 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(perf.cost_efficiency(), 0.6, epsilon = 1e-12);

    let metrics = perf.to_metrics();
    let avg_time = metrics
        .iter()
        .find(|m| m.metric_name == metric_names::AVG_EXECUTION_TIME_SECS)
        .unwrap();
    assert_eq!(avg_time.value, 2.0);
}
