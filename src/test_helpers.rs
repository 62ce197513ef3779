use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::core::filter_config::{FilterConfig, Rule};
use crate::core::sessions::FixedSession;
use crate::models::{Direction, Opportunity, Sentiment, Session, Trend};
use crate::trading::pattern_store::{PatternStatistics, TradeOutcome};

pub fn stats(wins: u32, losses: u32, avg_win: f64, avg_loss: f64) -> PatternStatistics {
    PatternStatistics {
        wins,
        losses,
        avg_win,
        avg_loss,
    }
}

/// Closed trades one hour apart, oldest first.
pub fn make_outcomes(tf: &str, pattern: &str, r_multiples: &[f64]) -> Vec<TradeOutcome> {
    let base = DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    r_multiples
        .iter()
        .enumerate()
        .map(|(i, &r)| TradeOutcome {
            timeframe: tf.to_string(),
            pattern: pattern.to_string(),
            r_multiple: r,
            closed_at: base + Duration::hours(i as i64),
        })
        .collect()
}

/// London context, expected ATR 0.0012 for every symbol.
pub fn test_context() -> FixedSession {
    FixedSession {
        session: Session::London,
        quality: 8,
        atr: Some(0.0012),
    }
}

/// Passes every rule with every toggle on.
pub fn passing_opportunity() -> Opportunity {
    Opportunity {
        symbol: "EURUSD".to_string(),
        timeframe: "H1".to_string(),
        quality_score: 90,
        direction: Direction::Buy,
        pattern: "bullish_engulfing".to_string(),
        pattern_strength: Some(8),
        volume: 500.0,
        spread: Some(0.0001),
        atr: Some(0.001),
        risk_reward: Some(3.0),
        session: Some(Session::London),
        session_quality: Some(8),
        mtf_confirmed: true,
        mtf_score: Some(10),
        h4_trend: Some(Trend::Bullish),
        sentiment: Some(Sentiment::Bullish),
        liquidity_sweep: true,
        is_retail_trap: false,
        order_block_valid: true,
        structure_aligned: true,
        pattern_reliability: Some(80),
        parameters_optimized: true,
        regime_match: true,
    }
}

/// Clears the quality gate, fails nearly everything after it.
pub fn failing_opportunity() -> Opportunity {
    Opportunity {
        symbol: "GBPJPY".to_string(),
        timeframe: "M5".to_string(),
        quality_score: 90,
        direction: Direction::Buy,
        pattern: "pin_bar".to_string(),
        pattern_strength: Some(1),
        volume: 0.0,
        spread: Some(1.0),
        atr: Some(0.001),
        risk_reward: Some(0.5),
        session: Some(Session::Asian),
        session_quality: Some(1),
        mtf_confirmed: false,
        mtf_score: Some(2),
        h4_trend: Some(Trend::Bearish),
        sentiment: Some(Sentiment::Bearish),
        liquidity_sweep: false,
        is_retail_trap: true,
        order_block_valid: false,
        structure_aligned: false,
        pattern_reliability: Some(10),
        parameters_optimized: false,
        regime_match: false,
    }
}

pub fn all_rules_enabled() -> FilterConfig {
    let mut cfg = FilterConfig::default();
    for rule in Rule::ALL {
        if let Some(key) = rule.toggle_key() {
            assert!(cfg.set(key, true));
        }
    }
    cfg
}

/// Config with no file inputs and quiet logging.
pub fn default_test_config() -> Config {
    Config {
        opportunities_file: std::env::temp_dir()
            .join("opportunity_pipeline_test")
            .join("opportunities.json")
            .to_string_lossy()
            .to_string(),
        statistics_file: std::env::temp_dir()
            .join("opportunity_pipeline_test")
            .join("pattern_stats.json")
            .to_string_lossy()
            .to_string(),
        min_sample_size: 20,
        min_ev: 0.0,
        diagnostic_mode: false,
        filters: FilterConfig::default(),
        expected_atr: Vec::new(),
        log_level: "ERROR".to_string(),
    }
}
