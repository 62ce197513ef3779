use chrono::{DateTime, Duration, Utc};
use opportunity_pipeline::core::sessions::FixedSession;
use opportunity_pipeline::models::{Opportunity, Session};
use opportunity_pipeline::trading::pattern_store::{PatternStatistics, PatternStore, TradeOutcome};

/// Aggregates for one pattern.
pub fn stats(wins: u32, losses: u32, avg_win: f64, avg_loss: f64) -> PatternStatistics {
    PatternStatistics {
        wins,
        losses,
        avg_win,
        avg_loss,
    }
}

/// Store with one well-sampled winner, one thin winner and one loser on H1.
pub fn sample_store() -> PatternStore {
    let mut store = PatternStore::new();
    store.insert("H1", "bullish_engulfing", stats(28, 12, 1.8, 1.0));
    store.insert("H1", "fvg_retest", stats(4, 3, 2.0, 1.0));
    store.insert("H1", "pin_bar", stats(5, 15, 1.0, 1.0));
    store
}

/// Closed trades one hour apart from 2024-01-15T12:00Z, oldest first.
pub fn outcomes(tf: &str, pattern: &str, r_multiples: &[f64]) -> Vec<TradeOutcome> {
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

pub fn london() -> FixedSession {
    FixedSession::new(Session::London)
}

/// An H1 setup that clears the default gauntlet.
pub fn clean_setup(symbol: &str, pattern: &str, quality: u8) -> Opportunity {
    let mut opp = Opportunity::new(symbol, "H1", quality);
    opp.pattern = pattern.to_string();
    opp.pattern_strength = Some(8);
    opp.volume = 400.0;
    opp.spread = Some(0.0001);
    opp.atr = Some(0.001);
    opp.risk_reward = Some(2.5);
    opp
}
