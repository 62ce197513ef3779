use serde::{Deserialize, Serialize};

use crate::core::expected_value::DEFAULT_MIN_SAMPLE_SIZE;
use crate::core::filter_config::FilterConfig;
use crate::core::sessions::SessionClock;
use crate::models::Timeframe;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedAtr {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub atr: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Inputs exported by the EA
    pub opportunities_file: String,
    pub statistics_file: String,

    // EV
    pub min_sample_size: u32,
    pub min_ev: f64,

    // Gauntlet
    pub diagnostic_mode: bool,
    pub filters: FilterConfig,
    pub expected_atr: Vec<ExpectedAtr>,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Config {
            opportunities_file: env("OPPORTUNITIES_FILE", "data/opportunities.json"),
            statistics_file: env("STATISTICS_FILE", "data/pattern_stats.json"),
            min_sample_size: env("MIN_SAMPLE_SIZE", "20")
                .parse()
                .unwrap_or(DEFAULT_MIN_SAMPLE_SIZE),
            min_ev: env("MIN_EV", "0.0").parse().unwrap_or(0.0),
            diagnostic_mode: env("DIAGNOSTIC_MODE", "false").to_lowercase() == "true",
            filters: FilterConfig::from_env(),
            expected_atr: parse_expected_atr(&env("EXPECTED_ATR", "")),
            log_level: env("LOG_LEVEL", "INFO"),
        }
    }

    /// Wall-clock session context seeded with the configured ATR references.
    pub fn session_clock(&self) -> SessionClock {
        let mut clock = SessionClock::new();
        for e in &self.expected_atr {
            clock.set_expected_atr(&e.symbol, e.timeframe, e.atr);
        }
        clock
    }
}

/// `EURUSD:H1=0.0012,XAUUSD:H4=9.5`. Malformed entries are skipped.
pub fn parse_expected_atr(raw: &str) -> Vec<ExpectedAtr> {
    raw.split(',')
        .filter_map(|item| {
            let (key, value) = item.trim().split_once('=')?;
            let (symbol, tf) = key.split_once(':')?;
            let timeframe = Timeframe::from_str_loose(tf)?;
            let atr: f64 = value.trim().parse().ok()?;
            if !atr.is_finite() || atr <= 0.0 {
                return None;
            }
            Some(ExpectedAtr {
                symbol: symbol.trim().to_uppercase(),
                timeframe,
                atr,
            })
        })
        .collect()
}
