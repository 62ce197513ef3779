use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

pub type SharedFilterConfig = Arc<RwLock<FilterConfig>>;

/// Pattern reliability floor in percent. Fixed, not a config key.
pub const MIN_PATTERN_RELIABILITY: u8 = 65;

/// Accepted band for observed ATR relative to the expected ATR.
pub const VOLATILITY_BAND: (f64, f64) = (0.5, 2.0);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterConfigError {
    #[error("unknown filter key: {0}")]
    UnknownKey(String),

    #[error("filter key {key} expects a {expected} value")]
    TypeMismatch { key: String, expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Number(v)
    }
}

impl From<u8> for FilterValue {
    fn from(v: u8) -> Self {
        FilterValue::Number(v as f64)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{}", if *b { "on" } else { "off" }),
            FilterValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Gauntlet rules in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    QualityScore,
    Session,
    SessionQuality,
    Volume,
    Spread,
    PatternStrength,
    MtfAlignment,
    RiskReward,
    Volatility,
    TrendAlignment,
    Sentiment,
    LiquiditySweep,
    RetailTrap,
    OrderBlock,
    MarketStructure,
    PatternReliability,
    ParameterOptimization,
    RegimeMatch,
}

impl Rule {
    pub const ALL: [Rule; 18] = [
        Rule::QualityScore,
        Rule::Session,
        Rule::SessionQuality,
        Rule::Volume,
        Rule::Spread,
        Rule::PatternStrength,
        Rule::MtfAlignment,
        Rule::RiskReward,
        Rule::Volatility,
        Rule::TrendAlignment,
        Rule::Sentiment,
        Rule::LiquiditySweep,
        Rule::RetailTrap,
        Rule::OrderBlock,
        Rule::MarketStructure,
        Rule::PatternReliability,
        Rule::ParameterOptimization,
        Rule::RegimeMatch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::QualityScore => "quality_score",
            Rule::Session => "session",
            Rule::SessionQuality => "session_quality",
            Rule::Volume => "volume",
            Rule::Spread => "spread",
            Rule::PatternStrength => "pattern_strength",
            Rule::MtfAlignment => "mtf_alignment",
            Rule::RiskReward => "risk_reward",
            Rule::Volatility => "volatility",
            Rule::TrendAlignment => "trend_alignment",
            Rule::Sentiment => "sentiment",
            Rule::LiquiditySweep => "liquidity_sweep",
            Rule::RetailTrap => "retail_trap",
            Rule::OrderBlock => "order_block",
            Rule::MarketStructure => "market_structure",
            Rule::PatternReliability => "pattern_reliability",
            Rule::ParameterOptimization => "parameter_optimization",
            Rule::RegimeMatch => "regime_match",
        }
    }

    /// The config flag that switches this rule on. `None` means always on.
    pub fn toggle_key(&self) -> Option<&'static str> {
        match self {
            Rule::QualityScore | Rule::SessionQuality => None,
            Rule::Session => Some("avoid_asian_session"),
            Rule::Volume => Some("volume_filter"),
            Rule::Spread => Some("spread_filter"),
            Rule::PatternStrength => Some("pattern_strength_filter"),
            Rule::MtfAlignment => Some("mtf_confirmation"),
            Rule::RiskReward => Some("dynamic_risk"),
            Rule::Volatility => Some("volatility_filter"),
            Rule::TrendAlignment => Some("trend_filter"),
            Rule::Sentiment => Some("sentiment_filter"),
            Rule::LiquiditySweep => Some("liquidity_sweep"),
            Rule::RetailTrap => Some("retail_trap_detection"),
            Rule::OrderBlock => Some("order_block_validation"),
            Rule::MarketStructure => Some("market_structure"),
            Rule::PatternReliability => Some("pattern_reliability"),
            Rule::ParameterOptimization => Some("parameter_optimization"),
            Rule::RegimeMatch => Some("regime_filter"),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Runtime rule toggles and thresholds.
///
/// Built once at startup and mutated only through `set`/`toggle`.
/// Evaluations work on a cloned snapshot, so a batch never sees two states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    // Thresholds
    pub min_quality_score: f64,
    pub min_session_quality: f64,
    pub min_pattern_strength: f64,
    pub max_spread_pct_of_atr: f64,
    pub min_rr_ratio: f64,

    // Toggles
    pub avoid_asian_session: bool,
    pub volume_filter: bool,
    pub spread_filter: bool,
    pub pattern_strength_filter: bool,
    pub mtf_confirmation: bool,
    pub strict_mtf: bool,
    pub dynamic_risk: bool,
    pub volatility_filter: bool,
    pub trend_filter: bool,
    pub sentiment_filter: bool,
    pub liquidity_sweep: bool,
    pub retail_trap_detection: bool,
    pub order_block_validation: bool,
    pub market_structure: bool,
    pub pattern_reliability: bool,
    pub parameter_optimization: bool,
    pub regime_filter: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_quality_score: 70.0,
            min_session_quality: 5.0,
            min_pattern_strength: 6.0,
            max_spread_pct_of_atr: 0.2,
            min_rr_ratio: 2.0,
            avoid_asian_session: true,
            volume_filter: true,
            spread_filter: true,
            pattern_strength_filter: true,
            mtf_confirmation: true,
            strict_mtf: false,
            dynamic_risk: true,
            volatility_filter: false,
            trend_filter: true,
            sentiment_filter: false,
            liquidity_sweep: false,
            retail_trap_detection: true,
            order_block_validation: false,
            market_structure: false,
            pattern_reliability: false,
            parameter_optimization: false,
            regime_filter: false,
        }
    }
}

enum Slot<'a> {
    Flag(&'a mut bool),
    Threshold(&'a mut f64),
}

/// Lowercase, trimmed, spaces and hyphens folded to underscores.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

// Single key table: canonical key list, read access and write access.
macro_rules! filter_keys {
    ($($kind:ident $field:ident,)*) => {
        impl FilterConfig {
            /// Canonical keys, thresholds first.
            pub const KEYS: &'static [&'static str] = &[$(stringify!($field)),*];

            fn value_of(&self, key: &str) -> Option<FilterValue> {
                $(
                    if key == stringify!($field) {
                        return Some(FilterValue::from(self.$field));
                    }
                )*
                None
            }

            fn slot_mut(&mut self, key: &str) -> Option<Slot<'_>> {
                $(
                    if key == stringify!($field) {
                        return Some(Slot::$kind(&mut self.$field));
                    }
                )*
                None
            }
        }
    };
}

filter_keys! {
    Threshold min_quality_score,
    Threshold min_session_quality,
    Threshold min_pattern_strength,
    Threshold max_spread_pct_of_atr,
    Threshold min_rr_ratio,
    Flag avoid_asian_session,
    Flag volume_filter,
    Flag spread_filter,
    Flag pattern_strength_filter,
    Flag mtf_confirmation,
    Flag strict_mtf,
    Flag dynamic_risk,
    Flag volatility_filter,
    Flag trend_filter,
    Flag sentiment_filter,
    Flag liquidity_sweep,
    Flag retail_trap_detection,
    Flag order_block_validation,
    Flag market_structure,
    Flag pattern_reliability,
    Flag parameter_optimization,
    Flag regime_filter,
}

impl FilterConfig {
    /// Defaults overridden by `FILTER_<KEY>` environment variables.
    /// Unparsable or mistyped values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        for key in Self::KEYS {
            let var = format!("FILTER_{}", key.to_uppercase());
            let Ok(raw) = std::env::var(&var) else {
                continue;
            };
            let raw = raw.trim().to_lowercase();
            let value = match raw.as_str() {
                "true" | "on" | "1" | "yes" if cfg.is_flag(key) => FilterValue::Bool(true),
                "false" | "off" | "0" | "no" if cfg.is_flag(key) => FilterValue::Bool(false),
                other => match other.parse::<f64>() {
                    Ok(n) if n.is_finite() => FilterValue::Number(n),
                    _ => continue,
                },
            };
            if let Err(e) = cfg.try_set(key, value) {
                tracing::warn!("Ignoring {}: {}", var, e);
            }
        }
        cfg
    }

    pub fn shared(self) -> SharedFilterConfig {
        Arc::new(RwLock::new(self))
    }

    fn is_flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(FilterValue::Bool(_)))
    }

    pub fn get(&self, key: &str) -> Option<FilterValue> {
        self.value_of(&normalize_key(key))
    }

    pub fn try_set(
        &mut self,
        key: &str,
        value: impl Into<FilterValue>,
    ) -> Result<(), FilterConfigError> {
        let key = normalize_key(key);
        let value = value.into();
        match (self.slot_mut(&key), value) {
            (None, _) => Err(FilterConfigError::UnknownKey(key)),
            (Some(Slot::Flag(flag)), FilterValue::Bool(b)) => {
                *flag = b;
                Ok(())
            }
            (Some(Slot::Threshold(th)), FilterValue::Number(n)) => {
                *th = n;
                Ok(())
            }
            (Some(Slot::Flag(_)), FilterValue::Number(_)) => Err(FilterConfigError::TypeMismatch {
                key,
                expected: "boolean",
            }),
            (Some(Slot::Threshold(_)), FilterValue::Bool(_)) => {
                Err(FilterConfigError::TypeMismatch {
                    key,
                    expected: "numeric",
                })
            }
        }
    }

    /// Returns false and leaves the state untouched on an unknown key or
    /// a value of the wrong kind.
    pub fn set(&mut self, key: &str, value: impl Into<FilterValue>) -> bool {
        match self.try_set(key, value) {
            Ok(()) => {
                tracing::debug!("Filter {} set", normalize_key(key));
                true
            }
            Err(e) => {
                tracing::debug!("Filter update rejected: {}", e);
                false
            }
        }
    }

    /// Flips a boolean toggle. False for thresholds and unknown keys.
    pub fn toggle(&mut self, key: &str) -> bool {
        match self.get(key) {
            Some(FilterValue::Bool(b)) => self.set(key, !b),
            _ => false,
        }
    }

    pub fn is_enabled(&self, rule: Rule) -> bool {
        match rule.toggle_key() {
            None => true,
            Some(key) => matches!(self.get(key), Some(FilterValue::Bool(true))),
        }
    }

    pub fn enabled_rules(&self) -> Vec<Rule> {
        Rule::ALL
            .iter()
            .copied()
            .filter(|r| self.is_enabled(*r))
            .collect()
    }

    /// Number of switchable rules currently on.
    pub fn active_filter_count(&self) -> usize {
        Rule::ALL
            .iter()
            .filter(|r| r.toggle_key().is_some() && self.is_enabled(**r))
            .count()
    }
}

/// Clone of the current shared state for one evaluation batch.
pub async fn snapshot(shared: &SharedFilterConfig) -> FilterConfig {
    shared.read().await.clone()
}
