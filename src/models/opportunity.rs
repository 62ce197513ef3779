use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Direction, Sentiment, Session, Timeframe, Trend};

/// One candidate setup as exported by the EA scanner.
///
/// Only `symbol`, `timeframe` and `quality_score` are required. Absent
/// optional numerics pass their rule; absent flags default to the
/// permissive value, except `liquidity_sweep` (no sweep observed) and
/// `is_retail_trap` (not flagged).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: String,
    pub timeframe: String,
    #[serde(deserialize_with = "score")]
    pub quality_score: u8,

    #[serde(default, deserialize_with = "null_as_default")]
    pub direction: Direction,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pattern: String,
    #[serde(default, deserialize_with = "optional_score")]
    pub pattern_strength: Option<u8>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub volume: f64,
    #[serde(default)]
    pub spread: Option<f64>,
    #[serde(default)]
    pub atr: Option<f64>,
    #[serde(default)]
    pub risk_reward: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub session: Option<Session>,
    #[serde(default, deserialize_with = "optional_score")]
    pub session_quality: Option<u8>,

    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub mtf_confirmed: bool,
    #[serde(default, deserialize_with = "optional_score")]
    pub mtf_score: Option<u8>,
    #[serde(default, deserialize_with = "lenient")]
    pub h4_trend: Option<Trend>,
    #[serde(default, deserialize_with = "lenient")]
    pub sentiment: Option<Sentiment>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub liquidity_sweep: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_retail_trap: bool,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub order_block_valid: bool,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub structure_aligned: bool,
    #[serde(default, deserialize_with = "optional_score")]
    pub pattern_reliability: Option<u8>,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub parameters_optimized: bool,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub regime_match: bool,
}

fn default_true() -> bool {
    true
}

// Exporters write `null` for "not measured"; treat it like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

/// Labels outside the known set read as absent, which the accessors map
/// to neutral and the session rules to the live context.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

/// 0..=255 scores; integral floats such as `85.0` are accepted, anything
/// else is rounded and clamped.
fn to_score<E: de::Error>(value: f64) -> Result<u8, E> {
    if !value.is_finite() {
        return Err(E::custom(format!("score {} is not finite", value)));
    }
    Ok(value.round().clamp(0.0, u8::MAX as f64) as u8)
}

fn score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    to_score(f64::deserialize(deserializer)?)
}

fn optional_score<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)?
        .map(to_score)
        .transpose()
}

impl Opportunity {
    /// Minimal record with every optional field at its default.
    pub fn new(symbol: &str, timeframe: &str, quality_score: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            quality_score,
            direction: Direction::Buy,
            pattern: String::new(),
            pattern_strength: None,
            volume: 0.0,
            spread: None,
            atr: None,
            risk_reward: None,
            session: None,
            session_quality: None,
            mtf_confirmed: true,
            mtf_score: None,
            h4_trend: None,
            sentiment: None,
            liquidity_sweep: false,
            is_retail_trap: false,
            order_block_valid: true,
            structure_aligned: true,
            pattern_reliability: None,
            parameters_optimized: true,
            regime_match: true,
        }
    }

    pub fn tf(&self) -> Option<Timeframe> {
        Timeframe::from_str_loose(&self.timeframe)
    }

    /// Timeframe key used against the statistics store: the MT5 code when
    /// the exported label parses, the raw label otherwise.
    pub fn timeframe_key(&self) -> String {
        self.tf()
            .map(|tf| tf.as_str().to_string())
            .unwrap_or_else(|| self.timeframe.clone())
    }

    pub fn h4_trend(&self) -> Trend {
        self.h4_trend.unwrap_or(Trend::Neutral)
    }

    pub fn sentiment(&self) -> Sentiment {
        self.sentiment.unwrap_or(Sentiment::Neutral)
    }
}
