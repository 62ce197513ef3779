use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::trading::pattern_store::{PatternStatistics, PatternStatisticsSource};

pub const DEFAULT_MIN_SAMPLE_SIZE: u32 = 20;

const STRONG_EV: f64 = 0.5;
const NEGATIVE_EV: f64 = -0.3;
const NO_DATA_RECOMMENDATION: &str = "Insufficient data — collect trades first";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "No Data")]
    NoData,
    Low,
    Moderate,
    Good,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::NoData => "No Data",
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::Moderate => "Moderate",
            ConfidenceLevel::Good => "Good",
            ConfidenceLevel::High => "High",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvResult {
    pub pattern: String,
    pub timeframe: String,
    pub raw_expected_value: f64,
    pub confidence_multiplier: f64,
    pub adjusted_expected_value: f64,
    pub sample_size: u32,
    pub win_rate: f64,
    pub confidence_label: ConfidenceLevel,
    pub recommendation: String,
}

impl EvResult {
    fn no_data(pattern: &str, timeframe: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            timeframe: timeframe.to_string(),
            raw_expected_value: 0.0,
            confidence_multiplier: 0.0,
            adjusted_expected_value: 0.0,
            sample_size: 0,
            win_rate: 0.0,
            confidence_label: ConfidenceLevel::NoData,
            recommendation: NO_DATA_RECOMMENDATION.to_string(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.confidence_label != ConfidenceLevel::NoData
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub trade_number: usize,
    pub ev: f64,
    pub win_rate: f64,
    pub sample_size: usize,
}

/// `win_rate * avg_win - loss_rate * avg_loss`, with the win rate.
/// `None` when there are no trades.
pub fn raw_expected_value(stats: &PatternStatistics) -> Option<(f64, f64)> {
    let win_rate = stats.win_rate()?;
    let loss_rate = 1.0 - win_rate;
    Some((win_rate * stats.avg_win - loss_rate * stats.avg_loss, win_rate))
}

/// Step shrinkage by sample size relative to `min_sample`.
pub fn confidence_for(sample_size: u32, min_sample: u32) -> (f64, ConfidenceLevel) {
    if sample_size >= min_sample.saturating_mul(2) {
        (1.0, ConfidenceLevel::High)
    } else if sample_size >= min_sample {
        (0.8, ConfidenceLevel::Good)
    } else if sample_size.saturating_mul(2) >= min_sample {
        (0.5, ConfidenceLevel::Moderate)
    } else {
        (0.2, ConfidenceLevel::Low)
    }
}

fn recommendation_for(raw_ev: f64, sample_size: u32, min_sample: u32) -> String {
    let base = if raw_ev > STRONG_EV {
        "Strong positive EV — take this trade"
    } else if raw_ev > 0.0 {
        "Positive EV — trade acceptable"
    } else if raw_ev > NEGATIVE_EV {
        "Near-zero EV — consider passing"
    } else {
        "Negative EV — avoid this trade"
    };

    if sample_size < min_sample {
        format!(
            "{} (collect {} more trades for reliability)",
            base,
            min_sample - sample_size
        )
    } else {
        base.to_string()
    }
}

/// Sample-size-aware expected value per pattern, in R-multiples.
pub struct ExpectedValueEngine<S> {
    source: S,
    min_sample_size: u32,
}

impl<S: PatternStatisticsSource> ExpectedValueEngine<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
        }
    }

    pub fn with_min_sample_size(mut self, n: u32) -> Self {
        self.min_sample_size = n;
        self
    }

    pub fn min_sample_size(&self) -> u32 {
        self.min_sample_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn compute(&self, pattern: &str, timeframe: &str) -> EvResult {
        match self.source.lookup(timeframe, pattern) {
            Some(stats) => self.compute_from_stats(pattern, timeframe, &stats),
            None => {
                debug!("No statistics for {} on {}", pattern, timeframe);
                EvResult::no_data(pattern, timeframe)
            }
        }
    }

    pub fn compute_from_stats(
        &self,
        pattern: &str,
        timeframe: &str,
        stats: &PatternStatistics,
    ) -> EvResult {
        let Some((raw, win_rate)) = raw_expected_value(stats) else {
            return EvResult::no_data(pattern, timeframe);
        };

        let sample_size = stats.total_trades();
        let (multiplier, label) = confidence_for(sample_size, self.min_sample_size);

        EvResult {
            pattern: pattern.to_string(),
            timeframe: timeframe.to_string(),
            raw_expected_value: round4(raw),
            confidence_multiplier: multiplier,
            adjusted_expected_value: round4(raw * multiplier),
            sample_size,
            win_rate: round4(win_rate),
            confidence_label: label,
            recommendation: recommendation_for(raw, sample_size, self.min_sample_size),
        }
    }

    /// Compares the unrounded adjusted EV, so a tiny negative edge that
    /// reports as `-0.0` is still refused at `min_ev = 0`.
    pub fn should_trade(&self, pattern: &str, timeframe: &str, min_ev: f64) -> bool {
        let adjusted = self.adjusted_ev(pattern, timeframe);
        let ok = adjusted >= min_ev;
        debug!(
            "{} {} adjusted EV {:+.6} vs min {:+.4}: {}",
            pattern,
            timeframe,
            adjusted,
            min_ev,
            if ok { "trade" } else { "pass" }
        );
        ok
    }

    /// `raw * multiplier` before rounding; 0.0 without data.
    fn adjusted_ev(&self, pattern: &str, timeframe: &str) -> f64 {
        self.source
            .lookup(timeframe, pattern)
            .and_then(|stats| {
                let (raw, _) = raw_expected_value(&stats)?;
                let (multiplier, _) = confidence_for(stats.total_trades(), self.min_sample_size);
                Some(raw * multiplier)
            })
            .unwrap_or(0.0)
    }

    /// EV after each of the last `lookback` trades (0 = whole history),
    /// each point recomputed from the full prefix.
    pub fn trend(&self, pattern: &str, timeframe: &str, lookback: usize) -> Vec<TrendPoint> {
        let history = self.source.history(timeframe, pattern);
        let start = if lookback == 0 {
            0
        } else {
            history.len().saturating_sub(lookback)
        };
        let window = &history[start..];

        (1..=window.len())
            .filter_map(|k| {
                let stats = PatternStatistics::from_r_multiples(&window[..k]);
                let (ev, win_rate) = raw_expected_value(&stats)?;
                Some(TrendPoint {
                    trade_number: k,
                    ev: round4(ev),
                    win_rate: round4(win_rate),
                    sample_size: stats.total_trades() as usize,
                })
            })
            .collect()
    }

    /// Every known pattern on a timeframe, best adjusted EV first.
    pub fn rank_patterns(&self, timeframe: &str) -> Vec<EvResult> {
        let mut results: Vec<EvResult> = self
            .source
            .patterns(timeframe)
            .iter()
            .map(|p| self.compute(p, timeframe))
            .collect();
        results.sort_by(|a, b| {
            b.adjusted_expected_value
                .total_cmp(&a.adjusted_expected_value)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        results
    }
}

fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}
