use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Timeframe;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read statistics file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed statistics export: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Aggregate outcome counters for one (timeframe, pattern) pair.
/// `avg_win` and `avg_loss` are R-multiples, `avg_loss` stored as a magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternStatistics {
    pub wins: u32,
    pub losses: u32,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl PatternStatistics {
    pub fn total_trades(&self) -> u32 {
        self.wins.saturating_add(self.losses)
    }

    /// `None` when there are no trades.
    pub fn win_rate(&self) -> Option<f64> {
        let total = self.total_trades();
        if total == 0 {
            None
        } else {
            Some(self.wins as f64 / total as f64)
        }
    }

    /// Aggregates a run of R-multiples. Zero counts as a loss.
    pub fn from_r_multiples(results: &[f64]) -> Self {
        let wins: Vec<f64> = results.iter().copied().filter(|r| *r > 0.0).collect();
        let losses: Vec<f64> = results.iter().copied().filter(|r| *r <= 0.0).collect();

        let avg_win = if !wins.is_empty() {
            wins.iter().sum::<f64>() / wins.len() as f64
        } else {
            0.0
        };
        let avg_loss = if !losses.is_empty() {
            (losses.iter().sum::<f64>() / losses.len() as f64).abs()
        } else {
            0.0
        };

        Self {
            wins: wins.len() as u32,
            losses: losses.len() as u32,
            avg_win,
            avg_loss,
        }
    }

    /// Folds another set of counters in, averages weighted by count.
    pub fn merge(&mut self, other: &PatternStatistics) {
        self.avg_win = weighted_avg(self.avg_win, self.wins, other.avg_win, other.wins);
        self.avg_loss = weighted_avg(self.avg_loss, self.losses, other.avg_loss, other.losses);
        self.wins = self.wins.saturating_add(other.wins);
        self.losses = self.losses.saturating_add(other.losses);
    }

    fn push(&mut self, r_multiple: f64) {
        if r_multiple > 0.0 {
            let n = self.wins as f64;
            self.avg_win = (self.avg_win * n + r_multiple) / (n + 1.0);
            self.wins = self.wins.saturating_add(1);
        } else {
            let n = self.losses as f64;
            self.avg_loss = (self.avg_loss * n + r_multiple.abs()) / (n + 1.0);
            self.losses = self.losses.saturating_add(1);
        }
    }
}

fn weighted_avg(a: f64, a_n: u32, b: f64, b_n: u32) -> f64 {
    let total = a_n as f64 + b_n as f64;
    if total == 0.0 {
        0.0
    } else {
        (a * a_n as f64 + b * b_n as f64) / total
    }
}

/// Read-only view of historical pattern outcomes.
///
/// Implementations must answer immediately; anything unavailable is `None`.
pub trait PatternStatisticsSource {
    fn lookup(&self, timeframe: &str, pattern: &str) -> Option<PatternStatistics>;

    /// Pattern names known for a timeframe.
    fn patterns(&self, _timeframe: &str) -> Vec<String> {
        Vec::new()
    }

    /// Closed-trade R-multiples, oldest first.
    fn history(&self, _timeframe: &str, _pattern: &str) -> Vec<f64> {
        Vec::new()
    }
}

impl<S: PatternStatisticsSource + ?Sized> PatternStatisticsSource for Arc<S> {
    fn lookup(&self, timeframe: &str, pattern: &str) -> Option<PatternStatistics> {
        (**self).lookup(timeframe, pattern)
    }

    fn patterns(&self, timeframe: &str) -> Vec<String> {
        (**self).patterns(timeframe)
    }

    fn history(&self, timeframe: &str, pattern: &str) -> Vec<f64> {
        (**self).history(timeframe, pattern)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub timeframe: String,
    pub pattern: String,
    pub r_multiple: f64,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PatternEntry {
    #[serde(flatten)]
    stats: PatternStatistics,
    #[serde(default)]
    history: Vec<f64>,
}

fn timeframe_key(tf: &str) -> String {
    Timeframe::from_str_loose(tf)
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| tf.trim().to_string())
}

fn pattern_key(pattern: &str) -> String {
    pattern.trim().to_lowercase()
}

/// In-memory statistics table keyed by timeframe then pattern, loadable
/// from the EA's JSON export:
/// `{ "H1": { "bullish_engulfing": { "wins": 12, "losses": 8, "avg_win": 1.6, "avg_loss": 1.0 } } }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternStore {
    entries: BTreeMap<String, BTreeMap<String, PatternEntry>>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_outcomes(outcomes: &[TradeOutcome]) -> Self {
        let mut sorted: Vec<&TradeOutcome> = outcomes.iter().collect();
        sorted.sort_by_key(|o| o.closed_at);

        let mut store = Self::new();
        for outcome in sorted {
            store.record(outcome);
        }
        store
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let raw: PatternStore = serde_json::from_str(json)?;
        // Re-key through the normalizers; "1h" and "H1" entries are merged
        let mut store = Self::new();
        for (tf, patterns) in raw.entries {
            let tf = timeframe_key(&tf);
            let bucket = store.entries.entry(tf.clone()).or_default();
            for (name, entry) in patterns {
                match bucket.entry(pattern_key(&name)) {
                    Entry::Vacant(slot) => {
                        slot.insert(entry);
                    }
                    Entry::Occupied(mut slot) => {
                        debug!("Merging duplicate statistics for {} on {}", name, tf);
                        let existing = slot.get_mut();
                        existing.stats.merge(&entry.stats);
                        existing.history.extend(entry.history);
                    }
                }
            }
        }
        Ok(store)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Missing or unreadable exports degrade to an empty store.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::from_json_file(path.as_ref()) {
            Ok(store) => {
                debug!(
                    "Loaded {} pattern entries from {}",
                    store.len(),
                    path.as_ref().display()
                );
                store
            }
            Err(e) => {
                warn!("Pattern statistics unavailable, treating as no data: {}", e);
                Self::new()
            }
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn record(&mut self, outcome: &TradeOutcome) {
        let entry = self
            .entries
            .entry(timeframe_key(&outcome.timeframe))
            .or_default()
            .entry(pattern_key(&outcome.pattern))
            .or_default();
        entry.stats.push(outcome.r_multiple);
        entry.history.push(outcome.r_multiple);
    }

    /// Inserts aggregates directly, replacing any existing entry.
    pub fn insert(&mut self, timeframe: &str, pattern: &str, stats: PatternStatistics) {
        self.entries
            .entry(timeframe_key(timeframe))
            .or_default()
            .insert(
                pattern_key(pattern),
                PatternEntry {
                    stats,
                    history: Vec::new(),
                },
            );
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, timeframe: &str, pattern: &str) -> Option<&PatternEntry> {
        self.entries
            .get(&timeframe_key(timeframe))?
            .get(&pattern_key(pattern))
    }
}

impl PatternStatisticsSource for PatternStore {
    fn lookup(&self, timeframe: &str, pattern: &str) -> Option<PatternStatistics> {
        self.entry(timeframe, pattern).map(|e| e.stats)
    }

    fn patterns(&self, timeframe: &str) -> Vec<String> {
        self.entries
            .get(&timeframe_key(timeframe))
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn history(&self, timeframe: &str, pattern: &str) -> Vec<f64> {
        self.entry(timeframe, pattern)
            .map(|e| e.history.clone())
            .unwrap_or_default()
    }
}
