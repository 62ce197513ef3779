use chrono::{DateTime, Timelike, Utc};
use chrono_tz::US::Eastern;
use std::collections::HashMap;

use crate::models::{Session, Timeframe};

/// Read-only market context the gauntlet consults when an opportunity
/// does not carry its own session data.
pub trait SessionContext {
    fn current_session(&self) -> Session;
    /// 0..=10
    fn session_quality(&self) -> u8;
    fn expected_atr(&self, symbol: &str, timeframe: &str) -> Option<f64>;
}

// (start, end) as (hour, minute) New York time. Dead hours fill the gaps.
const SESSION_WINDOWS: [(Session, (u32, u32), (u32, u32)); 4] = [
    (Session::Asian, (19, 0), (3, 0)),
    (Session::London, (3, 0), (8, 0)),
    (Session::LondonNyOverlap, (8, 0), (12, 0)),
    (Session::NewYork, (12, 0), (17, 0)),
];

pub fn session_quality_of(session: Session) -> u8 {
    match session {
        Session::Asian => 3,
        Session::London => 8,
        Session::LondonNyOverlap => 10,
        Session::NewYork => 7,
        Session::Dead => 1,
    }
}

/// Classifies a UTC instant into a trading session.
pub fn classify(utc_now: DateTime<Utc>) -> Session {
    let et_now = utc_now.with_timezone(&Eastern);
    let current = et_now.hour() * 60 + et_now.minute();

    for (session, start, end) in SESSION_WINDOWS {
        let start_min = start.0 * 60 + start.1;
        let end_min = end.0 * 60 + end.1;

        let inside = if start_min < end_min {
            current >= start_min && current < end_min
        } else {
            // Wraps midnight
            current >= start_min || current < end_min
        };

        if inside {
            return session;
        }
    }
    Session::Dead
}

/// Wall-clock session context with a per-symbol expected ATR table.
pub struct SessionClock {
    pub current_session: Session,
    pub updated_at: DateTime<Utc>,
    expected_atr: HashMap<(String, Timeframe), f64>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(utc_now: DateTime<Utc>) -> Self {
        Self {
            current_session: classify(utc_now),
            updated_at: utc_now,
            expected_atr: HashMap::new(),
        }
    }

    pub fn update(&mut self, utc_now: Option<DateTime<Utc>>) {
        let utc_now = utc_now.unwrap_or_else(Utc::now);
        self.current_session = classify(utc_now);
        self.updated_at = utc_now;
    }

    pub fn with_expected_atr(mut self, symbol: &str, tf: Timeframe, atr: f64) -> Self {
        self.set_expected_atr(symbol, tf, atr);
        self
    }

    pub fn set_expected_atr(&mut self, symbol: &str, tf: Timeframe, atr: f64) {
        self.expected_atr
            .insert((symbol.to_uppercase(), tf), atr);
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext for SessionClock {
    fn current_session(&self) -> Session {
        self.current_session
    }

    fn session_quality(&self) -> u8 {
        session_quality_of(self.current_session)
    }

    fn expected_atr(&self, symbol: &str, timeframe: &str) -> Option<f64> {
        let tf = Timeframe::from_str_loose(timeframe)?;
        self.expected_atr
            .get(&(symbol.to_uppercase(), tf))
            .copied()
    }
}

/// Constant context, for replays and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedSession {
    pub session: Session,
    pub quality: u8,
    pub atr: Option<f64>,
}

impl FixedSession {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            quality: session_quality_of(session),
            atr: None,
        }
    }
}

impl SessionContext for FixedSession {
    fn current_session(&self) -> Session {
        self.session
    }

    fn session_quality(&self) -> u8 {
        self.quality
    }

    fn expected_atr(&self, _symbol: &str, _timeframe: &str) -> Option<f64> {
        self.atr
    }
}
