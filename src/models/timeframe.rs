use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "M5", alias = "5m")]
    M5,
    #[serde(rename = "M15", alias = "15m")]
    M15,
    #[serde(rename = "M30", alias = "30m")]
    M30,
    #[serde(rename = "H1", alias = "1h")]
    H1,
    #[serde(rename = "H4", alias = "4h")]
    H4,
    #[serde(rename = "D1", alias = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }

    /// Accepts MT5 codes ("H1") and short forms ("1h"), ignoring case.
    pub fn from_str_loose(s: &str) -> Option<Timeframe> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m5" | "5m" => Some(Timeframe::M5),
            "m15" | "15m" => Some(Timeframe::M15),
            "m30" | "30m" => Some(Timeframe::M30),
            "h1" | "1h" | "60m" => Some(Timeframe::H1),
            "h4" | "4h" => Some(Timeframe::H4),
            "d1" | "1d" => Some(Timeframe::D1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_parsing_accepts_both_notations() {
        assert_eq!(Timeframe::from_str_loose("H1"), Some(Timeframe::H1));
        assert_eq!(Timeframe::from_str_loose("h4"), Some(Timeframe::H4));
        assert_eq!(Timeframe::from_str_loose("15m"), Some(Timeframe::M15));
        assert_eq!(Timeframe::from_str_loose(" d1 "), Some(Timeframe::D1));
        assert_eq!(Timeframe::from_str_loose("M1"), None);
        assert_eq!(Timeframe::from_str_loose("W1"), None);
    }

    #[test]
    fn serde_uses_mt5_codes() {
        let json = serde_json::to_string(&Timeframe::M30).unwrap();
        assert_eq!(json, "\"M30\"");
        let tf: Timeframe = serde_json::from_str("\"4h\"").unwrap();
        assert_eq!(tf, Timeframe::H4);
    }

    #[test]
    fn every_code_parses_back() {
        for tf in Timeframe::ALL {
            assert_eq!(Timeframe::from_str_loose(tf.as_str()), Some(tf));
        }
    }
}
