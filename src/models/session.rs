use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Asian,
    London,
    LondonNyOverlap,
    #[serde(rename = "newyork", alias = "new_york", alias = "ny")]
    NewYork,
    Dead,
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Asian => "asian",
            Session::London => "london",
            Session::LondonNyOverlap => "london_ny_overlap",
            Session::NewYork => "newyork",
            Session::Dead => "dead",
        }
    }

    /// Asian and dead hours: thin books, wide spreads.
    pub fn is_low_liquidity(&self) -> bool {
        matches!(self, Session::Asian | Session::Dead)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
