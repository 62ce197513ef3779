use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::filter_config::{FilterConfig, Rule, MIN_PATTERN_RELIABILITY, VOLATILITY_BAND};
use crate::core::sessions::SessionContext;
use crate::models::{Opportunity, Timeframe};

const ATR_EPSILON: f64 = 1e-9;
const DEFAULT_MIN_VOLUME: f64 = 50.0;
const PERFECT_MTF_SCORE: u8 = 10;

/// Minimum tick volume per timeframe.
pub fn min_volume(tf: Option<Timeframe>) -> f64 {
    match tf {
        Some(Timeframe::M5) => 20.0,
        Some(Timeframe::M15) => 30.0,
        Some(Timeframe::M30) => 40.0,
        Some(Timeframe::H1) => 50.0,
        Some(Timeframe::H4) => 80.0,
        Some(Timeframe::D1) => 100.0,
        None => DEFAULT_MIN_VOLUME,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Stop at the first failing rule.
    FastReject,
    /// Evaluate every enabled rule and keep all outcomes.
    Diagnostic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDiagnostic {
    pub rule_name: Rule,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub first_failed_rule: Option<Rule>,
    pub rule_diagnostics: Vec<RuleDiagnostic>,
}

impl Verdict {
    /// Rejection message of the first failed rule.
    pub fn reason(&self) -> Option<&str> {
        let rule = self.first_failed_rule?;
        self.rule_diagnostics
            .iter()
            .find(|d| d.rule_name == rule)
            .map(|d| d.message.as_str())
    }

    pub fn failed_rules(&self) -> Vec<Rule> {
        self.rule_diagnostics
            .iter()
            .filter(|d| !d.passed)
            .map(|d| d.rule_name)
            .collect()
    }
}

pub struct FilterGauntlet<C> {
    context: C,
}

impl<C: SessionContext> FilterGauntlet<C> {
    pub fn new(context: C) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn evaluate(&self, opp: &Opportunity, cfg: &FilterConfig) -> Verdict {
        self.run(opp, cfg, EvaluationMode::FastReject)
    }

    pub fn diagnose(&self, opp: &Opportunity, cfg: &FilterConfig) -> Verdict {
        self.run(opp, cfg, EvaluationMode::Diagnostic)
    }

    pub fn run(&self, opp: &Opportunity, cfg: &FilterConfig, mode: EvaluationMode) -> Verdict {
        let mut diagnostics = Vec::new();
        let mut first_failed = None;

        for rule in Rule::ALL {
            if !cfg.is_enabled(rule) {
                continue;
            }

            let (passed, message) = match self.check(rule, opp, cfg) {
                Ok(msg) => (true, msg),
                Err(msg) => (false, msg),
            };
            debug!(
                "{} {} [{}] {}: {}",
                opp.symbol,
                opp.timeframe,
                rule,
                if passed { "pass" } else { "FAIL" },
                message
            );

            diagnostics.push(RuleDiagnostic {
                rule_name: rule,
                passed,
                message,
            });

            if !passed {
                first_failed.get_or_insert(rule);
                if mode == EvaluationMode::FastReject {
                    break;
                }
            }
        }

        let verdict = Verdict {
            passed: first_failed.is_none(),
            first_failed_rule: first_failed,
            rule_diagnostics: diagnostics,
        };
        trace!(
            "{} {} verdict: passed={} first_failed={:?}",
            opp.symbol,
            opp.timeframe,
            verdict.passed,
            verdict.first_failed_rule
        );
        verdict
    }

    /// Ok carries the pass note, Err the rejection reason.
    fn check(&self, rule: Rule, opp: &Opportunity, cfg: &FilterConfig) -> Result<String, String> {
        match rule {
            Rule::QualityScore => {
                let q = opp.quality_score as f64;
                if q < cfg.min_quality_score {
                    Err(format!(
                        "quality score {} below minimum {}",
                        opp.quality_score, cfg.min_quality_score
                    ))
                } else {
                    Ok(format!("quality score {}", opp.quality_score))
                }
            }
            Rule::Session => {
                let session = opp
                    .session
                    .unwrap_or_else(|| self.context.current_session());
                if session.is_low_liquidity() {
                    Err(format!("{} session avoided", session))
                } else {
                    Ok(format!("{} session", session))
                }
            }
            Rule::SessionQuality => {
                let sq = opp
                    .session_quality
                    .unwrap_or_else(|| self.context.session_quality());
                if (sq as f64) < cfg.min_session_quality {
                    Err(format!(
                        "session quality {} below minimum {}",
                        sq, cfg.min_session_quality
                    ))
                } else {
                    Ok(format!("session quality {}", sq))
                }
            }
            Rule::Volume => {
                let min = min_volume(opp.tf());
                if opp.volume < min {
                    Err(format!(
                        "volume {} below {} minimum {}",
                        opp.volume, opp.timeframe, min
                    ))
                } else {
                    Ok(format!("volume {}", opp.volume))
                }
            }
            Rule::Spread => match (opp.spread, opp.atr) {
                (Some(spread), Some(atr)) => {
                    let ratio = spread / atr.max(ATR_EPSILON);
                    if ratio > cfg.max_spread_pct_of_atr {
                        Err(format!(
                            "spread is {:.1}% of ATR, max {:.1}%",
                            ratio * 100.0,
                            cfg.max_spread_pct_of_atr * 100.0
                        ))
                    } else {
                        Ok(format!("spread is {:.1}% of ATR", ratio * 100.0))
                    }
                }
                _ => Ok("spread or ATR not reported".to_string()),
            },
            Rule::PatternStrength => match opp.pattern_strength {
                Some(s) if (s as f64) < cfg.min_pattern_strength => Err(format!(
                    "pattern strength {} below minimum {}",
                    s, cfg.min_pattern_strength
                )),
                Some(s) => Ok(format!("pattern strength {}", s)),
                None => Ok("pattern strength not reported".to_string()),
            },
            Rule::MtfAlignment => {
                if cfg.strict_mtf {
                    match opp.mtf_score {
                        Some(s) if s < PERFECT_MTF_SCORE => Err(format!(
                            "strict MTF requires score {}, got {}",
                            PERFECT_MTF_SCORE, s
                        )),
                        Some(s) => Ok(format!("MTF score {}", s)),
                        None => Ok("MTF score not reported".to_string()),
                    }
                } else if opp.mtf_confirmed {
                    Ok("MTF confirmed".to_string())
                } else {
                    Err("no multi-timeframe confirmation".to_string())
                }
            }
            Rule::RiskReward => match opp.risk_reward {
                Some(rr) if rr < cfg.min_rr_ratio => Err(format!(
                    "R:R {:.2} below minimum {:.2}",
                    rr, cfg.min_rr_ratio
                )),
                Some(rr) => Ok(format!("R:R {:.2}", rr)),
                None => Ok("R:R not reported".to_string()),
            },
            Rule::Volatility => {
                let expected = self.context.expected_atr(&opp.symbol, &opp.timeframe);
                match (opp.atr, expected) {
                    (Some(atr), Some(exp)) if exp > 0.0 => {
                        let ratio = atr / exp;
                        let (lo, hi) = VOLATILITY_BAND;
                        if ratio < lo || ratio > hi {
                            Err(format!(
                                "ATR {:.2}x expected, outside [{}, {}]",
                                ratio, lo, hi
                            ))
                        } else {
                            Ok(format!("ATR {:.2}x expected", ratio))
                        }
                    }
                    _ => Ok("no expected ATR reference".to_string()),
                }
            }
            Rule::TrendAlignment => {
                let trend = opp.h4_trend();
                if trend == opp.direction.opposing_bias() {
                    Err(format!("{} against {} H4 trend", opp.direction, trend))
                } else {
                    Ok(format!("H4 trend {}", trend))
                }
            }
            Rule::Sentiment => {
                let sentiment = opp.sentiment();
                if sentiment.as_trend() == opp.direction.opposing_bias() {
                    Err(format!("{} against {} sentiment", opp.direction, sentiment))
                } else {
                    Ok(format!("sentiment {}", sentiment))
                }
            }
            Rule::LiquiditySweep => flag(opp.liquidity_sweep, "liquidity swept", "no liquidity sweep"),
            Rule::RetailTrap => flag(!opp.is_retail_trap, "not a retail trap", "retail trap detected"),
            Rule::OrderBlock => flag(opp.order_block_valid, "order block valid", "order block invalid"),
            Rule::MarketStructure => flag(
                opp.structure_aligned,
                "structure aligned",
                "market structure not aligned",
            ),
            Rule::PatternReliability => match opp.pattern_reliability {
                Some(r) if r < MIN_PATTERN_RELIABILITY => Err(format!(
                    "pattern reliability {}% below {}%",
                    r, MIN_PATTERN_RELIABILITY
                )),
                Some(r) => Ok(format!("pattern reliability {}%", r)),
                None => Ok("pattern reliability not reported".to_string()),
            },
            Rule::ParameterOptimization => flag(
                opp.parameters_optimized,
                "parameters optimized",
                "parameters not optimized",
            ),
            Rule::RegimeMatch => flag(opp.regime_match, "regime match", "regime mismatch"),
        }
    }
}

fn flag(ok: bool, pass: &str, fail: &str) -> Result<String, String> {
    if ok {
        Ok(pass.to_string())
    } else {
        Err(fail.to_string())
    }
}
