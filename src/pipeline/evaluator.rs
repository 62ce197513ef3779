use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

use crate::core::expected_value::{EvResult, ExpectedValueEngine};
use crate::core::filter_config::{snapshot, FilterConfig, SharedFilterConfig};
use crate::core::gauntlet::{EvaluationMode, FilterGauntlet, Verdict};
use crate::core::sessions::SessionContext;
use crate::models::Opportunity;
use crate::trading::pattern_store::PatternStatisticsSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedOpportunity {
    pub opportunity: Opportunity,
    pub verdict: Verdict,
    pub ev: Option<EvResult>,
}

impl EvaluatedOpportunity {
    pub fn adjusted_ev(&self) -> Option<f64> {
        self.ev.as_ref().map(|e| e.adjusted_expected_value)
    }
}

/// Filter, then score the survivors.
pub struct OpportunityPipeline<S, C> {
    gauntlet: FilterGauntlet<C>,
    engine: ExpectedValueEngine<S>,
}

impl<S, C> OpportunityPipeline<S, C>
where
    S: PatternStatisticsSource,
    C: SessionContext,
{
    pub fn new(engine: ExpectedValueEngine<S>, context: C) -> Self {
        Self {
            gauntlet: FilterGauntlet::new(context),
            engine,
        }
    }

    pub fn gauntlet(&self) -> &FilterGauntlet<C> {
        &self.gauntlet
    }

    pub fn engine(&self) -> &ExpectedValueEngine<S> {
        &self.engine
    }

    /// Output order matches input order.
    pub fn evaluate_all(
        &self,
        opportunities: &[Opportunity],
        config: &FilterConfig,
    ) -> Vec<EvaluatedOpportunity> {
        self.run_batch(opportunities, config, EvaluationMode::FastReject)
    }

    /// Like `evaluate_all`, with every enabled rule reported per opportunity.
    pub fn diagnose_all(
        &self,
        opportunities: &[Opportunity],
        config: &FilterConfig,
    ) -> Vec<EvaluatedOpportunity> {
        self.run_batch(opportunities, config, EvaluationMode::Diagnostic)
    }

    /// Takes one snapshot of the shared config for the whole batch.
    pub async fn evaluate_shared(
        &self,
        opportunities: &[Opportunity],
        shared: &SharedFilterConfig,
    ) -> Vec<EvaluatedOpportunity> {
        let config = snapshot(shared).await;
        self.evaluate_all(opportunities, &config)
    }

    fn run_batch(
        &self,
        opportunities: &[Opportunity],
        config: &FilterConfig,
        mode: EvaluationMode,
    ) -> Vec<EvaluatedOpportunity> {
        let results: Vec<EvaluatedOpportunity> = opportunities
            .iter()
            .map(|opp| self.evaluate_one(opp, config, mode))
            .collect();

        let passed = results.iter().filter(|r| r.verdict.passed).count();
        info!(
            "Evaluated {} opportunities: {} passed, {} rejected ({} filters active)",
            results.len(),
            passed,
            results.len() - passed,
            config.active_filter_count()
        );
        results
    }

    fn evaluate_one(
        &self,
        opp: &Opportunity,
        config: &FilterConfig,
        mode: EvaluationMode,
    ) -> EvaluatedOpportunity {
        let verdict = self.gauntlet.run(opp, config, mode);
        if !verdict.passed {
            debug!(
                "{} {} {} rejected: {}",
                opp.symbol,
                opp.timeframe,
                opp.direction,
                verdict.reason().unwrap_or("unknown")
            );
            return EvaluatedOpportunity {
                opportunity: opp.clone(),
                verdict,
                ev: None,
            };
        }

        let ev = self.engine.compute(&opp.pattern, &opp.timeframe_key());
        debug!(
            "{} {} {} passed: {} EV {:+.4} ({})",
            opp.symbol,
            opp.timeframe,
            opp.direction,
            opp.pattern,
            ev.adjusted_expected_value,
            ev.confidence_label
        );
        EvaluatedOpportunity {
            opportunity: opp.clone(),
            verdict,
            ev: Some(ev),
        }
    }
}

/// Adjusted EV descending, then quality descending, then symbol ascending.
pub fn ranking_order(a: &EvaluatedOpportunity, b: &EvaluatedOpportunity) -> Ordering {
    let a_ev = a.adjusted_ev().unwrap_or(f64::NEG_INFINITY);
    let b_ev = b.adjusted_ev().unwrap_or(f64::NEG_INFINITY);
    b_ev.total_cmp(&a_ev)
        .then_with(|| b.opportunity.quality_score.cmp(&a.opportunity.quality_score))
        .then_with(|| a.opportunity.symbol.cmp(&b.opportunity.symbol))
}

/// Survivors only, best first.
pub fn rank(results: &[EvaluatedOpportunity]) -> Vec<&EvaluatedOpportunity> {
    let mut survivors: Vec<&EvaluatedOpportunity> =
        results.iter().filter(|r| r.ev.is_some()).collect();
    survivors.sort_by(|a, b| ranking_order(a, b));
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expected_value::ConfidenceLevel;
    use crate::core::filter_config::Rule;
    use crate::core::sessions::FixedSession;
    use crate::test_helpers::{passing_opportunity, stats, test_context};
    use crate::trading::pattern_store::PatternStore;

    fn pipeline() -> OpportunityPipeline<PatternStore, FixedSession> {
        let mut store = PatternStore::new();
        store.insert("H1", "bullish_engulfing", stats(28, 12, 1.8, 1.0));
        store.insert("H1", "pin_bar", stats(4, 3, 2.0, 1.0));
        store.insert("M15", "bullish_engulfing", stats(5, 15, 1.0, 1.0));
        OpportunityPipeline::new(ExpectedValueEngine::new(store), test_context())
    }

    fn opp(symbol: &str, tf: &str, pattern: &str, quality: u8) -> Opportunity {
        let mut o = passing_opportunity();
        o.symbol = symbol.to_string();
        o.timeframe = tf.to_string();
        o.pattern = pattern.to_string();
        o.quality_score = quality;
        o
    }

    #[test]
    fn rejected_opportunities_carry_no_ev() {
        let cfg = FilterConfig::default();
        let mut bad = opp("GBPUSD", "H1", "bullish_engulfing", 85);
        bad.volume = 10.0;
        let results = pipeline().evaluate_all(&[bad], &cfg);
        assert_eq!(results.len(), 1);
        assert!(!results[0].verdict.passed);
        assert_eq!(results[0].verdict.first_failed_rule, Some(Rule::Volume));
        assert!(results[0].ev.is_none());
    }

    #[test]
    fn output_preserves_input_order() {
        let cfg = FilterConfig::default();
        let input = vec![
            opp("USDJPY", "H1", "pin_bar", 80),
            opp("EURUSD", "H1", "bullish_engulfing", 90),
            opp("AUDUSD", "H1", "bullish_engulfing", 10),
            opp("XAUUSD", "M15", "new_thing", 75),
        ];
        let results = pipeline().evaluate_all(&input, &cfg);
        let symbols: Vec<&str> = results
            .iter()
            .map(|r| r.opportunity.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["USDJPY", "EURUSD", "AUDUSD", "XAUUSD"]);

        assert!(results[2].ev.is_none());
        let unknown = results[3].ev.as_ref().unwrap();
        assert_eq!(unknown.confidence_label, ConfidenceLevel::NoData);
    }

    #[test]
    fn timeframe_aliases_reach_the_store() {
        let cfg = FilterConfig::default();
        let results = pipeline().evaluate_all(&[opp("EURUSD", "1h", "bullish_engulfing", 90)], &cfg);
        let ev = results[0].ev.as_ref().unwrap();
        assert_eq!(ev.sample_size, 40);
        assert_eq!(ev.timeframe, "H1");
    }

    #[test]
    fn ranking_breaks_ties_deterministically() {
        let cfg = FilterConfig::default();
        let input = vec![
            opp("USDJPY", "H1", "pin_bar", 95),
            opp("GBPUSD", "H1", "bullish_engulfing", 80),
            opp("EURUSD", "H1", "bullish_engulfing", 80),
            opp("AUDUSD", "H1", "bullish_engulfing", 90),
            opp("NZDUSD", "M15", "bullish_engulfing", 99),
            opp("CADJPY", "H1", "pin_bar", 10),
        ];
        let results = pipeline().evaluate_all(&input, &cfg);
        let ranked: Vec<&str> = rank(&results)
            .iter()
            .map(|r| r.opportunity.symbol.as_str())
            .collect();
        assert_eq!(ranked, vec!["AUDUSD", "EURUSD", "GBPUSD", "USDJPY", "NZDUSD"]);
    }

    #[test]
    fn diagnose_all_reports_every_rule() {
        let cfg = FilterConfig::default();
        let mut bad = opp("GBPUSD", "H1", "bullish_engulfing", 85);
        bad.volume = 10.0;
        bad.is_retail_trap = true;
        let results = pipeline().diagnose_all(&[bad], &cfg);
        let v = &results[0].verdict;
        assert_eq!(v.first_failed_rule, Some(Rule::Volume));
        assert_eq!(v.rule_diagnostics.len(), cfg.enabled_rules().len());
        assert!(v.failed_rules().contains(&Rule::RetailTrap));
    }

    #[tokio::test]
    async fn shared_config_is_snapshotted_per_batch() {
        let shared = FilterConfig::default().shared();
        let mut low_volume = opp("EURUSD", "H1", "bullish_engulfing", 90);
        low_volume.volume = 1.0;
        let p = pipeline();

        let before = p.evaluate_shared(&[low_volume.clone()], &shared).await;
        assert!(!before[0].verdict.passed);

        shared.write().await.set("volume_filter", false);
        let after = p.evaluate_shared(&[low_volume], &shared).await;
        assert!(after[0].verdict.passed);
    }
}
