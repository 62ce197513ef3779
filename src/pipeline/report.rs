use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::filter_config::Rule;
use crate::pipeline::evaluator::{rank, EvaluatedOpportunity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub total: usize,
    pub passed: usize,
    pub rejected: usize,
    pub pass_rate: f64,
    pub positive_ev: usize,
    pub no_data: usize,
    pub rejections_by_rule: BTreeMap<Rule, usize>,
    pub best: Option<BestPick>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestPick {
    pub symbol: String,
    pub timeframe: String,
    pub pattern: String,
    pub adjusted_expected_value: f64,
}

impl PipelineSummary {
    pub fn from_results(results: &[EvaluatedOpportunity]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.verdict.passed).count();

        let mut rejections_by_rule = BTreeMap::new();
        for rule in results.iter().filter_map(|r| r.verdict.first_failed_rule) {
            *rejections_by_rule.entry(rule).or_insert(0) += 1;
        }

        let scored: Vec<_> = results.iter().filter_map(|r| r.ev.as_ref()).collect();
        let positive_ev = scored
            .iter()
            .filter(|e| e.adjusted_expected_value > 0.0)
            .count();
        let no_data = scored.iter().filter(|e| !e.has_data()).count();

        let best = rank(results).first().and_then(|r| {
            let ev = r.ev.as_ref()?;
            Some(BestPick {
                symbol: r.opportunity.symbol.clone(),
                timeframe: r.opportunity.timeframe.clone(),
                pattern: r.opportunity.pattern.clone(),
                adjusted_expected_value: ev.adjusted_expected_value,
            })
        });

        Self {
            total,
            passed,
            rejected: total - passed,
            pass_rate: if total > 0 {
                passed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            positive_ev,
            no_data,
            rejections_by_rule,
            best,
        }
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", "=".repeat(60));
        println!("  OPPORTUNITY EVALUATION SUMMARY");
        println!("{}", "=".repeat(60));
        println!("  Evaluated:    {}", self.total);
        println!("  Passed:       {} ({:.1}%)", self.passed, self.pass_rate);
        println!("  Rejected:     {}", self.rejected);
        println!("  Positive EV:  {}", self.positive_ev);
        println!("  No data:      {}", self.no_data);

        if !self.rejections_by_rule.is_empty() {
            println!();
            println!("  Rejections by rule:");
            for (rule, count) in &self.rejections_by_rule {
                println!("    {:<24} {}", rule.name(), count);
            }
        }

        if let Some(best) = &self.best {
            println!();
            println!(
                "  Best: {} {} {} EV {:+.4}R",
                best.symbol, best.timeframe, best.pattern, best.adjusted_expected_value
            );
        }
        println!("{}", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expected_value::ExpectedValueEngine;
    use crate::core::filter_config::FilterConfig;
    use crate::pipeline::evaluator::OpportunityPipeline;
    use crate::test_helpers::{passing_opportunity, stats, test_context};
    use crate::trading::pattern_store::PatternStore;

    #[test]
    fn counts_and_best_pick() {
        let mut store = PatternStore::new();
        store.insert("H1", "bullish_engulfing", stats(28, 12, 1.8, 1.0));
        store.insert("H1", "pin_bar", stats(5, 15, 1.0, 1.0));
        let pipeline = OpportunityPipeline::new(ExpectedValueEngine::new(store), test_context());

        let mut low_q = passing_opportunity();
        low_q.quality_score = 20;
        let mut low_vol = passing_opportunity();
        low_vol.volume = 1.0;
        let mut no_vol = passing_opportunity();
        no_vol.volume = 0.0;
        let mut loser = passing_opportunity();
        loser.symbol = "GBPUSD".to_string();
        loser.pattern = "pin_bar".to_string();
        let mut unknown = passing_opportunity();
        unknown.pattern = "unseen".to_string();

        let results = pipeline.evaluate_all(
            &[passing_opportunity(), low_q, low_vol, no_vol, loser, unknown],
            &FilterConfig::default(),
        );
        let summary = PipelineSummary::from_results(&results);

        assert_eq!(summary.total, 6);
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.rejected, 3);
        assert!((summary.pass_rate - 50.0).abs() < 1e-9);
        assert_eq!(summary.positive_ev, 1);
        assert_eq!(summary.no_data, 1);
        assert_eq!(summary.rejections_by_rule.get(&Rule::QualityScore), Some(&1));
        assert_eq!(summary.rejections_by_rule.get(&Rule::Volume), Some(&2));

        let best = summary.best.unwrap();
        assert_eq!(best.pattern, "bullish_engulfing");
        assert!((best.adjusted_expected_value - 0.96).abs() < 1e-9);
    }

    #[test]
    fn empty_batch() {
        let summary = PipelineSummary::from_results(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.pass_rate, 0.0);
        assert!(summary.best.is_none());
        assert!(summary.rejections_by_rule.is_empty());
    }
}
