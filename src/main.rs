use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use opportunity_pipeline::config::Config;
use opportunity_pipeline::core::expected_value::ExpectedValueEngine;
use opportunity_pipeline::core::filter_config::snapshot;
use opportunity_pipeline::models::Opportunity;
use opportunity_pipeline::pipeline::{rank, OpportunityPipeline, PipelineSummary};
use opportunity_pipeline::trading::pattern_store::PatternStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    // [opportunities_path] [--diagnose] [--json]
    let args: Vec<String> = std::env::args().skip(1).collect();
    let diagnose = cfg.diagnostic_mode || args.iter().any(|a| a == "--diagnose");
    let as_json = args.iter().any(|a| a == "--json");
    let opportunities_path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| cfg.opportunities_file.clone());

    let opportunities = load_opportunities(&opportunities_path).await?;
    let store = PatternStore::load_or_empty(&cfg.statistics_file);
    info!(
        "Loaded {} opportunities, {} pattern entries",
        opportunities.len(),
        store.len()
    );

    let shared = cfg.filters.clone().shared();
    let engine = ExpectedValueEngine::new(store).with_min_sample_size(cfg.min_sample_size);
    let pipeline = OpportunityPipeline::new(engine, cfg.session_clock());

    let results = if diagnose {
        let config = snapshot(&shared).await;
        pipeline.diagnose_all(&opportunities, &config)
    } else {
        pipeline.evaluate_shared(&opportunities, &shared).await
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!();
    println!(
        "{:<10} {:<4} {:<5} {:<24} {:>9} {:>9} {:>4} {:<9} {}",
        "SYMBOL", "TF", "DIR", "PATTERN", "RAW EV", "ADJ EV", "N", "CONF", "DECISION"
    );
    println!("{}", "-".repeat(96));
    for r in rank(&results) {
        let Some(ev) = &r.ev else { continue };
        let tradeable = pipeline.engine().should_trade(
            &r.opportunity.pattern,
            &r.opportunity.timeframe_key(),
            cfg.min_ev,
        );
        let decision = if tradeable {
            "TRADE"
        } else {
            "pass"
        };
        println!(
            "{:<10} {:<4} {:<5} {:<24} {:>+9.4} {:>+9.4} {:>4} {:<9} {}",
            r.opportunity.symbol,
            r.opportunity.timeframe,
            r.opportunity.direction,
            r.opportunity.pattern,
            ev.raw_expected_value,
            ev.adjusted_expected_value,
            ev.sample_size,
            ev.confidence_label,
            decision
        );
        println!("{:>14}{}", "", ev.recommendation);
    }

    let rejected: Vec<_> = results.iter().filter(|r| !r.verdict.passed).collect();
    if !rejected.is_empty() {
        println!();
        println!("Rejected:");
        for r in rejected {
            println!(
                "  {:<10} {:<4} [{}] {}",
                r.opportunity.symbol,
                r.opportunity.timeframe,
                r.verdict
                    .first_failed_rule
                    .map(|rule| rule.name())
                    .unwrap_or("-"),
                r.verdict.reason().unwrap_or("")
            );
            if diagnose {
                for d in r.verdict.rule_diagnostics.iter().filter(|d| !d.passed) {
                    println!("      {:<24} {}", d.rule_name.name(), d.message);
                }
            }
        }
    }

    PipelineSummary::from_results(&results).print_summary();

    Ok(())
}

/// Records that fail to parse are skipped with a warning.
async fn load_opportunities(path: &str) -> Result<Vec<Opportunity>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading opportunities from {}", path))?;
    let raw: Vec<serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array", path))?;

    let mut opportunities = Vec::with_capacity(raw.len());
    for (i, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<Opportunity>(value) {
            Ok(opp) => opportunities.push(opp),
            Err(e) => warn!("Skipping opportunity #{}: {}", i, e),
        }
    }
    Ok(opportunities)
}
