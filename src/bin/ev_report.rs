use anyhow::{bail, Result};
use tracing_subscriber::{fmt, EnvFilter};

use opportunity_pipeline::config::Config;
use opportunity_pipeline::core::expected_value::ExpectedValueEngine;
use opportunity_pipeline::models::Timeframe;
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

    // [timeframe] [pattern] [lookback]
    let args: Vec<String> = std::env::args().collect();

    let timeframe = match args.get(1) {
        Some(raw) => match Timeframe::from_str_loose(raw) {
            Some(tf) => tf,
            None => bail!("unknown timeframe '{}'", raw),
        },
        None => Timeframe::H1,
    };
    let pattern = args.get(2).cloned();
    let lookback: usize = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let store = PatternStore::load_or_empty(&cfg.statistics_file);
    let engine = ExpectedValueEngine::new(store).with_min_sample_size(cfg.min_sample_size);
    let tf = timeframe.as_str();

    println!("{}", "=".repeat(60));
    println!("  PATTERN EXPECTED VALUE: {}", tf);
    println!("{}", "=".repeat(60));

    let ranked = engine.rank_patterns(tf);
    if ranked.is_empty() {
        println!("  No pattern statistics for {}", tf);
    }
    for ev in &ranked {
        println!(
            "  {:<24} raw {:>+8.4}R  adj {:>+8.4}R  wr {:>5.1}%  n={:<4} {:<9}",
            ev.pattern,
            ev.raw_expected_value,
            ev.adjusted_expected_value,
            ev.win_rate * 100.0,
            ev.sample_size,
            ev.confidence_label.as_str(),
        );
        println!("  {:>24} {}", "", ev.recommendation);
    }

    if let Some(pattern) = pattern {
        let points = engine.trend(&pattern, tf, lookback);
        println!();
        println!("  EV trend: {} on {} ({} points)", pattern, tf, points.len());
        println!("{}", "-".repeat(60));
        for p in &points {
            println!(
                "  #{:<4} EV {:>+8.4}R  wr {:>5.1}%  n={}",
                p.trade_number,
                p.ev,
                p.win_rate * 100.0,
                p.sample_size
            );
        }
        if points.is_empty() {
            println!("  No trade history recorded for {}", pattern);
        }
    }
    println!("{}", "=".repeat(60));

    Ok(())
}
