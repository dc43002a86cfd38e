use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use elite_guard::config::Config;
use elite_guard::engine::SignalEngine;
use elite_guard::feed::JsonLinesFeed;
use elite_guard::trading::sink::{JsonLinesSink, SignalSink};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.to_lowercase()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    cfg.validate()?;

    // replay <ticks.jsonl> [signals.jsonl]
    let args: Vec<String> = std::env::args().collect();
    let input = args
        .get(1)
        .context("usage: replay <ticks.jsonl> [signals.jsonl]")?
        .clone();
    let output = args.get(2).cloned();

    let sink: Box<dyn SignalSink> = match &output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating signal file {}", path))?;
            Box::new(JsonLinesSink::new(std::io::BufWriter::new(file)))
        }
        None => Box::new(JsonLinesSink::stdout()),
    };

    info!("{}", "=".repeat(60));
    info!("REPLAY");
    info!("Input:  {}", input);
    info!("Output: {}", output.as_deref().unwrap_or("stdout"));
    info!("{}", "=".repeat(60));

    let mut feed = JsonLinesFeed::open(&input).await?;
    let mut engine = SignalEngine::new(cfg, sink);
    let signals = engine.replay(&mut feed).await?;

    let mut by_pattern: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_symbol: BTreeMap<&str, usize> = BTreeMap::new();
    for s in &signals {
        *by_pattern.entry(s.pattern_type.as_str()).or_insert(0) += 1;
        *by_symbol.entry(s.symbol.as_str()).or_insert(0) += 1;
    }

    info!("Signals emitted: {}", signals.len());
    info!("By pattern:");
    for (pattern, n) in &by_pattern {
        info!("  {}: {}", pattern, n);
    }
    info!("By symbol:");
    for (symbol, n) in &by_symbol {
        info!("  {}: {}", symbol, n);
    }

    Ok(())
}
