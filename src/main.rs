use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use elite_guard::config::Config;
use elite_guard::engine::SignalEngine;
use elite_guard::feed::JsonLinesFeed;
use elite_guard::trading::sink::JsonLinesSink;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;

    // Logs go to stderr; stdout carries the signal stream
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.to_lowercase()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    cfg.validate()?;

    let mut feed = JsonLinesFeed::stdin();
    let mut engine = SignalEngine::new(cfg, Box::new(JsonLinesSink::stdout()));
    engine.run(&mut feed).await?;

    Ok(())
}
