use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

use crate::config::Config;
use crate::core::aggregator::{CandleAggregator, IngestOutcome};
use crate::core::indicators::IndicatorSnapshot;
use crate::core::sessions::{self, SessionManager};
use crate::core::DetectionContext;
use crate::feed::{FeedEvent, TickFeed};
use crate::models::{RawTick, Tick};
use crate::strategies::pattern_engine::PatternEngine;
use crate::strategies::qualifier::SignalQualifier;
use crate::strategies::signals::Signal;
use crate::trading::emission::{EmissionGate, EmitOutcome};
use crate::trading::sink::SignalSink;
use crate::trading::stats::EngineStats;

/// Wall clock as fractional unix seconds.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Owns the whole pipeline: aggregation, detection, qualification and
/// emission. Driven from a single task, so nothing here is shared.
pub struct SignalEngine {
    cfg: Config,
    aggregator: CandleAggregator,
    patterns: PatternEngine,
    qualifier: SignalQualifier,
    gate: EmissionGate,
    session: SessionManager,
    stats: EngineStats,
}

impl SignalEngine {
    pub fn new(cfg: Config, sink: Box<dyn SignalSink>) -> Self {
        let patterns = PatternEngine::new(&cfg);

        info!("{}", "=".repeat(60));
        info!("Signal engine starting up");
        let tfs: Vec<&str> = cfg.timeframes.iter().map(|tf| tf.as_str()).collect();
        info!(
            "Timeframes: {} | signals on {} | history {} candles",
            tfs.join("+"),
            cfg.signal_timeframe,
            cfg.history_capacity
        );
        let enabled: Vec<&str> = patterns.enabled().iter().map(|p| p.as_str()).collect();
        info!("Patterns: {}", enabled.join(", "));
        info!(
            "Min R:R {:.2} | cooldown {:.0}s | dedup window {:.0}s | stale after {:.0}s",
            cfg.effective_min_rr(),
            cfg.cooldown_secs,
            cfg.dedup_window_secs,
            cfg.stale_after_secs
        );
        info!("{}", "=".repeat(60));

        Self {
            aggregator: CandleAggregator::new(&cfg.timeframes, cfg.history_capacity),
            qualifier: SignalQualifier::new(&cfg),
            gate: EmissionGate::new(&cfg, sink),
            session: SessionManager::new(&cfg),
            stats: EngineStats::default(),
            patterns,
            cfg,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn aggregator(&self) -> &CandleAggregator {
        &self.aggregator
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Normalizes and aggregates one raw tick. Returns true when it changed
    /// candle state.
    pub fn ingest(&mut self, raw: &RawTick, received_at: f64) -> bool {
        self.ingest_tick(raw, received_at).is_some()
    }

    fn ingest_tick(&mut self, raw: &RawTick, received_at: f64) -> Option<Tick> {
        self.stats.ticks_received += 1;
        let tick = match raw.normalize(received_at) {
            Ok(t) => t,
            Err(e) => {
                self.stats.ticks_rejected += 1;
                debug!("Rejected tick: {}", e);
                return None;
            }
        };

        match self.aggregator.ingest(&tick) {
            IngestOutcome::Applied { sealed } => {
                self.stats.candles_sealed += sealed as u64;
                Some(tick)
            }
            IngestOutcome::Duplicate => {
                self.stats.ticks_duplicate += 1;
                None
            }
            IngestOutcome::OutOfOrder => {
                self.stats.ticks_out_of_order += 1;
                None
            }
        }
    }

    /// Evaluates every known symbol once and returns the signals emitted.
    pub fn scan(&mut self, now: f64) -> Vec<Signal> {
        self.stats.scans += 1;
        if self.session.update(&self.cfg, now) {
            info!(
                "Session: {} (weight {:.2})",
                self.session.current_session, self.session.session_weight
            );
        }

        let mut emitted = Vec::new();
        for symbol in self.aggregator.symbols() {
            if let Some(signal) = self.scan_symbol(&symbol, now) {
                emitted.push(signal);
            }
        }
        emitted
    }

    fn scan_symbol(&mut self, symbol: &str, now: f64) -> Option<Signal> {
        let tf = self.cfg.signal_timeframe;
        let candles = self.aggregator.series(symbol, tf)?;
        let last_tick_at = self.aggregator.last_tick_at(symbol)?;

        let snapshot = IndicatorSnapshot::compute(symbol, &candles, &self.cfg, last_tick_at);
        if !snapshot.is_ready() {
            trace!("{}: not ready ({} {} candles)", symbol, candles.len(), tf);
            return None;
        }

        let ctx = DetectionContext {
            symbol,
            candles: &candles,
            snapshot: &snapshot,
            pip_size: self.cfg.pip_size(symbol),
        };
        let best = self.patterns.evaluate(&ctx)?;
        self.stats.record_match(best.pattern_type);

        let session = sessions::classify(&self.cfg, now);
        let signal = match self.qualifier.qualify(&best, &snapshot, session, now) {
            Ok(s) => s,
            Err(reason) => {
                self.stats.record_rejection(reason.code());
                debug!(
                    "{} {} {} rejected [{}]: {}",
                    symbol,
                    best.pattern_type,
                    best.direction,
                    reason.code(),
                    reason
                );
                return None;
            }
        };

        let outcome = self.gate.offer(&signal, now);
        self.stats.record_outcome(outcome);
        (outcome == EmitOutcome::Emitted).then_some(signal)
    }

    /// Live loop: ticks from `feed`, scans on a fixed interval, periodic
    /// status lines. Returns on Ctrl+C or when the feed closes.
    pub async fn run<F: TickFeed + ?Sized>(&mut self, feed: &mut F) -> Result<()> {
        info!("Engine is now running. Press Ctrl+C to stop.");

        let scan_every = Duration::from_millis(self.cfg.scan_interval_ms.max(1));
        let mut scan_timer = tokio::time::interval(scan_every);
        scan_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut status_timer =
            tokio::time::interval(Duration::from_secs(self.cfg.status_interval_secs.max(1)));
        status_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick of an interval fires immediately
        status_timer.tick().await;

        let poll = Duration::from_millis(self.cfg.poll_timeout_ms);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                _ = scan_timer.tick() => {
                    self.scan(now_secs());
                }
                _ = status_timer.tick() => {
                    self.log_status();
                }
                event = feed.next_event(poll) => {
                    match event {
                        Ok(FeedEvent::Tick(raw)) => {
                            self.ingest(&raw, now_secs());
                        }
                        Ok(FeedEvent::Malformed(msg)) => {
                            self.stats.ticks_received += 1;
                            self.stats.ticks_rejected += 1;
                            debug!("Malformed feed message: {}", msg);
                        }
                        Ok(FeedEvent::Idle) => {}
                        Ok(FeedEvent::Closed) => {
                            info!("Tick feed closed");
                            self.scan(now_secs());
                            break Ok(());
                        }
                        Err(e) => {
                            error!("Tick feed failed: {:#}", e);
                            break Err(e);
                        }
                    }
                }
            }
        };

        self.shutdown();
        result
    }

    /// Drives the pipeline from recorded ticks. The clock is the latest tick
    /// timestamp, and scans fire whenever it crosses a scan interval.
    pub async fn replay<F: TickFeed + ?Sized>(&mut self, feed: &mut F) -> Result<Vec<Signal>> {
        let interval = self.cfg.scan_interval_ms as f64 / 1000.0;
        let poll = Duration::from_millis(self.cfg.poll_timeout_ms);
        let mut clock: Option<f64> = None;
        let mut next_scan = f64::NEG_INFINITY;
        let mut emitted = Vec::new();

        loop {
            match feed.next_event(poll).await? {
                FeedEvent::Tick(raw) => {
                    let received_at = clock.unwrap_or_else(now_secs);
                    let Some(tick) = self.ingest_tick(&raw, received_at) else {
                        continue;
                    };
                    let now = clock.map_or(tick.timestamp, |c| c.max(tick.timestamp));
                    clock = Some(now);
                    if now >= next_scan {
                        emitted.extend(self.scan(now));
                        next_scan = now + interval;
                    }
                }
                FeedEvent::Malformed(msg) => {
                    self.stats.ticks_received += 1;
                    self.stats.ticks_rejected += 1;
                    debug!("Malformed replay record: {}", msg);
                }
                FeedEvent::Idle => {}
                FeedEvent::Closed => break,
            }
        }

        if let Some(now) = clock {
            emitted.extend(self.scan(now));
        }
        self.shutdown();
        Ok(emitted)
    }

    pub fn log_status(&self) {
        info!(
            "Session: {} | high liquidity: {}",
            self.session.current_session,
            self.session.is_high_liquidity()
        );
        self.stats.log_status(self.aggregator.symbols().len());
    }

    fn shutdown(&self) {
        info!("Shutting down...");
        self.log_status();
        info!("Signal engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{default_test_config, BASE_TS};
    use crate::trading::sink::MemorySink;

    fn engine() -> (SignalEngine, MemorySink) {
        let sink = MemorySink::new();
        (SignalEngine::new(default_test_config(), Box::new(sink.clone())), sink)
    }

    #[test]
    fn counts_rejected_and_duplicate_ticks() {
        let (mut e, _) = engine();
        let t = BASE_TS as f64;
        assert!(e.ingest(&RawTick::mid("EURUSD", 1.1, t), t));
        assert!(!e.ingest(&RawTick::mid("EURUSD", 1.1, t), t));
        assert!(!e.ingest(&RawTick::mid("EURUSD", 1.1, t - 5.0), t));
        assert!(!e.ingest(&RawTick::default(), t));
        let s = e.stats();
        assert_eq!(s.ticks_received, 4);
        assert_eq!(s.ticks_duplicate, 1);
        assert_eq!(s.ticks_out_of_order, 1);
        assert_eq!(s.ticks_rejected, 1);
    }

    #[test]
    fn short_history_emits_nothing() {
        let (mut e, sink) = engine();
        let t = BASE_TS as f64;
        for i in 0..5 {
            e.ingest(&RawTick::mid("EURUSD", 1.1 + i as f64 * 0.001, t + i as f64 * 60.0), t);
        }
        assert!(e.scan(t + 241.0).is_empty());
        assert!(sink.is_empty());
        assert_eq!(e.stats().total_matches(), 0);
    }

    #[tokio::test]
    async fn replay_of_empty_feed_is_a_no_op() {
        let (mut e, _) = engine();
        let mut feed = crate::feed::ReplayFeed::new(Vec::new());
        let out = e.replay(&mut feed).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(e.stats().scans, 0);
    }
}
