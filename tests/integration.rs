mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use elite_guard::config::Config;
use elite_guard::core::indicators::IndicatorSnapshot;
use elite_guard::core::PatternMatch;
use elite_guard::engine::SignalEngine;
use elite_guard::feed::{ChannelFeed, JsonLinesFeed, ReplayFeed};
use elite_guard::models::{Direction, PatternType, RawTick, Session, Timeframe};
use elite_guard::strategies::qualifier::{RejectReason, SignalQualifier};
use elite_guard::trading::emission::{EmissionGate, EmitOutcome};
use elite_guard::trading::sink::MemorySink;

use common::*;

const BREAKOUT_30: (f64, f64, f64, f64) = (1.10010, 1.10025, 1.10005, 1.10023);
const BREAKOUT_10: (f64, f64, f64, f64) = (1.10010, 1.10025, 1.10005, 1.10018);

fn engine_with(cfg: Config) -> (SignalEngine, MemorySink) {
    let sink = MemorySink::new();
    (SignalEngine::new(cfg, Box::new(sink.clone())), sink)
}

fn ingest_all(engine: &mut SignalEngine, ticks: &[RawTick]) {
    for t in ticks {
        engine.ingest(t, BASE_TS);
    }
}

fn breakout_ticks(breakout: (f64, f64, f64, f64)) -> Vec<RawTick> {
    let mut bars = compression_setup();
    bars.push(breakout);
    ticks_for("EURUSD", &bars)
}

#[test]
fn compression_breakout_emits_once() {
    let (mut engine, sink) = engine_with(test_config());
    ingest_all(&mut engine, &breakout_ticks(BREAKOUT_30));

    let now = close_ts(20) + 1.0;
    let signals = engine.scan(now);
    assert_eq!(signals.len(), 1);

    let s = &signals[0];
    assert_eq!(s.symbol, "EURUSD");
    assert_eq!(s.direction, Direction::Buy);
    assert_eq!(s.pattern_type, PatternType::VolatilityCompressionBreakout);
    assert_eq!(s.session, Session::Overlap);
    assert_eq!(s.timeframe, Timeframe::M1);
    assert!((s.entry_price - 1.10015).abs() < 1e-9);
    assert!((s.stop_loss - 1.09970).abs() < 1e-9);
    assert!((s.take_profit - 1.10105).abs() < 1e-9);
    assert!((s.stop_pips - 4.5).abs() < 1e-9);
    assert!(s.risk_reward >= 1.4);
    assert!((s.risk_reward - 2.0).abs() < 1e-6);
    // (70 + 20 * 0.32) * 1.15
    assert!((s.confidence - 87.9).abs() < 1e-9);

    // Same setup on the next scan: cooldown holds it back
    assert!(engine.scan(now + 1.0).is_empty());
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.signals()[0], *s);
    assert_eq!(engine.stats().emitted, 1);
    assert_eq!(engine.stats().suppressed["COOLDOWN"], 1);
}

#[test]
fn shallow_breakout_is_not_a_match() {
    let (mut engine, sink) = engine_with(test_config());
    ingest_all(&mut engine, &breakout_ticks(BREAKOUT_10));

    assert!(engine.scan(close_ts(20) + 1.0).is_empty());
    assert!(sink.is_empty());
    assert_eq!(engine.stats().total_matches(), 0);
}

#[test]
fn cooldown_between_breakout_sequences() {
    let mut cfg = test_config();
    cfg.cooldown_secs = 5.0;
    cfg.dedup_window_secs = 0.0;
    let (mut engine, sink) = engine_with(cfg);
    ingest_all(&mut engine, &breakout_ticks(BREAKOUT_30));

    let t1 = close_ts(20);
    assert_eq!(engine.scan(t1).len(), 1);

    engine.ingest(&RawTick::mid("EURUSD", 1.10024, t1 + 2.0), t1 + 2.0);
    assert!(engine.scan(t1 + 2.0).is_empty());

    engine.ingest(&RawTick::mid("EURUSD", 1.10022, t1 + 6.0), t1 + 6.0);
    let third = engine.scan(t1 + 6.0);
    assert_eq!(third.len(), 1);
    assert!((third[0].created_at - (t1 + 6.0)).abs() < 1e-9);

    assert_eq!(sink.len(), 2);
    assert_eq!(engine.stats().suppressed["COOLDOWN"], 1);
}

#[test]
fn malformed_tick_leaves_state_unchanged() {
    let (mut engine, _) = engine_with(test_config());
    ingest_all(&mut engine, &ticks_for("EURUSD", &compression_setup()));

    let before = engine.aggregator().series("EURUSD", Timeframe::M1).unwrap();
    let last_before = engine.aggregator().last_tick_at("EURUSD");

    let raw = RawTick::from_json(r#"{"symbol": "EURUSD"}"#).unwrap();
    assert!(!engine.ingest(&raw, close_ts(19) + 1.0));

    let after = engine.aggregator().series("EURUSD", Timeframe::M1).unwrap();
    assert_eq!(before.as_slice(), after.as_slice());
    assert_eq!(engine.aggregator().last_tick_at("EURUSD"), last_before);
    assert_eq!(engine.stats().ticks_rejected, 1);
}

#[test]
fn rr_below_floor_is_rejected() {
    let q = SignalQualifier::new(&test_config());
    let now = close_ts(20) + 1.0;
    let snapshot = IndicatorSnapshot {
        symbol: "EURUSD".to_string(),
        candles: 21,
        atr14: Some(0.0007),
        compression: None,
        momentum_score: 1.0,
        velocity: 0.0,
        acceleration: 0.0,
        volume_ratio: 1.0,
        last_close: Some(1.1002),
        last_tick_at: now - 1.0,
    };
    // Stop 1.0997 (4.5 pips of risk), structural target 4.95 pips away
    let m = PatternMatch {
        pattern_type: PatternType::LiquiditySweepReversal,
        symbol: "EURUSD".to_string(),
        direction: Direction::Buy,
        trigger_level: 1.10015,
        invalidation_level: 1.0999,
        structure_range: 0.0010,
        target_level: Some(1.100645),
        raw_confidence: 80.0,
        metadata: BTreeMap::new(),
    };

    match q.qualify(&m, &snapshot, Session::Overlap, now) {
        Err(RejectReason::InsufficientRr { rr, .. }) => assert!((rr - 1.1).abs() < 1e-6),
        other => panic!("expected INSUFFICIENT_RR, got {:?}", other),
    }
}

#[test]
fn reingesting_the_same_stream_is_idempotent() {
    let (mut engine, sink) = engine_with(test_config());
    let ticks = breakout_ticks(BREAKOUT_30);
    ingest_all(&mut engine, &ticks);
    let once = engine.aggregator().series("EURUSD", Timeframe::M1).unwrap();

    ingest_all(&mut engine, &ticks);
    let twice = engine.aggregator().series("EURUSD", Timeframe::M1).unwrap();
    assert_eq!(once.as_slice(), twice.as_slice());

    let stats = engine.stats();
    assert_eq!(stats.ticks_out_of_order + stats.ticks_duplicate, ticks.len() as u64);

    engine.scan(close_ts(20) + 1.0);
    assert_eq!(sink.len(), 1);
}

#[test]
fn higher_timeframes_aggregate_alongside() {
    let (mut engine, _) = engine_with(test_config());
    ingest_all(&mut engine, &breakout_ticks(BREAKOUT_30));

    let m5 = engine.aggregator().series("EURUSD", Timeframe::M5).unwrap();
    // 21 minutes starting on a 5-minute boundary: 4 sealed + 1 active
    assert_eq!(m5.len(), 5);
    assert!((m5[0].high - 1.1006).abs() < 1e-9);
    assert_eq!(m5[0].volume, 20);
    assert!(m5.iter().all(|c| c.is_consistent()));
}

#[test]
fn symbols_are_evaluated_independently() {
    let (mut engine, sink) = engine_with(test_config());
    ingest_all(&mut engine, &breakout_ticks(BREAKOUT_30));

    // Same shape shifted up, with the shallow breakout that must not fire
    let mut bars = compression_setup();
    bars.push(BREAKOUT_10);
    let gbp: Vec<_> = bars
        .into_iter()
        .map(|(o, h, l, c)| (o + 0.15, h + 0.15, l + 0.15, c + 0.15))
        .collect();
    ingest_all(&mut engine, &ticks_for("gbp/usd", &gbp));

    let signals = engine.scan(close_ts(20) + 1.0);
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].symbol, "EURUSD");
    assert_eq!(engine.aggregator().symbols(), vec!["EURUSD", "GBPUSD"]);
    assert_eq!(sink.len(), 1);
}

#[test]
fn emission_gate_cooldown_window() {
    let mut cfg = test_config();
    cfg.cooldown_secs = 5.0;
    let sink = MemorySink::new();
    let mut gate = EmissionGate::new(&cfg, Box::new(sink.clone()));

    let t0 = close_ts(20);
    assert!(gate.try_emit(&make_signal("EURUSD", 1.1000, t0), t0));
    assert_eq!(
        gate.offer(&make_signal("EURUSD", 1.1010, t0 + 2.0), t0 + 2.0),
        EmitOutcome::Cooldown
    );
    assert!(gate.try_emit(&make_signal("EURUSD", 1.1020, t0 + 6.0), t0 + 6.0));
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn replay_uses_tick_time() {
    let (mut engine, sink) = engine_with(test_config());
    let mut feed = ReplayFeed::new(breakout_ticks(BREAKOUT_30));

    let signals = engine.replay(&mut feed).await.unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(
        signals[0].pattern_type,
        PatternType::VolatilityCompressionBreakout
    );
    assert!((signals[0].entry_price - 1.10015).abs() < 1e-9);
    // Fired on the first tick that cleared the margin, not on the close
    assert!(signals[0].created_at < close_ts(20));
    assert_eq!(sink.len(), 1);
    assert_eq!(feed.remaining(), 0);
}

#[tokio::test]
async fn live_loop_runs_until_feed_closes() {
    let (mut engine, sink) = engine_with(test_config());
    let (tx, mut feed) = ChannelFeed::channel(16);
    let ticks = breakout_ticks(BREAKOUT_30);
    let total = ticks.len() as u64 + 1;

    let producer = tokio::spawn(async move {
        let (head, tail) = ticks.split_at(40);
        for t in head {
            tx.send(t.clone()).await.unwrap();
        }
        // Longer than the poll timeout, so the loop sees an idle feed
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(RawTick::default()).await.unwrap();
        for t in tail {
            tx.send(t.clone()).await.unwrap();
        }
    });

    engine.run(&mut feed).await.unwrap();
    producer.await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.ticks_received, total);
    assert_eq!(stats.ticks_rejected, 1);
    // Interval scan at startup plus the final scan on close
    assert!(stats.scans >= 2);
    // Final scan saw the breakout, but the wall clock is far past the last tick
    assert!(stats.rejections["STALE_DATA"] >= 1);
    assert!(sink.is_empty());
    assert_eq!(engine.aggregator().last_tick_at("EURUSD"), Some(close_ts(20)));
}

#[tokio::test]
async fn live_loop_survives_undecodable_records() {
    let (mut engine, _) = engine_with(test_config());
    let mut input = b"{\"symbol\":\"EURUSD\",\"mid\":1.1,\"timestamp\":1705496400}\n".to_vec();
    input.extend_from_slice(b"not json\n");
    input.extend_from_slice(b"{\"symbol\":\"EUR\xffUSD\",\"mid\":1.1}\n");
    input.extend_from_slice(b"{\"symbol\":\"EURUSD\",\"mid\":1.1002,\"timestamp\":1705496415}\n");
    let mut feed = JsonLinesFeed::new(tokio::io::BufReader::new(&input[..]));

    engine.run(&mut feed).await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.ticks_received, 4);
    assert_eq!(stats.ticks_rejected, 2);
    assert_eq!(engine.aggregator().last_tick_at("EURUSD"), Some(BASE_TS + 15.0));
}
