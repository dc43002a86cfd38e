#![allow(dead_code)]

use elite_guard::config::Config;
use elite_guard::models::{Direction, PatternType, RawTick, Session, Timeframe};
use elite_guard::strategies::signals::Signal;

/// 2024-01-17 13:00:00 UTC, 08:00 ET (London/NY overlap).
pub const BASE_TS: f64 = 1_705_496_400.0;

/// Four mid ticks per one-minute candle: open, high, low, close at
/// +0s, +15s, +30s, +45s.
pub fn candle_ticks(symbol: &str, minute: usize, ohlc: (f64, f64, f64, f64)) -> Vec<RawTick> {
    let start = BASE_TS + minute as f64 * 60.0;
    let (o, h, l, c) = ohlc;
    vec![
        RawTick::mid(symbol, o, start),
        RawTick::mid(symbol, h, start + 15.0),
        RawTick::mid(symbol, l, start + 30.0),
        RawTick::mid(symbol, c, start + 45.0),
    ]
}

pub fn ticks_for(symbol: &str, candles: &[(f64, f64, f64, f64)]) -> Vec<RawTick> {
    candles
        .iter()
        .enumerate()
        .flat_map(|(i, &ohlc)| candle_ticks(symbol, i, ohlc))
        .collect()
}

/// 15 ordinary bars, then 5 tight bars: a compression window of
/// 1.09990 - 1.10015 (2.5 pips) against an ATR of roughly 7.4 pips.
pub fn compression_setup() -> Vec<(f64, f64, f64, f64)> {
    let mut bars = vec![(1.1000, 1.1006, 1.0996, 1.1002); 15];
    bars.extend(vec![(1.1000, 1.10015, 1.0999, 1.1001); 5]);
    bars
}

/// Timestamp of the last tick of bar `minute`.
pub fn close_ts(minute: usize) -> f64 {
    BASE_TS + minute as f64 * 60.0 + 45.0
}

pub fn test_config() -> Config {
    Config {
        log_level: "ERROR".to_string(),
        ..Config::default()
    }
}

pub fn make_signal(symbol: &str, entry: f64, created_at: f64) -> Signal {
    Signal {
        signal_id: format!("{}-VCB_BREAKOUT-{}", symbol, (created_at * 1000.0) as i64),
        symbol: symbol.to_string(),
        direction: Direction::Buy,
        entry_price: entry,
        stop_loss: entry - 0.0010,
        take_profit: entry + 0.0020,
        stop_pips: 10.0,
        target_pips: 20.0,
        risk_reward: 2.0,
        confidence: 80.0,
        pattern_type: PatternType::VolatilityCompressionBreakout,
        session: Session::Overlap,
        timeframe: Timeframe::M1,
        created_at,
    }
}
