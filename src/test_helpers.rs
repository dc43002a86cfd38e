use crate::config::Config;
use crate::models::{Candle, CandleSeries, Direction, PatternType, Session, Timeframe};
use crate::strategies::signals::Signal;

/// 2024-01-17 13:00:00 UTC, 08:00 ET: inside the London/NY overlap.
pub const BASE_TS: i64 = 1_705_496_400;

/// Create candles from (open, high, low, close) tuples with auto-incrementing 1m buckets.
pub fn make_candles(data: &[(f64, f64, f64, f64)]) -> CandleSeries {
    let candles: Vec<Candle> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Candle {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::M1,
            bucket_start: BASE_TS + i as i64 * 60,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100,
        })
        .collect();

    CandleSeries::new(candles)
}

/// `n` bullish candles of `range` height oscillating around `center`.
pub fn make_ranging(n: usize, center: f64, range: f64) -> Vec<(f64, f64, f64, f64)> {
    (0..n)
        .map(|_| {
            (
                center,
                center + range * 0.6,
                center - range * 0.4,
                center + range * 0.2,
            )
        })
        .collect()
}

/// A Config suitable for testing, with quiet logging.
pub fn default_test_config() -> Config {
    Config {
        log_level: "ERROR".to_string(),
        ..Config::default()
    }
}

/// A qualified BUY signal: 10 pip stop, 20 pip target, created at `BASE_TS`.
pub fn make_signal(symbol: &str, entry: f64) -> Signal {
    Signal {
        signal_id: format!("{}-VCB_BREAKOUT-{}", symbol, BASE_TS * 1000),
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
        created_at: BASE_TS as f64,
    }
}
