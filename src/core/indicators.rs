//! Pure indicator functions over read-only candle history.
//!
//! "Not ready" is always `None`, never zero. The one exception is
//! `momentum`, which degrades to `0.0`; detectors gate on a positive
//! threshold so a zero score can never qualify.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::CandleSeries;

const VELOCITY_SCALE: f64 = 10_000.0;
const ACCELERATION_SCALE: f64 = 5_000.0;
const MOMENTUM_DELTAS: usize = 3;

/// Most recent low-volatility window found by `compression`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionWindow {
    pub start_index: usize,
    /// Inclusive.
    pub end_index: usize,
    pub range: f64,
    pub hi: f64,
    pub lo: f64,
    pub atr: f64,
    pub ratio: f64,
}

/// Bundle recomputed on demand for one symbol each scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub candles: usize,
    pub atr14: Option<f64>,
    /// Computed over the history preceding the latest candle.
    pub compression: Option<CompressionWindow>,
    pub momentum_score: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub volume_ratio: f64,
    pub last_close: Option<f64>,
    pub last_tick_at: f64,
}

impl IndicatorSnapshot {
    pub fn compute(symbol: &str, history: &CandleSeries, cfg: &Config, last_tick_at: f64) -> Self {
        let (velocity, acceleration) = velocity_acceleration(history).unwrap_or((0.0, 0.0));
        let prefix = history.without_last();
        Self {
            symbol: symbol.to_string(),
            candles: history.len(),
            atr14: atr(history, cfg.atr_period),
            compression: compression(
                &prefix,
                cfg.compression.min_bars,
                cfg.compression.ratio_threshold,
                cfg.compression.max_windows,
                cfg.atr_period,
            ),
            momentum_score: momentum(history),
            velocity,
            acceleration,
            volume_ratio: volume_ratio(history, cfg.volume_lookback),
            last_close: history.last().map(|c| c.close),
            last_tick_at,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.atr14.is_some()
    }
}

/// Average true range over the last `period` bars.
/// `None` unless there are at least `period + 1` candles.
pub fn atr(history: &CandleSeries, period: usize) -> Option<f64> {
    let len = history.len();
    if period == 0 || len < period + 1 {
        return None;
    }

    let sum: f64 = (len - period..len)
        .map(|i| {
            let c = &history[i];
            let prev_close = history[i - 1].close;
            (c.high - c.low)
                .max((c.high - prev_close).abs())
                .max((c.low - prev_close).abs())
        })
        .sum();

    let value = sum / period as f64;
    if value > 0.0 && value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Scan backward over windows of `min_bars` candles (at most `max_windows`
/// of them) and return the most recent one whose range is below
/// `ratio_threshold * ATR`.
pub fn compression(
    history: &CandleSeries,
    min_bars: usize,
    ratio_threshold: f64,
    max_windows: usize,
    atr_period: usize,
) -> Option<CompressionWindow> {
    let atr = atr(history, atr_period)?;
    let len = history.len();
    if min_bars == 0 || len < min_bars {
        return None;
    }

    for k in 0..max_windows {
        let end = match len.checked_sub(k) {
            Some(e) if e >= min_bars => e,
            _ => break,
        };
        let start = end - min_bars;
        let window = history.slice(start, end);
        let hi = window.highs_max();
        let lo = window.lows_min();
        let range = hi - lo;
        let ratio = range / atr;

        if ratio < ratio_threshold {
            return Some(CompressionWindow {
                start_index: start,
                end_index: end - 1,
                range,
                hi,
                lo,
                atr,
                ratio,
            });
        }
    }

    None
}

/// Velocity (mean of the last three close deltas) and acceleration
/// (last delta minus the one before).
pub fn velocity_acceleration(history: &CandleSeries) -> Option<(f64, f64)> {
    if history.len() < MOMENTUM_DELTAS + 1 {
        return None;
    }
    let closes = history.tail(MOMENTUM_DELTAS + 1).closes();
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let velocity = deltas.iter().sum::<f64>() / deltas.len() as f64;
    let acceleration = deltas[deltas.len() - 1] - deltas[deltas.len() - 2];
    Some((velocity, acceleration))
}

/// `|velocity * 10000| + |acceleration * 5000|`; `0.0` when history is too short.
pub fn momentum(history: &CandleSeries) -> f64 {
    match velocity_acceleration(history) {
        Some((v, a)) => (v * VELOCITY_SCALE).abs() + (a * ACCELERATION_SCALE).abs(),
        None => 0.0,
    }
}

/// Latest candle volume over the mean of the previous `lookback` candles.
/// Neutral `1.0` when there is nothing to compare against.
pub fn volume_ratio(history: &CandleSeries, lookback: usize) -> f64 {
    let len = history.len();
    if len < 2 || lookback == 0 {
        return 1.0;
    }
    let latest = history[len - 1].volume as f64;
    let prior = history.slice(len.saturating_sub(lookback + 1), len - 1);
    let mean = prior.iter().map(|c| c.volume as f64).sum::<f64>() / prior.len() as f64;
    if mean > 0.0 {
        latest / mean
    } else {
        1.0
    }
}
