use serde::{Deserialize, Serialize};

use crate::models::{Tick, Timeframe};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bucket_start: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    /// First tick of a new bucket.
    pub fn open_with(tick: &Tick, timeframe: Timeframe) -> Self {
        Self {
            symbol: tick.symbol.clone(),
            timeframe,
            bucket_start: timeframe.bucket_start(tick.timestamp),
            open: tick.mid,
            high: tick.mid,
            low: tick.mid,
            close: tick.mid,
            volume: tick.volume,
        }
    }

    /// Fold a subsequent tick of the same bucket into the candle.
    pub fn update(&mut self, price: f64, volume: u64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume = self.volume.saturating_add(volume);
    }

    /// `low <= open, close <= high`.
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn total_range(&self) -> f64 {
        self.high - self.low
    }

    /// Body as a fraction of the full range; 0 for a flat candle.
    pub fn body_ratio(&self) -> f64 {
        let range = self.total_range();
        if range > 0.0 {
            self.body() / range
        } else {
            0.0
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Read-only candle view handed to indicators and detectors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn tail(&self, n: usize) -> CandleSeries {
        let start = self.candles.len().saturating_sub(n);
        CandleSeries::new(self.candles[start..].to_vec())
    }

    pub fn slice(&self, start: usize, end: usize) -> CandleSeries {
        let s = start.min(self.candles.len());
        let e = end.min(self.candles.len()).max(s);
        CandleSeries::new(self.candles[s..e].to_vec())
    }

    /// Everything except the latest candle.
    pub fn without_last(&self) -> CandleSeries {
        self.slice(0, self.candles.len().saturating_sub(1))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn highs_max(&self) -> f64 {
        self.candles
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn lows_min(&self) -> f64 {
        self.candles
            .iter()
            .map(|c| c.low)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Check if any candle's close is above the given price
    pub fn any_close_above(&self, price: f64) -> bool {
        self.candles.iter().any(|c| c.close > price)
    }

    /// Check if any candle's close is below the given price
    pub fn any_close_below(&self, price: f64) -> bool {
        self.candles.iter().any(|c| c.close < price)
    }

    pub fn push(&mut self, candle: Candle) {
        self.candles.push(candle);
    }
}

impl From<Vec<Candle>> for CandleSeries {
    fn from(candles: Vec<Candle>) -> Self {
        Self::new(candles)
    }
}

impl std::ops::Index<usize> for CandleSeries {
    type Output = Candle;
    fn index(&self, index: usize) -> &Self::Output {
        &self.candles[index]
    }
}

impl IntoIterator for CandleSeries {
    type Item = Candle;
    type IntoIter = std::vec::IntoIter<Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}
