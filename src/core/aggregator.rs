use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

use crate::models::{Candle, CandleSeries, Tick, Timeframe};

/// Result of offering one tick to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Applied to the active candle(s); `sealed` counts buckets that rolled over.
    Applied { sealed: usize },
    /// Identical to the previous accepted tick for the symbol.
    Duplicate,
    /// Older than the previous accepted tick for the symbol.
    OutOfOrder,
}

/// Active candle plus a bounded, append-only history of sealed candles.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    timeframe: Timeframe,
    capacity: usize,
    active: Option<Candle>,
    sealed: VecDeque<Candle>,
}

impl CandleBuffer {
    pub fn new(timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            timeframe,
            capacity: capacity.max(1),
            active: None,
            sealed: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Returns true when the tick sealed the previous candle.
    fn apply(&mut self, tick: &Tick) -> bool {
        let bucket = self.timeframe.bucket_start(tick.timestamp);

        match self.active.as_ref().map(|c| c.bucket_start) {
            Some(current) if current == bucket => {
                if let Some(active) = self.active.as_mut() {
                    active.update(tick.mid, tick.volume);
                }
                false
            }
            Some(current) if bucket < current => {
                // Callers filter out-of-order ticks first; never reopen a bucket.
                false
            }
            _ => {
                let rolled = self.active.replace(Candle::open_with(tick, self.timeframe));
                match rolled {
                    Some(prev) => {
                        trace!(
                            "sealed {} {} candle @ {}",
                            prev.symbol,
                            self.timeframe,
                            prev.bucket_start
                        );
                        self.sealed.push_back(prev);
                        while self.sealed.len() > self.capacity {
                            self.sealed.pop_front();
                        }
                        true
                    }
                    None => false,
                }
            }
        }
    }

    pub fn active(&self) -> Option<&Candle> {
        self.active.as_ref()
    }

    pub fn sealed(&self) -> impl Iterator<Item = &Candle> {
        self.sealed.iter()
    }

    pub fn sealed_len(&self) -> usize {
        self.sealed.len()
    }

    /// Copy of sealed history followed by the active candle.
    pub fn view(&self) -> CandleSeries {
        let mut candles: Vec<Candle> = self.sealed.iter().cloned().collect();
        if let Some(active) = &self.active {
            candles.push(active.clone());
        }
        CandleSeries::new(candles)
    }
}

#[derive(Debug, Clone)]
struct SymbolBook {
    buffers: Vec<CandleBuffer>,
    last_tick: Option<(f64, f64, u64)>,
}

/// Buckets ticks into OHLC candles per symbol and timeframe.
/// Sole owner and writer of candle history.
pub struct CandleAggregator {
    timeframes: Vec<Timeframe>,
    capacity: usize,
    books: HashMap<String, SymbolBook>,
}

impl CandleAggregator {
    pub fn new(timeframes: &[Timeframe], capacity: usize) -> Self {
        Self {
            timeframes: timeframes.to_vec(),
            capacity,
            books: HashMap::new(),
        }
    }

    pub fn ingest(&mut self, tick: &Tick) -> IngestOutcome {
        let book = self
            .books
            .entry(tick.symbol.clone())
            .or_insert_with(|| SymbolBook {
                buffers: self
                    .timeframes
                    .iter()
                    .map(|&tf| CandleBuffer::new(tf, self.capacity))
                    .collect(),
                last_tick: None,
            });

        if let Some((ts, mid, volume)) = book.last_tick {
            if tick.timestamp < ts {
                debug!(
                    "{}: dropping out-of-order tick ({:.3} < {:.3})",
                    tick.symbol, tick.timestamp, ts
                );
                return IngestOutcome::OutOfOrder;
            }
            if tick.timestamp == ts && tick.mid == mid && tick.volume == volume {
                trace!("{}: duplicate tick @ {:.3}", tick.symbol, ts);
                return IngestOutcome::Duplicate;
            }
        }

        let sealed = book
            .buffers
            .iter_mut()
            .map(|b| b.apply(tick))
            .filter(|&sealed| sealed)
            .count();
        book.last_tick = Some((tick.timestamp, tick.mid, tick.volume));
        IngestOutcome::Applied { sealed }
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.books.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn buffer(&self, symbol: &str, timeframe: Timeframe) -> Option<&CandleBuffer> {
        self.books
            .get(symbol)?
            .buffers
            .iter()
            .find(|b| b.timeframe == timeframe)
    }

    /// Read-only copy of history (sealed + active) for one symbol/timeframe.
    pub fn series(&self, symbol: &str, timeframe: Timeframe) -> Option<CandleSeries> {
        self.buffer(symbol, timeframe).map(CandleBuffer::view)
    }

    /// Timestamp of the last accepted tick for `symbol`.
    pub fn last_tick_at(&self, symbol: &str) -> Option<f64> {
        self.books.get(symbol)?.last_tick.map(|(ts, _, _)| ts)
    }
}
