use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{Config, OrderBlockConfig, PatternConfig};
use crate::core::{passes_volume_gate, DetectionContext, PatternDetector, PatternMatch};
use crate::models::{CandleSeries, Direction, PatternType};

/// Last opposing candle before a displacement move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBlock {
    pub direction: Direction,
    pub high: f64,
    pub low: f64,
    /// Index of the displacement candle.
    pub index: usize,
    pub displacement: f64,
}

impl OrderBlock {
    pub fn height(&self) -> f64 {
        self.high - self.low
    }
}

pub struct OrderBlockDetector {
    settings: PatternConfig,
    params: OrderBlockConfig,
}

impl OrderBlockDetector {
    pub fn new(settings: PatternConfig, params: OrderBlockConfig) -> Self {
        Self { settings, params }
    }

    pub fn from_config(cfg: &Config) -> Option<Self> {
        let settings = cfg.pattern(PatternType::OrderBlockBounce)?.clone();
        Some(Self::new(settings, cfg.order_block.clone()))
    }

    /// Unmitigated order blocks formed before the latest candle, newest first.
    pub fn find_order_blocks(&self, candles: &CandleSeries) -> Vec<OrderBlock> {
        let len = candles.len();
        let mut blocks = Vec::new();
        if len < 3 {
            return blocks;
        }

        // Displacement candle index runs up to len - 2; the latest candle is the test
        let last_idx = len - 2;
        let first_idx = last_idx.saturating_sub(self.params.ob_lookback).max(1);

        for idx in (first_idx..=last_idx).rev() {
            let prev = &candles[idx - 1];
            let curr = &candles[idx];
            let after = candles.slice(idx + 1, len - 1);

            // Bullish OB: last down candle before a strong up move
            if prev.is_bearish() && curr.is_bullish() && curr.close > prev.high {
                if !after.any_close_below(prev.low) {
                    blocks.push(OrderBlock {
                        direction: Direction::Buy,
                        high: prev.high,
                        low: prev.low,
                        index: idx,
                        displacement: curr.close - prev.high,
                    });
                }
            }

            // Bearish OB: last up candle before a strong down move
            if prev.is_bullish() && curr.is_bearish() && curr.close < prev.low {
                if !after.any_close_above(prev.high) {
                    blocks.push(OrderBlock {
                        direction: Direction::Sell,
                        high: prev.high,
                        low: prev.low,
                        index: idx,
                        displacement: prev.low - curr.close,
                    });
                }
            }
        }
        blocks
    }
}

impl PatternDetector for OrderBlockDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::OrderBlockBounce
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<PatternMatch> {
        let snap = ctx.snapshot;
        let atr = snap.atr14?;
        let latest = ctx.candles.last()?;

        let body_ratio = latest.body_ratio();
        if body_ratio < self.params.rejection_ratio {
            return None;
        }
        if !passes_volume_gate(self.settings.volume_gate, snap.volume_ratio) {
            return None;
        }

        let block = self.find_order_blocks(ctx.candles).into_iter().find(|ob| {
            if ob.height() <= 0.0 {
                return false;
            }
            match ob.direction {
                Direction::Buy => {
                    latest.is_bullish()
                        && latest.low <= ob.high
                        && latest.low >= ob.low
                        && latest.close > ob.high
                }
                Direction::Sell => {
                    latest.is_bearish()
                        && latest.high >= ob.low
                        && latest.high <= ob.high
                        && latest.close < ob.low
                }
            }
        })?;

        let (trigger, invalidation) = match block.direction {
            Direction::Buy => (block.high, block.low),
            Direction::Sell => (block.low, block.high),
        };

        let raw_confidence = self.settings.base_confidence
            + 10.0 * body_ratio
            + 5.0 * (block.displacement / atr).min(1.0);

        let mut metadata = BTreeMap::new();
        metadata.insert("ob_high".to_string(), block.high);
        metadata.insert("ob_low".to_string(), block.low);
        metadata.insert("ob_age_bars".to_string(), (ctx.candles.len() - 1 - block.index) as f64);
        metadata.insert("displacement".to_string(), block.displacement);
        metadata.insert("body_ratio".to_string(), body_ratio);
        metadata.insert("atr".to_string(), atr);

        Some(PatternMatch {
            pattern_type: PatternType::OrderBlockBounce,
            symbol: ctx.symbol.to_string(),
            direction: block.direction,
            trigger_level: trigger,
            invalidation_level: invalidation,
            structure_range: block.height(),
            target_level: None,
            raw_confidence,
            metadata,
        })
    }
}
