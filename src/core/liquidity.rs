use std::collections::BTreeMap;
use tracing::trace;

use crate::config::{Config, PatternConfig, SweepConfig};
use crate::core::{passes_volume_gate, DetectionContext, PatternDetector, PatternMatch};
use crate::models::{CandleSeries, Direction, PatternType};

const MAX_SWEEP_BONUS: f64 = 15.0;

/// Liquidity sweep reversal: one of the last two candles wicks through the
/// most recent unswept swing level, and the latest candle closes back
/// inside the prior range.
pub struct LiquiditySweepDetector {
    settings: PatternConfig,
    params: SweepConfig,
}

/// Swing point inside the reference range: (index, price).
type Swing = (usize, f64);

impl LiquiditySweepDetector {
    pub fn new(settings: PatternConfig, params: SweepConfig) -> Self {
        Self { settings, params }
    }

    pub fn from_config(cfg: &Config) -> Option<Self> {
        let settings = cfg.pattern(PatternType::LiquiditySweepReversal)?.clone();
        Some(Self::new(settings, cfg.liquidity_sweep.clone()))
    }

    fn find_swing_highs(&self, candles: &CandleSeries) -> Vec<Swing> {
        let lb = self.params.swing_lookback;
        let len = candles.len();
        let mut highs = Vec::new();
        if len < lb * 2 + 1 {
            return highs;
        }

        for i in lb..(len - lb) {
            let current_high = candles[i].high;
            let is_swing = (i - lb..=i + lb).all(|j| j == i || candles[j].high <= current_high);
            if is_swing {
                highs.push((i, current_high));
            }
        }
        highs
    }

    fn find_swing_lows(&self, candles: &CandleSeries) -> Vec<Swing> {
        let lb = self.params.swing_lookback;
        let len = candles.len();
        let mut lows = Vec::new();
        if len < lb * 2 + 1 {
            return lows;
        }

        for i in lb..(len - lb) {
            let current_low = candles[i].low;
            let is_swing = (i - lb..=i + lb).all(|j| j == i || candles[j].low >= current_low);
            if is_swing {
                lows.push((i, current_low));
            }
        }
        lows
    }

    /// Most recent swing high not already traded through inside the range.
    fn unswept_high(&self, reference: &CandleSeries) -> Option<f64> {
        self.find_swing_highs(reference)
            .into_iter()
            .rev()
            .find(|&(idx, level)| !reference.as_slice()[idx + 1..].iter().any(|c| c.high > level))
            .map(|(_, level)| level)
    }

    fn unswept_low(&self, reference: &CandleSeries) -> Option<f64> {
        self.find_swing_lows(reference)
            .into_iter()
            .rev()
            .find(|&(idx, level)| !reference.as_slice()[idx + 1..].iter().any(|c| c.low < level))
            .map(|(_, level)| level)
    }
}

impl PatternDetector for LiquiditySweepDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::LiquiditySweepReversal
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<PatternMatch> {
        let snap = ctx.snapshot;
        let atr = snap.atr14?;
        let len = ctx.candles.len();
        if len < 3 {
            return None;
        }

        let ref_end = len - 2;
        let reference = ctx
            .candles
            .slice(ref_end.saturating_sub(self.params.range_lookback), ref_end);
        let range_hi = reference.highs_max();
        let range_lo = reference.lows_min();

        let latest = &ctx.candles[len - 1];
        let prior = &ctx.candles[len - 2];
        let min_sweep = self.params.min_sweep_pips * ctx.pip_size;

        let mut found: Option<(Direction, f64, f64, f64, f64)> = None;

        if latest.is_bearish() {
            if let Some(level) = self.unswept_high(&reference) {
                let extreme = latest.high.max(prior.high);
                let distance = extreme - level;
                if distance >= min_sweep && latest.close < level {
                    found = Some((Direction::Sell, level, extreme, distance, range_lo));
                }
            }
        } else if latest.is_bullish() {
            if let Some(level) = self.unswept_low(&reference) {
                let extreme = latest.low.min(prior.low);
                let distance = level - extreme;
                if distance >= min_sweep && latest.close > level {
                    found = Some((Direction::Buy, level, extreme, distance, range_hi));
                }
            }
        }

        let (direction, level, extreme, distance, target) = found?;

        // Either volume or momentum confirms the sweep
        let confirmed = passes_volume_gate(self.settings.volume_gate, snap.volume_ratio)
            || snap.momentum_score >= self.params.min_momentum;
        if !confirmed {
            trace!(
                "{}: sweep of {:.5} unconfirmed (volume {:.2}, momentum {:.2})",
                ctx.symbol,
                level,
                snap.volume_ratio,
                snap.momentum_score
            );
            return None;
        }

        let raw_confidence =
            self.settings.base_confidence + (10.0 * distance / atr).min(MAX_SWEEP_BONUS);

        let mut metadata = BTreeMap::new();
        metadata.insert("swept_level".to_string(), level);
        metadata.insert("sweep_extreme".to_string(), extreme);
        metadata.insert("sweep_pips".to_string(), distance / ctx.pip_size);
        metadata.insert("range_hi".to_string(), range_hi);
        metadata.insert("range_lo".to_string(), range_lo);
        metadata.insert("volume_ratio".to_string(), snap.volume_ratio);
        metadata.insert("momentum".to_string(), snap.momentum_score);
        metadata.insert("atr".to_string(), atr);

        Some(PatternMatch {
            pattern_type: PatternType::LiquiditySweepReversal,
            symbol: ctx.symbol.to_string(),
            direction,
            trigger_level: level,
            invalidation_level: extreme,
            structure_range: range_hi - range_lo,
            target_level: Some(target),
            raw_confidence,
            metadata,
        })
    }
}
