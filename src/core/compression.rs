use std::collections::BTreeMap;
use tracing::trace;

use crate::config::{CompressionConfig, Config, PatternConfig};
use crate::core::{passes_volume_gate, DetectionContext, PatternDetector, PatternMatch};
use crate::models::{Direction, PatternType};

const EXCESS_CONFIDENCE_SPAN: f64 = 20.0;

/// Volatility-compression breakout: a tight window (range well under ATR)
/// followed by a close that clears the window by a margin of its own range.
pub struct CompressionBreakoutDetector {
    settings: PatternConfig,
    params: CompressionConfig,
}

impl CompressionBreakoutDetector {
    pub fn new(settings: PatternConfig, params: CompressionConfig) -> Self {
        Self { settings, params }
    }

    pub fn from_config(cfg: &Config) -> Option<Self> {
        let settings = cfg.pattern(PatternType::VolatilityCompressionBreakout)?.clone();
        Some(Self::new(settings, cfg.compression.clone()))
    }
}

impl PatternDetector for CompressionBreakoutDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::VolatilityCompressionBreakout
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<PatternMatch> {
        let snap = ctx.snapshot;
        let atr = snap.atr14?;
        let window = snap.compression.as_ref()?;
        let latest = ctx.candles.last()?;

        if window.range <= 0.0 {
            return None;
        }

        let margin = self.params.close_pct_fraction * window.range;
        let buy_level = window.hi + margin;
        let sell_level = window.lo - margin;

        // Candles between the window and the latest bar must not have broken out already
        let between = ctx
            .candles
            .slice(window.end_index + 1, ctx.candles.len().saturating_sub(1));
        if between.any_close_above(buy_level) || between.any_close_below(sell_level) {
            trace!("{}: compression breakout already taken", ctx.symbol);
            return None;
        }

        let (direction, trigger, invalidation, excess) = if latest.close >= buy_level {
            (Direction::Buy, window.hi, window.lo, latest.close - window.hi)
        } else if latest.close <= sell_level {
            (Direction::Sell, window.lo, window.hi, window.lo - latest.close)
        } else {
            return None;
        };

        if !passes_volume_gate(self.settings.volume_gate, snap.volume_ratio) {
            trace!(
                "{}: breakout volume ratio {:.2} below gate {:.2}",
                ctx.symbol,
                snap.volume_ratio,
                self.settings.volume_gate
            );
            return None;
        }

        let excess_fraction = excess / window.range;
        let raw_confidence =
            self.settings.base_confidence + EXCESS_CONFIDENCE_SPAN * excess_fraction.min(1.0);

        let mut metadata = BTreeMap::new();
        metadata.insert("compression_hi".to_string(), window.hi);
        metadata.insert("compression_lo".to_string(), window.lo);
        metadata.insert("compression_range".to_string(), window.range);
        metadata.insert("compression_ratio".to_string(), window.ratio);
        metadata.insert(
            "compression_bars".to_string(),
            (window.end_index + 1 - window.start_index) as f64,
        );
        metadata.insert("breakout_close".to_string(), latest.close);
        metadata.insert("excess_fraction".to_string(), excess_fraction);
        metadata.insert("atr".to_string(), atr);

        Some(PatternMatch {
            pattern_type: PatternType::VolatilityCompressionBreakout,
            symbol: ctx.symbol.to_string(),
            direction,
            trigger_level: trigger,
            invalidation_level: invalidation,
            structure_range: window.range,
            target_level: None,
            raw_confidence,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::indicators::IndicatorSnapshot;
    use crate::models::CandleSeries;
    use crate::test_helpers::{default_test_config, make_candles, make_ranging};

    fn run(data: &[(f64, f64, f64, f64)]) -> Option<PatternMatch> {
        let cfg = default_test_config();
        let candles = make_candles(data);
        detect_on(&cfg, &candles)
    }

    fn detect_on(cfg: &Config, candles: &CandleSeries) -> Option<PatternMatch> {
        let snap = IndicatorSnapshot::compute("EURUSD", candles, cfg, 0.0);
        let detector = CompressionBreakoutDetector::from_config(cfg).unwrap();
        detector.detect(&DetectionContext {
            symbol: "EURUSD",
            candles,
            snapshot: &snap,
            pip_size: 0.0001,
        })
    }

    fn setup() -> Vec<(f64, f64, f64, f64)> {
        let mut data = make_ranging(15, 1.1000, 0.0010);
        // hi 1.10012, lo 1.09992, range 0.0002
        data.extend(make_ranging(5, 1.1000, 0.0002));
        data
    }

    #[test]
    fn bullish_breakout_beyond_margin() {
        let mut data = setup();
        // 30% of the range above the high
        data.push((1.10004, 1.10018, 1.10004, 1.10018));
        let m = run(&data).unwrap();
        assert_eq!(m.direction, Direction::Buy);
        assert!((m.trigger_level - 1.10012).abs() < 1e-9);
        assert!((m.invalidation_level - 1.09992).abs() < 1e-9);
        assert!((m.structure_range - 0.0002).abs() < 1e-9);
        assert!((m.raw_confidence - 76.0).abs() < 1e-6);
    }

    #[test]
    fn bearish_breakout_beyond_margin() {
        let mut data = setup();
        data.push((1.10004, 1.10004, 1.09984, 1.09984));
        let m = run(&data).unwrap();
        assert_eq!(m.direction, Direction::Sell);
        assert!((m.trigger_level - 1.09992).abs() < 1e-9);
    }

    #[test]
    fn shallow_breakout_is_ignored() {
        let mut data = setup();
        // Only 10% of the range above the high
        data.push((1.10004, 1.10014, 1.10004, 1.10014));
        assert!(run(&data).is_none());
    }

    #[test]
    fn no_compression_no_match() {
        let mut data = make_ranging(25, 1.1000, 0.0010);
        data.push((1.1000, 1.1030, 1.1000, 1.1030));
        assert!(run(&data).is_none());
    }

    #[test]
    fn not_ready_without_history() {
        let mut data = make_ranging(5, 1.1000, 0.0002);
        data.push((1.10004, 1.10030, 1.10004, 1.10030));
        assert!(run(&data).is_none());
    }

    #[test]
    fn volume_gate_blocks_quiet_breakout() {
        let mut cfg = default_test_config();
        cfg.patterns
            .get_mut(&PatternType::VolatilityCompressionBreakout)
            .unwrap()
            .volume_gate = 1.5;
        let mut data = setup();
        data.push((1.10004, 1.10018, 1.10004, 1.10018));
        let candles = make_candles(&data);
        assert!(detect_on(&cfg, &candles).is_none());
    }
}
