use std::collections::BTreeMap;

use crate::config::{Config, MomentumConfig, PatternConfig};
use crate::core::{passes_volume_gate, DetectionContext, PatternDetector, PatternMatch};
use crate::models::{Direction, PatternType};

const MAX_SCORE_BONUS: f64 = 15.0;

/// Momentum burst: score over threshold with velocity and the latest close
/// delta pointing the same way.
pub struct MomentumBurstDetector {
    settings: PatternConfig,
    params: MomentumConfig,
}

impl MomentumBurstDetector {
    pub fn new(settings: PatternConfig, params: MomentumConfig) -> Self {
        Self { settings, params }
    }

    pub fn from_config(cfg: &Config) -> Option<Self> {
        let settings = cfg.pattern(PatternType::MomentumBurst)?.clone();
        Some(Self::new(settings, cfg.momentum_burst.clone()))
    }
}

impl PatternDetector for MomentumBurstDetector {
    fn pattern_type(&self) -> PatternType {
        PatternType::MomentumBurst
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<PatternMatch> {
        let snap = ctx.snapshot;
        let atr = snap.atr14?;
        let score = snap.momentum_score;
        // A zero score means "too short", which never clears a positive threshold
        if score <= 0.0 || score < self.params.min_score {
            return None;
        }

        let len = ctx.candles.len();
        if len < 2 {
            return None;
        }
        let latest = &ctx.candles[len - 1];
        let last_delta = latest.close - ctx.candles[len - 2].close;

        let direction = Direction::from_delta(snap.velocity)?;
        if Direction::from_delta(last_delta) != Some(direction) {
            return None;
        }
        if !passes_volume_gate(self.settings.volume_gate, snap.volume_ratio) {
            return None;
        }

        let origin = ctx.candles.tail(self.params.origin_bars.max(1));
        let invalidation = match direction {
            Direction::Buy => origin.lows_min(),
            Direction::Sell => origin.highs_max(),
        };
        let trigger = latest.close;
        if (trigger - invalidation) * direction.sign() <= 0.0 {
            return None;
        }

        let raw_confidence =
            self.settings.base_confidence + (score - self.params.min_score).min(MAX_SCORE_BONUS);

        let mut metadata = BTreeMap::new();
        metadata.insert("momentum".to_string(), score);
        metadata.insert("velocity".to_string(), snap.velocity);
        metadata.insert("acceleration".to_string(), snap.acceleration);
        metadata.insert("volume_ratio".to_string(), snap.volume_ratio);
        metadata.insert("atr".to_string(), atr);

        Some(PatternMatch {
            pattern_type: PatternType::MomentumBurst,
            symbol: ctx.symbol.to_string(),
            direction,
            trigger_level: trigger,
            invalidation_level: invalidation,
            structure_range: atr,
            target_level: None,
            raw_confidence,
            metadata,
        })
    }
}
