use tracing::{debug, info};

use crate::config::Config;
use crate::core::compression::CompressionBreakoutDetector;
use crate::core::liquidity::LiquiditySweepDetector;
use crate::core::momentum::MomentumBurstDetector;
use crate::core::order_blocks::OrderBlockDetector;
use crate::core::{DetectionContext, PatternDetector, PatternMatch};
use crate::models::PatternType;

/// Runs every enabled detector against one symbol's view and picks the
/// strongest candidate.
pub struct PatternEngine {
    detectors: Vec<Box<dyn PatternDetector>>,
    priority: Vec<PatternType>,
}

impl PatternEngine {
    pub fn new(cfg: &Config) -> Self {
        let mut detectors: Vec<Box<dyn PatternDetector>> = Vec::new();
        for pattern in PatternType::ALL {
            let enabled = cfg.pattern(pattern).map_or(false, |p| p.enabled);
            if !enabled {
                info!("Pattern {} disabled", pattern);
                continue;
            }
            let detector = match pattern {
                PatternType::VolatilityCompressionBreakout => {
                    CompressionBreakoutDetector::from_config(cfg).map(boxed)
                }
                PatternType::LiquiditySweepReversal => {
                    LiquiditySweepDetector::from_config(cfg).map(boxed)
                }
                PatternType::OrderBlockBounce => OrderBlockDetector::from_config(cfg).map(boxed),
                PatternType::MomentumBurst => MomentumBurstDetector::from_config(cfg).map(boxed),
            };
            if let Some(d) = detector {
                detectors.push(d);
            }
        }

        Self {
            detectors,
            priority: cfg.pattern_priority.clone(),
        }
    }

    pub fn from_detectors(
        detectors: Vec<Box<dyn PatternDetector>>,
        priority: Vec<PatternType>,
    ) -> Self {
        Self {
            detectors,
            priority,
        }
    }

    pub fn enabled(&self) -> Vec<PatternType> {
        self.detectors.iter().map(|d| d.pattern_type()).collect()
    }

    /// Every candidate for this view, in detector order.
    pub fn evaluate_all(&self, ctx: &DetectionContext<'_>) -> Vec<PatternMatch> {
        self.detectors
            .iter()
            .filter_map(|d| {
                let m = d.detect(ctx);
                if let Some(ref m) = m {
                    debug!(
                        "{}: {} {} trigger {:.5} raw {:.1}",
                        ctx.symbol, m.pattern_type, m.direction, m.trigger_level, m.raw_confidence
                    );
                }
                m
            })
            .collect()
    }

    /// Highest raw confidence wins; ties go to the earlier pattern in the
    /// priority list.
    pub fn select(&self, candidates: Vec<PatternMatch>) -> Option<PatternMatch> {
        candidates.into_iter().reduce(|best, m| {
            if m.raw_confidence > best.raw_confidence
                || (m.raw_confidence == best.raw_confidence
                    && self.rank(m.pattern_type) < self.rank(best.pattern_type))
            {
                m
            } else {
                best
            }
        })
    }

    /// One candidate per symbol per cycle. Qualification happens after
    /// selection, so a rejected winner leaves the symbol silent until the
    /// next scan even if a lower-ranked match would have qualified.
    pub fn evaluate(&self, ctx: &DetectionContext<'_>) -> Option<PatternMatch> {
        self.select(self.evaluate_all(ctx))
    }

    fn rank(&self, pattern: PatternType) -> usize {
        self.priority
            .iter()
            .position(|p| *p == pattern)
            .unwrap_or(usize::MAX)
    }
}

fn boxed<D: PatternDetector + 'static>(detector: D) -> Box<dyn PatternDetector> {
    Box::new(detector)
}
