pub mod aggregator;
pub mod compression;
pub mod indicators;
pub mod liquidity;
pub mod momentum;
pub mod order_blocks;
pub mod sessions;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::indicators::IndicatorSnapshot;
use crate::models::{CandleSeries, Direction, PatternType};

/// Candidate produced by one detector invocation. Never mutated; either
/// promoted to a signal or dropped within the same scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_type: PatternType,
    pub symbol: String,
    pub direction: Direction,
    /// Conservative entry: the structural level that triggered the pattern.
    pub trigger_level: f64,
    /// Level whose violation invalidates the setup; the stop is placed beyond it.
    pub invalidation_level: f64,
    /// Size of the structure that produced the setup.
    pub structure_range: f64,
    /// Structural target, when the pattern defines one.
    pub target_level: Option<f64>,
    pub raw_confidence: f64,
    pub metadata: BTreeMap<String, f64>,
}

/// Everything a detector may look at for one symbol.
pub struct DetectionContext<'a> {
    pub symbol: &'a str,
    /// Sealed history followed by the active candle.
    pub candles: &'a CandleSeries,
    pub snapshot: &'a IndicatorSnapshot,
    pub pip_size: f64,
}

pub trait PatternDetector: Send + Sync {
    fn pattern_type(&self) -> PatternType;

    /// At most one match per call. `None` covers both "no pattern" and
    /// "not enough data".
    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<PatternMatch>;
}

/// A gate of 0 (or below) is disabled.
pub(crate) fn passes_volume_gate(gate: f64, volume_ratio: f64) -> bool {
    gate <= 0.0 || volume_ratio >= gate
}
