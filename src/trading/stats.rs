use std::collections::BTreeMap;
use tracing::info;

use crate::models::PatternType;
use crate::trading::emission::EmitOutcome;

/// Running counters for the status line.
#[derive(Debug, Default, Clone)]
pub struct EngineStats {
    pub ticks_received: u64,
    pub ticks_rejected: u64,
    pub ticks_duplicate: u64,
    pub ticks_out_of_order: u64,
    pub candles_sealed: u64,
    pub scans: u64,
    pub matches: BTreeMap<PatternType, u64>,
    pub rejections: BTreeMap<&'static str, u64>,
    pub suppressed: BTreeMap<&'static str, u64>,
    pub emitted: u64,
}

impl EngineStats {
    pub fn record_match(&mut self, pattern: PatternType) {
        *self.matches.entry(pattern).or_insert(0) += 1;
    }

    pub fn record_rejection(&mut self, code: &'static str) {
        *self.rejections.entry(code).or_insert(0) += 1;
    }

    pub fn record_outcome(&mut self, outcome: EmitOutcome) {
        match outcome {
            EmitOutcome::Emitted => self.emitted += 1,
            other => *self.suppressed.entry(other.as_str()).or_insert(0) += 1,
        }
    }

    pub fn total_matches(&self) -> u64 {
        self.matches.values().sum()
    }

    pub fn log_status(&self, symbols: usize) {
        info!("{}", "-".repeat(60));
        info!(
            "Ticks: {} ({} rejected, {} duplicate, {} out of order) | Symbols: {} | Candles sealed: {}",
            self.ticks_received,
            self.ticks_rejected,
            self.ticks_duplicate,
            self.ticks_out_of_order,
            symbols,
            self.candles_sealed
        );
        info!(
            "Scans: {} | Matches: {} | Signals emitted: {}",
            self.scans,
            self.total_matches(),
            self.emitted
        );
        for (pattern, count) in &self.matches {
            info!("  {}: {}", pattern, count);
        }
        if !self.rejections.is_empty() {
            let parts: Vec<String> = self
                .rejections
                .iter()
                .map(|(code, n)| format!("{}={}", code, n))
                .collect();
            info!("Rejected: {}", parts.join(" "));
        }
        if !self.suppressed.is_empty() {
            let parts: Vec<String> = self
                .suppressed
                .iter()
                .map(|(code, n)| format!("{}={}", code, n))
                .collect();
            info!("Suppressed: {}", parts.join(" "));
        }
        info!("{}", "-".repeat(60));
    }
}
