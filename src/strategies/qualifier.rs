use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::core::indicators::IndicatorSnapshot;
use crate::core::PatternMatch;
use crate::models::{Session, Timeframe};
use crate::strategies::signals::Signal;

/// Why a pattern match was not promoted. These are expected outcomes,
/// surfaced through logs and counters only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("risk:reward {rr:.2} below floor {min:.2}")]
    InsufficientRr { rr: f64, min: f64 },
    #[error("ATR not available (insufficient history)")]
    AtrUnavailable,
    #[error("data is {age:.1}s old (limit {limit:.1}s)")]
    StaleData { age: f64, limit: f64 },
    #[error("confidence {confidence:.1} below pattern minimum {min:.1}")]
    LowConfidence { confidence: f64, min: f64 },
    #[error("invalid trade geometry: {0}")]
    InvalidGeometry(String),
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::InsufficientRr { .. } => "INSUFFICIENT_RR",
            RejectReason::AtrUnavailable => "ATR_UNAVAILABLE",
            RejectReason::StaleData { .. } => "STALE_DATA",
            RejectReason::LowConfidence { .. } => "LOW_CONFIDENCE",
            RejectReason::InvalidGeometry(_) => "INVALID_GEOMETRY",
        }
    }
}

/// Turns a pattern match into a risk-vetted `Signal`.
pub struct SignalQualifier {
    cfg: Config,
    timeframe: Timeframe,
}

impl SignalQualifier {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            timeframe: cfg.signal_timeframe,
        }
    }

    pub fn min_rr(&self) -> f64 {
        self.cfg.effective_min_rr()
    }

    pub fn qualify(
        &self,
        m: &PatternMatch,
        snap: &IndicatorSnapshot,
        session: Session,
        now: f64,
    ) -> Result<Signal, RejectReason> {
        let age = now - snap.last_tick_at;
        if age > self.cfg.stale_after_secs {
            return Err(RejectReason::StaleData {
                age,
                limit: self.cfg.stale_after_secs,
            });
        }
        if snap.atr14.is_none() {
            return Err(RejectReason::AtrUnavailable);
        }

        let pip = self.cfg.pip_size(&m.symbol);
        let sign = m.direction.sign();

        // Entry is the structural trigger, never the live price
        let entry = m.trigger_level;
        let stop = m.invalidation_level - sign * self.cfg.stop_buffer_pips * pip;
        let risk = (entry - stop) * sign;
        if !(risk > 0.0) || !risk.is_finite() {
            return Err(RejectReason::InvalidGeometry(format!(
                "stop {:.5} is not beyond entry {:.5} for {}",
                stop, entry, m.direction
            )));
        }

        let take_profit = match m.target_level {
            Some(target) => target,
            None => entry + sign * (self.cfg.rr_target * risk).max(m.structure_range),
        };
        let reward = (take_profit - entry) * sign;
        if !(reward > 0.0) || !reward.is_finite() {
            return Err(RejectReason::InvalidGeometry(format!(
                "target {:.5} is not beyond entry {:.5} for {}",
                take_profit, entry, m.direction
            )));
        }

        let rr = reward / risk;
        let min_rr = self.min_rr();
        if rr < min_rr {
            return Err(RejectReason::InsufficientRr { rr, min: min_rr });
        }

        let confidence = self.confidence(m.raw_confidence, session, snap.volume_ratio);
        let min_conf = self
            .cfg
            .pattern(m.pattern_type)
            .map_or(0.0, |p| p.min_confidence);
        if confidence < min_conf {
            return Err(RejectReason::LowConfidence {
                confidence,
                min: min_conf,
            });
        }

        let decimals = price_decimals(pip);
        let signal = Signal {
            signal_id: format!(
                "{}-{}-{}",
                m.symbol,
                m.pattern_type.as_str(),
                (now * 1000.0).round() as i64
            ),
            symbol: m.symbol.clone(),
            direction: m.direction,
            entry_price: round_to(entry, decimals),
            stop_loss: round_to(stop, decimals),
            take_profit: round_to(take_profit, decimals),
            stop_pips: round_to(risk / pip, 2),
            target_pips: round_to(reward / pip, 2),
            risk_reward: rr,
            confidence: round_to(confidence, 1).clamp(0.0, 100.0),
            pattern_type: m.pattern_type,
            session,
            timeframe: self.timeframe,
            created_at: now,
        };

        debug!(
            "{} {} {} qualified: entry {:.5} SL {:.5} TP {:.5} R:R {:.2} conf {:.1}",
            signal.symbol,
            signal.pattern_type,
            signal.direction,
            entry,
            stop,
            take_profit,
            rr,
            confidence
        );
        Ok(signal)
    }

    /// `raw * session weight + volume bonus`, clamped to [0, 100].
    pub fn confidence(&self, raw: f64, session: Session, volume_ratio: f64) -> f64 {
        let bonus = ((volume_ratio - 1.0).max(0.0) * self.cfg.volume_bonus_per_unit)
            .min(self.cfg.max_volume_bonus);
        let value = raw * self.cfg.session_weight(session) + bonus;
        if value.is_finite() {
            value.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

fn price_decimals(pip: f64) -> i32 {
    ((-pip.log10()).round() as i32 + 1).clamp(0, 8)
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}
