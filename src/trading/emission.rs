use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::{Direction, PatternType};
use crate::strategies::signals::Signal;
use crate::trading::sink::SignalSink;

/// What happened to a signal offered to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Emitted,
    Cooldown,
    Duplicate,
    BelowFloor,
    SinkFailed,
}

impl EmitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmitOutcome::Emitted => "EMITTED",
            EmitOutcome::Cooldown => "COOLDOWN",
            EmitOutcome::Duplicate => "DUPLICATE",
            EmitOutcome::BelowFloor => "BELOW_RR_FLOOR",
            EmitOutcome::SinkFailed => "SINK_FAILED",
        }
    }
}

/// Same setup at the same level, measured in whole pips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    symbol: String,
    pattern: PatternType,
    direction: Direction,
    trigger_pips: i64,
}

/// Per-symbol emission bookkeeping.
#[derive(Debug, Default)]
pub struct CooldownState {
    last_emitted: HashMap<String, f64>,
    recent: HashMap<DedupKey, f64>,
}

impl CooldownState {
    pub fn last_emitted(&self, symbol: &str) -> Option<f64> {
        self.last_emitted.get(symbol).copied()
    }

    fn prune(&mut self, now: f64, window: f64) {
        self.recent.retain(|_, at| now - *at < window);
    }
}

/// Final gate before the sink: re-checks the risk:reward floor, applies the
/// per-symbol cooldown and drops repeats of a recent setup.
pub struct EmissionGate {
    sink: Box<dyn SignalSink>,
    state: CooldownState,
    cooldown_secs: f64,
    dedup_window_secs: f64,
    min_rr: f64,
    cfg: Config,
}

impl EmissionGate {
    pub fn new(cfg: &Config, sink: Box<dyn SignalSink>) -> Self {
        Self {
            sink,
            state: CooldownState::default(),
            cooldown_secs: cfg.cooldown_secs,
            dedup_window_secs: cfg.dedup_window_secs,
            min_rr: cfg.effective_min_rr(),
            cfg: cfg.clone(),
        }
    }

    pub fn try_emit(&mut self, signal: &Signal, now: f64) -> bool {
        self.offer(signal, now) == EmitOutcome::Emitted
    }

    pub fn offer(&mut self, signal: &Signal, now: f64) -> EmitOutcome {
        if !(signal.risk_reward >= self.min_rr) {
            warn!(
                "{} {} blocked at emission: R:R {:.2} below {:.2}",
                signal.symbol, signal.pattern_type, signal.risk_reward, self.min_rr
            );
            return EmitOutcome::BelowFloor;
        }

        if let Some(last) = self.state.last_emitted(&signal.symbol) {
            let elapsed = now - last;
            if elapsed < self.cooldown_secs {
                debug!(
                    "{} {} suppressed: cooldown ({:.1}s of {:.0}s)",
                    signal.symbol, signal.pattern_type, elapsed, self.cooldown_secs
                );
                return EmitOutcome::Cooldown;
            }
        }

        self.state.prune(now, self.dedup_window_secs);
        let key = self.dedup_key(signal);
        if self.state.recent.contains_key(&key) {
            debug!(
                "{} {} {} suppressed: same setup at {:.5} within {:.0}s",
                signal.symbol,
                signal.pattern_type,
                signal.direction,
                signal.entry_price,
                self.dedup_window_secs
            );
            return EmitOutcome::Duplicate;
        }

        // Publish first; state only moves once the sink has accepted it
        if let Err(e) = self.sink.publish(signal) {
            error!("Failed to publish {}: {:#}", signal.signal_id, e);
            return EmitOutcome::SinkFailed;
        }

        self.state.last_emitted.insert(signal.symbol.clone(), now);
        self.state.recent.insert(key, now);

        info!(
            "SIGNAL {} {} {} @ {:.5} | SL {:.5} ({:.1}p) | TP {:.5} ({:.1}p) | R:R {:.2} | conf {:.1} | {}",
            signal.symbol,
            signal.direction,
            signal.pattern_type,
            signal.entry_price,
            signal.stop_loss,
            signal.stop_pips,
            signal.take_profit,
            signal.target_pips,
            signal.risk_reward,
            signal.confidence,
            signal.session
        );
        EmitOutcome::Emitted
    }

    pub fn last_emission(&self, symbol: &str) -> Option<f64> {
        self.state.last_emitted(symbol)
    }

    fn dedup_key(&self, signal: &Signal) -> DedupKey {
        let pip = self.cfg.pip_size(&signal.symbol);
        DedupKey {
            symbol: signal.symbol.clone(),
            pattern: signal.pattern_type,
            direction: signal.direction,
            trigger_pips: (signal.entry_price / pip).round() as i64,
        }
    }
}
