use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::models::{PatternType, Session, Timeframe};

/// Risk:reward can never be configured below this.
pub const RR_FLOOR: f64 = 1.4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Wall-clock window in US/Eastern, stored as (hour, minute).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWindow {
    pub session: Session,
    pub start: (u32, u32),
    pub end: (u32, u32),
}

/// Settings every detector has.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    pub enabled: bool,
    pub base_confidence: f64,
    pub min_confidence: f64,
    /// Minimum volume ratio; 0 disables the gate.
    pub volume_gate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub min_bars: usize,
    pub ratio_threshold: f64,
    pub max_windows: usize,
    pub close_pct_fraction: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig {
            min_bars: 5,
            ratio_threshold: 0.9,
            max_windows: 10,
            close_pct_fraction: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub swing_lookback: usize,
    pub range_lookback: usize,
    pub min_sweep_pips: f64,
    pub min_momentum: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            swing_lookback: 3,
            range_lookback: 20,
            min_sweep_pips: 2.0,
            min_momentum: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBlockConfig {
    pub ob_lookback: usize,
    pub rejection_ratio: f64,
}

impl Default for OrderBlockConfig {
    fn default() -> Self {
        OrderBlockConfig {
            ob_lookback: 20,
            rejection_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub min_score: f64,
    pub origin_bars: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        MomentumConfig {
            min_score: 6.0,
            origin_bars: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Candles
    pub timeframes: Vec<Timeframe>,
    pub signal_timeframe: Timeframe,
    pub history_capacity: usize,

    // Indicators
    pub atr_period: usize,
    pub volume_lookback: usize,

    // Detectors
    pub compression: CompressionConfig,
    pub liquidity_sweep: SweepConfig,
    pub order_block: OrderBlockConfig,
    pub momentum_burst: MomentumConfig,
    pub patterns: HashMap<PatternType, PatternConfig>,
    pub pattern_priority: Vec<PatternType>,

    // Qualifier
    pub min_rr: f64,
    pub rr_target: f64,
    pub stop_buffer_pips: f64,
    pub stale_after_secs: f64,
    pub volume_bonus_per_unit: f64,
    pub max_volume_bonus: f64,

    // Sessions (checked in order, first match wins)
    pub sessions: Vec<SessionWindow>,
    pub session_weights: HashMap<Session, f64>,

    // Per-symbol pip sizes; see `pip_size` for the fallback rule
    pub pip_sizes: HashMap<String, f64>,

    // Emission gate
    pub cooldown_secs: f64,
    pub dedup_window_secs: f64,

    // Loop
    pub scan_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub status_interval_secs: u64,

    // Logging
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let sessions = vec![
            SessionWindow {
                session: Session::Overlap,
                start: (8, 0),
                end: (12, 0),
            },
            SessionWindow {
                session: Session::London,
                start: (3, 0),
                end: (12, 0),
            },
            SessionWindow {
                session: Session::Ny,
                start: (8, 0),
                end: (17, 0),
            },
            SessionWindow {
                session: Session::Asian,
                start: (19, 0),
                end: (3, 0),
            },
        ];

        let mut session_weights = HashMap::new();
        session_weights.insert(Session::Overlap, 1.15);
        session_weights.insert(Session::London, 1.10);
        session_weights.insert(Session::Ny, 1.05);
        session_weights.insert(Session::Asian, 0.85);
        session_weights.insert(Session::Other, 0.80);

        let mut patterns = HashMap::new();
        patterns.insert(
            PatternType::VolatilityCompressionBreakout,
            PatternConfig {
                enabled: true,
                base_confidence: 70.0,
                min_confidence: 65.0,
                volume_gate: 0.0,
            },
        );
        patterns.insert(
            PatternType::LiquiditySweepReversal,
            PatternConfig {
                enabled: true,
                base_confidence: 68.0,
                min_confidence: 65.0,
                volume_gate: 1.2,
            },
        );
        patterns.insert(
            PatternType::OrderBlockBounce,
            PatternConfig {
                enabled: true,
                base_confidence: 64.0,
                min_confidence: 65.0,
                volume_gate: 0.0,
            },
        );
        patterns.insert(
            PatternType::MomentumBurst,
            PatternConfig {
                enabled: true,
                base_confidence: 62.0,
                min_confidence: 68.0,
                volume_gate: 1.0,
            },
        );

        let mut pip_sizes = HashMap::new();
        pip_sizes.insert("XAUUSD".to_string(), 0.1);
        pip_sizes.insert("XAGUSD".to_string(), 0.01);
        pip_sizes.insert("USDJPY".to_string(), 0.01);

        Config {
            timeframes: vec![Timeframe::M1, Timeframe::M5, Timeframe::M15],
            signal_timeframe: Timeframe::M1,
            history_capacity: 240,
            atr_period: 14,
            volume_lookback: 20,
            compression: CompressionConfig::default(),
            liquidity_sweep: SweepConfig::default(),
            order_block: OrderBlockConfig::default(),
            momentum_burst: MomentumConfig::default(),
            patterns,
            pattern_priority: PatternType::ALL.to_vec(),
            min_rr: 1.5,
            rr_target: 2.0,
            stop_buffer_pips: 2.0,
            stale_after_secs: 5.0,
            volume_bonus_per_unit: 10.0,
            max_volume_bonus: 5.0,
            sessions,
            session_weights,
            pip_sizes,
            cooldown_secs: 10.0,
            dedup_window_secs: 300.0,
            scan_interval_ms: 1000,
            poll_timeout_ms: 50,
            status_interval_secs: 300,
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Defaults, then an optional JSON file named by `ELITE_GUARD_CONFIG`,
    /// then individual environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut cfg = match std::env::var("ELITE_GUARD_CONFIG") {
            Ok(path) if !path.is_empty() => Config::from_file(&path)?,
            _ => Config::default(),
        };

        if let Some(v) = env_parse("MIN_RR")? {
            cfg.min_rr = v;
        }
        if let Some(v) = env_parse("RR_TARGET")? {
            cfg.rr_target = v;
        }
        if let Some(v) = env_parse("COOLDOWN_SECONDS")? {
            cfg.cooldown_secs = v;
        }
        if let Some(v) = env_parse("DEDUP_WINDOW_SECONDS")? {
            cfg.dedup_window_secs = v;
        }
        if let Some(v) = env_parse("STALE_AFTER_SECONDS")? {
            cfg.stale_after_secs = v;
        }
        if let Some(v) = env_parse("STOP_BUFFER_PIPS")? {
            cfg.stop_buffer_pips = v;
        }
        if let Some(v) = env_parse("COMPRESSION_RATIO")? {
            cfg.compression.ratio_threshold = v;
        }
        if let Some(v) = env_parse("COMPRESSION_MIN_BARS")? {
            cfg.compression.min_bars = v;
        }
        if let Some(v) = env_parse("BREAKOUT_CLOSE_PCT")? {
            cfg.compression.close_pct_fraction = v;
        }
        if let Some(v) = env_parse("HISTORY_CAPACITY")? {
            cfg.history_capacity = v;
        }
        if let Some(v) = env_parse("SCAN_INTERVAL_MS")? {
            cfg.scan_interval_ms = v;
        }
        if let Ok(v) = std::env::var("SIGNAL_TIMEFRAME") {
            cfg.signal_timeframe =
                Timeframe::from_str_loose(&v).ok_or_else(|| ConfigError::InvalidEnv {
                    key: "SIGNAL_TIMEFRAME".to_string(),
                    value: v.clone(),
                })?;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            cfg.log_level = v;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let text = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })
    }

    /// Startup check. The only place configuration problems are fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.min_rr < RR_FLOOR {
            return invalid(format!("min_rr {} is below the {} floor", self.min_rr, RR_FLOOR));
        }
        if self.rr_target < self.min_rr {
            return invalid(format!(
                "rr_target {} is below min_rr {}",
                self.rr_target, self.min_rr
            ));
        }
        if self.timeframes.is_empty() {
            return invalid("no timeframes configured".to_string());
        }
        if !self.timeframes.contains(&self.signal_timeframe) {
            return invalid(format!(
                "signal_timeframe {} is not among the aggregated timeframes",
                self.signal_timeframe
            ));
        }
        if self.atr_period == 0 || self.compression.min_bars < 2 {
            return invalid("atr_period must be > 0 and compression.min_bars >= 2".to_string());
        }
        if self.history_capacity < self.atr_period + 1 {
            return invalid(format!(
                "history_capacity {} cannot hold {} bars of ATR history",
                self.history_capacity,
                self.atr_period + 1
            ));
        }
        if !(self.compression.ratio_threshold > 0.0) || self.compression.close_pct_fraction < 0.0 {
            return invalid("compression thresholds must be positive".to_string());
        }
        if self.cooldown_secs < 0.0 || self.dedup_window_secs < 0.0 {
            return invalid("cooldown and dedup windows must be non-negative".to_string());
        }
        if !(self.stale_after_secs > 0.0) {
            return invalid("stale_after_secs must be positive".to_string());
        }
        if self.stop_buffer_pips < 0.0 {
            return invalid("stop_buffer_pips must be non-negative".to_string());
        }
        for pattern in PatternType::ALL {
            match self.patterns.get(&pattern) {
                None => return invalid(format!("missing settings for pattern {}", pattern)),
                Some(p) if !(0.0..=100.0).contains(&p.min_confidence) => {
                    return invalid(format!("{} min_confidence out of range", pattern))
                }
                Some(_) => {}
            }
        }
        for (symbol, pip) in &self.pip_sizes {
            if !(*pip > 0.0) {
                return invalid(format!("pip size for {} must be positive", symbol));
            }
        }
        if self.scan_interval_ms == 0 || self.poll_timeout_ms == 0 {
            return invalid("scan_interval_ms and poll_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }

    /// The risk:reward gate actually applied.
    pub fn effective_min_rr(&self) -> f64 {
        self.min_rr.max(RR_FLOOR)
    }

    pub fn pattern(&self, pattern: PatternType) -> Option<&PatternConfig> {
        self.patterns.get(&pattern)
    }

    pub fn session_weight(&self, session: Session) -> f64 {
        *self.session_weights.get(&session).unwrap_or(&1.0)
    }

    /// Explicit table first, then the JPY / metals / default rule.
    pub fn pip_size(&self, symbol: &str) -> f64 {
        if let Some(p) = self.pip_sizes.get(symbol) {
            return *p;
        }
        if symbol.contains("JPY") {
            0.01
        } else if symbol.contains("XAU") {
            0.1
        } else if symbol.contains("XAG") {
            0.01
        } else {
            0.0001
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => {
            v.trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidEnv {
                    key: key.to_string(),
                    value: v,
                })
        }
        _ => Ok(None),
    }
}
