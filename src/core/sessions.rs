use chrono::{DateTime, Timelike, Utc};
use chrono_tz::US::Eastern;

use crate::config::Config;
use crate::models::Session;

/// Classify a unix timestamp into a trading session. Windows are defined on
/// the US/Eastern wall clock so DST shifts move with the market.
pub fn classify(cfg: &Config, ts: f64) -> Session {
    let utc = DateTime::from_timestamp(ts.floor() as i64, 0).unwrap_or_default();
    classify_at(cfg, utc)
}

pub fn classify_at(cfg: &Config, utc_now: DateTime<Utc>) -> Session {
    let et_now = utc_now.with_timezone(&Eastern);
    let current_time = et_now.hour() * 60 + et_now.minute();

    for window in &cfg.sessions {
        let start_min = window.start.0 * 60 + window.start.1;
        let end_min = window.end.0 * 60 + window.end.1;

        let in_session = if start_min < end_min {
            current_time >= start_min && current_time < end_min
        } else {
            // Wraps midnight (e.g. Asian session 19:00 - 03:00)
            current_time >= start_min || current_time < end_min
        };

        if in_session {
            return window.session;
        }
    }
    Session::Other
}

/// Tracks the current session for status logging.
pub struct SessionManager {
    pub current_session: Session,
    pub session_weight: f64,
}

impl SessionManager {
    pub fn new(cfg: &Config) -> Self {
        Self {
            current_session: Session::Other,
            session_weight: cfg.session_weight(Session::Other),
        }
    }

    /// Returns true when the session changed.
    pub fn update(&mut self, cfg: &Config, ts: f64) -> bool {
        let session = classify(cfg, ts);
        let changed = session != self.current_session;
        self.current_session = session;
        self.session_weight = cfg.session_weight(session);
        changed
    }

    pub fn is_high_liquidity(&self) -> bool {
        matches!(
            self.current_session,
            Session::London | Session::Ny | Session::Overlap
        )
    }
}
