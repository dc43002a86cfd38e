use serde::{Deserialize, Serialize};

use crate::models::{Direction, PatternType, Session, Timeframe};

/// Fully qualified trade signal. Built only by the qualifier and immutable
/// once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stop_pips: f64,
    pub target_pips: f64,
    pub risk_reward: f64,
    pub confidence: f64,
    pub pattern_type: PatternType,
    pub session: Session,
    pub timeframe: Timeframe,
    pub created_at: f64,
}

impl Signal {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
