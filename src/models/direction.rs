use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }

    /// +1.0 for buys, -1.0 for sells. Multiplies a distance into a price offset.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }

    pub fn from_delta(delta: f64) -> Option<Direction> {
        if delta > 0.0 {
            Some(Direction::Buy)
        } else if delta < 0.0 {
            Some(Direction::Sell)
        } else {
            None
        }
    }
}

/// Named trading window used to weight confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Session {
    Asian,
    London,
    Ny,
    Overlap,
    Other,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Asian => "ASIAN",
            Session::London => "LONDON",
            Session::Ny => "NY",
            Session::Overlap => "OVERLAP",
            Session::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    #[serde(rename = "VCB_BREAKOUT")]
    VolatilityCompressionBreakout,
    LiquiditySweepReversal,
    OrderBlockBounce,
    MomentumBurst,
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PatternType {
    pub const ALL: [PatternType; 4] = [
        PatternType::VolatilityCompressionBreakout,
        PatternType::LiquiditySweepReversal,
        PatternType::OrderBlockBounce,
        PatternType::MomentumBurst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::VolatilityCompressionBreakout => "VCB_BREAKOUT",
            PatternType::LiquiditySweepReversal => "LIQUIDITY_SWEEP_REVERSAL",
            PatternType::OrderBlockBounce => "ORDER_BLOCK_BOUNCE",
            PatternType::MomentumBurst => "MOMENTUM_BURST",
        }
    }
}
