use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Canonical tick record. Consumed immediately by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
    pub volume: u64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickError {
    #[error("tick has no symbol")]
    MissingSymbol,
    #[error("tick for {0} has no price field (mid/price/last or bid/ask)")]
    MissingPrice(String),
    #[error("field `{field}` is not a valid price: {value}")]
    InvalidPrice { field: &'static str, value: String },
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("invalid volume: {0}")]
    InvalidVolume(String),
}

/// Tick as delivered by the feed. Every field is optional; `normalize`
/// decides whether the record is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTick {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub bid: Option<Value>,
    #[serde(default)]
    pub ask: Option<Value>,
    #[serde(default)]
    pub mid: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub last: Option<Value>,
    #[serde(default)]
    pub volume: Option<Value>,
    #[serde(default, alias = "time", alias = "ts")]
    pub timestamp: Option<Value>,
}

impl RawTick {
    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Convenience constructor used by feeds and tests.
    pub fn mid(symbol: &str, mid: f64, timestamp: f64) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            mid: Some(Value::from(mid)),
            timestamp: Some(Value::from(timestamp)),
            ..Default::default()
        }
    }

    pub fn quote(symbol: &str, bid: f64, ask: f64, timestamp: f64) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            bid: Some(Value::from(bid)),
            ask: Some(Value::from(ask)),
            timestamp: Some(Value::from(timestamp)),
            ..Default::default()
        }
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(Value::from(volume));
        self
    }

    /// Validate and convert into a canonical `Tick`.
    /// `received_at` stands in for a missing timestamp.
    pub fn normalize(&self, received_at: f64) -> Result<Tick, TickError> {
        let symbol = self
            .symbol
            .as_deref()
            .map(normalize_symbol)
            .filter(|s| !s.is_empty())
            .ok_or(TickError::MissingSymbol)?;

        let bid = price_field("bid", &self.bid)?;
        let ask = price_field("ask", &self.ask)?;
        let quoted = price_field("mid", &self.mid)?
            .or(price_field("price", &self.price)?)
            .or(price_field("last", &self.last)?);

        let mid = match (quoted, bid, ask) {
            (Some(m), _, _) => m,
            (None, Some(b), Some(a)) => (b + a) / 2.0,
            (None, Some(b), None) => b,
            (None, None, Some(a)) => a,
            (None, None, None) => return Err(TickError::MissingPrice(symbol)),
        };
        if !mid.is_finite() || mid <= 0.0 {
            return Err(TickError::InvalidPrice {
                field: "mid",
                value: mid.to_string(),
            });
        }

        let timestamp = match &self.timestamp {
            None | Some(Value::Null) => received_at,
            Some(v) => number(v)
                .filter(|t| t.is_finite() && *t >= 0.0)
                .ok_or_else(|| TickError::InvalidTimestamp(v.to_string()))?,
        };

        let volume = match &self.volume {
            None | Some(Value::Null) => 1,
            Some(v) => match number(v) {
                Some(n) if n.is_finite() && n >= 0.0 => n.round() as u64,
                _ => return Err(TickError::InvalidVolume(v.to_string())),
            },
        };

        Ok(Tick {
            symbol,
            bid: bid.unwrap_or(mid),
            ask: ask.unwrap_or(mid),
            mid,
            volume,
            timestamp,
        })
    }
}

/// `"eur/usd"` → `"EURUSD"`.
pub fn normalize_symbol(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
        .collect::<String>()
        .to_uppercase()
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn price_field(field: &'static str, v: &Option<Value>) -> Result<Option<f64>, TickError> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => match number(raw) {
            Some(p) if p.is_finite() && p > 0.0 => Ok(Some(p)),
            _ => Err(TickError::InvalidPrice {
                field,
                value: raw.to_string(),
            }),
        },
    }
}
