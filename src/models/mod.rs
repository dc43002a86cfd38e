pub mod candle;
pub mod direction;
pub mod tick;
pub mod timeframe;

pub use candle::{Candle, CandleSeries};
pub use direction::*;
pub use tick::{RawTick, Tick, TickError};
pub use timeframe::Timeframe;
