pub mod channel;
pub mod json_lines;
pub mod replay;

pub use channel::ChannelFeed;
pub use json_lines::JsonLinesFeed;
pub use replay::ReplayFeed;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::models::RawTick;

#[derive(Debug, Clone)]
pub enum FeedEvent {
    Tick(RawTick),
    /// A message arrived but could not be decoded.
    Malformed(String),
    /// Nothing arrived within the poll timeout.
    Idle,
    /// The upstream is gone; no further events will arrive.
    Closed,
}

/// Source of raw market-data messages.
#[async_trait]
pub trait TickFeed: Send {
    async fn next_event(&mut self, timeout: Duration) -> Result<FeedEvent>;
}
