use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::feed::{FeedEvent, TickFeed};
use crate::models::RawTick;

/// Single-producer hand-off from another task.
pub struct ChannelFeed {
    rx: mpsc::Receiver<RawTick>,
}

impl ChannelFeed {
    pub fn new(rx: mpsc::Receiver<RawTick>) -> Self {
        Self { rx }
    }

    /// Bounded channel; the sender applies backpressure when the engine lags.
    pub fn channel(capacity: usize) -> (mpsc::Sender<RawTick>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl TickFeed for ChannelFeed {
    async fn next_event(&mut self, timeout: Duration) -> Result<FeedEvent> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(raw)) => Ok(FeedEvent::Tick(raw)),
            Ok(None) => Ok(FeedEvent::Closed),
            Err(_) => Ok(FeedEvent::Idle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_then_closes() {
        let (tx, mut feed) = ChannelFeed::channel(4);
        tx.send(RawTick::mid("EURUSD", 1.1, 1.0)).await.unwrap();
        drop(tx);
        let timeout = Duration::from_millis(50);
        assert!(matches!(feed.next_event(timeout).await.unwrap(), FeedEvent::Tick(_)));
        assert!(matches!(feed.next_event(timeout).await.unwrap(), FeedEvent::Closed));
    }

    #[tokio::test]
    async fn idle_when_nothing_arrives() {
        let (_tx, mut feed) = ChannelFeed::channel(4);
        let ev = feed.next_event(Duration::from_millis(10)).await.unwrap();
        assert!(matches!(ev, FeedEvent::Idle));
    }
}
