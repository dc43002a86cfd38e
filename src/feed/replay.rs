use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use crate::feed::{FeedEvent, TickFeed};
use crate::models::RawTick;

/// Pre-recorded ticks delivered back to back, then `Closed`.
pub struct ReplayFeed {
    ticks: VecDeque<RawTick>,
}

impl ReplayFeed {
    pub fn new(ticks: impl IntoIterator<Item = RawTick>) -> Self {
        Self {
            ticks: ticks.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.ticks.len()
    }
}

#[async_trait]
impl TickFeed for ReplayFeed {
    async fn next_event(&mut self, _timeout: Duration) -> Result<FeedEvent> {
        Ok(match self.ticks.pop_front() {
            Some(raw) => FeedEvent::Tick(raw),
            None => FeedEvent::Closed,
        })
    }
}
