use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::feed::{FeedEvent, TickFeed};
use crate::models::RawTick;

/// Newline-delimited JSON ticks from any async reader.
pub struct JsonLinesFeed<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl JsonLinesFeed<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl JsonLinesFeed<BufReader<tokio::fs::File>> {
    pub async fn open(path: &str) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("opening tick file {}", path))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> TickFeed for JsonLinesFeed<R> {
    async fn next_event(&mut self, timeout: Duration) -> Result<FeedEvent> {
        loop {
            let line = match tokio::time::timeout(timeout, self.lines.next_line()).await {
                Err(_) => return Ok(FeedEvent::Idle),
                // Undecodable bytes cost one record; the reader resumes at the next line
                Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    return Ok(FeedEvent::Malformed(format!("undecodable line: {}", e)));
                }
                Ok(res) => res.context("reading tick feed")?,
            };
            let Some(line) = line else {
                return Ok(FeedEvent::Closed);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(match RawTick::from_json(trimmed) {
                Ok(raw) => FeedEvent::Tick(raw),
                Err(e) => FeedEvent::Malformed(format!("{}: {}", e, truncate(trimmed, 120))),
            });
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
