use anyhow::{Context, Result};
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::strategies::signals::Signal;

/// Downstream consumer of emitted signals. An error means the signal was
/// not delivered and must not count as emitted.
pub trait SignalSink: Send {
    fn publish(&mut self, signal: &Signal) -> Result<()>;
}

/// One JSON object per line, flushed after every signal.
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> SignalSink for JsonLinesSink<W> {
    fn publish(&mut self, signal: &Signal) -> Result<()> {
        let line = signal.to_json().context("serializing signal")?;
        writeln!(self.out, "{}", line).context("writing signal")?;
        self.out.flush().context("flushing signal output")?;
        Ok(())
    }
}

/// Collects signals in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    signals: Arc<Mutex<Vec<Signal>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.signals.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignalSink for MemorySink {
    fn publish(&mut self, signal: &Signal) -> Result<()> {
        self.signals
            .lock()
            .map_err(|_| anyhow::anyhow!("signal buffer poisoned"))?
            .push(signal.clone());
        Ok(())
    }
}
