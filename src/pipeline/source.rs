//! Observation source abstraction.
//!
//! Provides a unified trait for reading observations from different places:
//! an in-memory iterator (synthetic signal, replay) and stdin (JSON lines).

use crate::types::Observation;
use anyhow::Result;
use async_trait::async_trait;

/// Events produced by an observation source.
#[derive(Debug)]
pub enum SourceEvent {
    /// An observation was read.
    Observation(Observation),
    /// Source has no more data.
    Eof,
}

/// Trait abstracting where observations come from.
///
/// Implementations handle parsing and pacing internally. The processing loop
/// calls [`next_observation`](ObservationSource::next_observation) inside a
/// `select!` with cancellation.
#[async_trait]
pub trait ObservationSource: Send + 'static {
    /// Read the next observation. `Err` is unrecoverable and ends the loop.
    async fn next_observation(&mut self) -> Result<SourceEvent>;

    /// Name for logging (e.g. "synthetic", "stdin").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Iterator Source (synthetic signal / replay)
// ============================================================================

/// Yields observations from any iterator with an optional inter-item delay.
pub struct IterSource<I> {
    items: I,
    name: String,
    delay_ms: u64,
    yielded_first: bool,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Observation> + Send + 'static,
{
    pub fn new(name: impl Into<String>, items: I, delay_ms: u64) -> Self {
        Self {
            items,
            name: name.into(),
            delay_ms,
            yielded_first: false,
        }
    }
}

impl IterSource<std::vec::IntoIter<Observation>> {
    /// Replay a fixed batch without pacing.
    pub fn from_vec(observations: Vec<Observation>) -> Self {
        Self::new("replay", observations.into_iter(), 0)
    }
}

#[async_trait]
impl<I> ObservationSource for IterSource<I>
where
    I: Iterator<Item = Observation> + Send + 'static,
{
    async fn next_observation(&mut self) -> Result<SourceEvent> {
        // No delay before the first item
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.items.next() {
            Some(obs) => {
                self.yielded_first = true;
                Ok(SourceEvent::Observation(obs))
            }
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Stdin Source (JSON observations, one per line)
// ============================================================================

/// Reads JSON observations from stdin, one per line.
///
/// Missing `id`/`timestamp` fields are filled in, so `{"value": 42.0}` is a
/// valid line. Pairs with the simulation binary:
/// `simulation --count 1000 | sensorflow --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
    skipped: u64,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(512),
            skipped: 0,
        }
    }

    /// Lines dropped because they did not parse.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObservationSource for StdinSource {
    async fn next_observation(&mut self) -> Result<SourceEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SourceEvent::Eof);
            }
            match parse_line(&self.line_buffer) {
                Some(Ok(obs)) => return Ok(SourceEvent::Observation(obs)),
                Some(Err(e)) => {
                    self.skipped += 1;
                    tracing::warn!("[StdinSource] Failed to parse observation: {}", e);
                }
                None => {}
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

/// Parse one JSON line. `None` for blank lines.
fn parse_line(line: &str) -> Option<serde_json::Result<Observation>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str::<Observation>(line))
}
