//! Consumer side of the relay protocol.
//!
//! [`StreamConsumer`] pulls raw chunks from a response body as they arrive,
//! reassembles frames across arbitrary chunk boundaries, and yields decoded
//! [`StreamEvent`]s one at a time. [`Accumulator`] applies them: text
//! fragments are appended in sequence order and exactly one terminal event
//! settles the outcome. Partial text survives a failed stream.

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use thiserror::Error;
use tracing::warn;

use crate::sse::{SseDecoder, StreamEvent};

/// Failure of the underlying byte stream, surfaced to the caller.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("stream read failed: {0}")]
    Read(String),
}

/// Pull-based reader over a growing response body.
///
/// Single-pass and non-restartable: once a terminal event or a read error
/// has been returned, `next_event` yields `None`.
pub struct StreamConsumer<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl<S, E> StreamConsumer<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: fmt::Display,
{
    pub fn new(body: S) -> Self {
        Self {
            body,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Suspend until the next event is available, the stream ends, or the
    /// read fails. Malformed payloads are logged and skipped, never fatal.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, ConsumeError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if event.is_terminal() {
                    // Nothing after a terminal is valid; stop reading.
                    self.finished = true;
                    self.pending.clear();
                }
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }

            match self.body.next().await {
                Some(Ok(chunk)) => {
                    for payload in self.decoder.push_chunk(&chunk) {
                        match serde_json::from_str::<StreamEvent>(&payload) {
                            Ok(event) => self.pending.push_back(event),
                            Err(e) => {
                                warn!(error = %e, payload, "Skipping malformed event payload");
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(ConsumeError::Read(e.to_string())));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

/// How a consumed stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Complete,
    Failed(String),
}

/// Final state of one consumed stream.
#[derive(Debug)]
pub struct Accumulated {
    pub text: String,
    pub outcome: StreamOutcome,
}

/// Append-only reassembly of text fragments for one request.
///
/// Owned by the consumer of a single stream; build a fresh one per request.
#[derive(Debug, Default)]
pub struct Accumulator {
    text: String,
    last_sequence: u64,
    outcome: Option<StreamOutcome>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns true once the stream is settled.
    ///
    /// Text events must arrive in strictly increasing sequence order; a
    /// repeated or out-of-order number is skipped with a warning.
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Text {
                content,
                sequence_number,
            } => {
                if sequence_number <= self.last_sequence {
                    warn!(
                        sequence_number,
                        last = self.last_sequence,
                        "Skipping out-of-order text event"
                    );
                    return false;
                }
                self.last_sequence = sequence_number;
                self.text.push_str(&content);
                false
            }
            StreamEvent::Complete => {
                self.outcome = Some(StreamOutcome::Complete);
                true
            }
            StreamEvent::Error { message } => {
                self.outcome = Some(StreamOutcome::Failed(message));
                true
            }
        }
    }

    /// Settle the stream with a local failure (read error, truncation).
    pub fn fail(&mut self, message: String) {
        self.outcome = Some(StreamOutcome::Failed(message));
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn finish(self) -> Accumulated {
        Accumulated {
            text: self.text,
            outcome: self
                .outcome
                .unwrap_or_else(|| {
                    StreamOutcome::Failed("stream ended without terminal event".to_string())
                }),
        }
    }
}

/// Drive a consumer to its end and return the reassembled result.
pub async fn collect<S, E>(mut consumer: StreamConsumer<S>) -> Accumulated
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: fmt::Display,
{
    let mut acc = Accumulator::new();
    while let Some(result) = consumer.next_event().await {
        match result {
            Ok(event) => {
                if acc.apply(event) {
                    break;
                }
            }
            Err(e) => {
                acc.fail(e.to_string());
                break;
            }
        }
    }
    acc.finish()
}
