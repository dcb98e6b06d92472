//! Wire protocol of the stream relay.
//!
//! Events are serialized as JSON and framed as minimal Server-Sent-Events
//! blocks (`data: <json>\n\n`) so any line-oriented reader can parse them
//! incrementally. [`SseDecoder`] is the reader side: a push decoder that
//! buffers partial frames across chunk boundaries, since the transport is
//! free to split a frame anywhere.

use serde::{Deserialize, Serialize};

/// One event of a relayed stream.
///
/// A stream is a run of `Text` events with sequence numbers exactly 1..N,
/// ended by exactly one terminal event (`Complete` or `Error`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StreamEvent {
    Text {
        content: String,
        #[serde(rename = "sequenceNumber")]
        sequence_number: u64,
    },
    Error {
        message: String,
    },
    Complete,
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error { .. } | StreamEvent::Complete)
    }

    /// Serialize into a single SSE frame.
    pub fn to_frame(&self) -> String {
        // StreamEvent has no non-serializable states; failure is unreachable.
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("data: {json}\n\n")
    }
}

/// Incremental SSE frame decoder.
///
/// Feed raw chunks as they arrive; complete `data:` payloads come back, and
/// an incomplete trailing frame is held until the next chunk completes it.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every frame it completes.
    ///
    /// Returns the `data:` payload of each completed frame, in order.
    /// Frames carrying no data lines (comments, keep-alives) are dropped.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some((end, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..end + delim_len).take(end).collect();
            if let Some(data) = parse_frame_data(&frame) {
                payloads.push(data);
            }
        }
        payloads
    }
}

/// Locate the first blank-line frame delimiter.
///
/// Line endings may be mixed within one stream, so every spelling of
/// "line break, empty line" counts: `\n\n`, `\r\n\r\n`, and `\n\r\n`
/// (`\r\n\n` reduces to the `\n\n` case).
fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\r'
            && i + 3 < buf.len()
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if buf[i] == b'\n' && i + 2 < buf.len() && buf[i + 1] == b'\r' && buf[i + 2] == b'\n' {
            return Some((i, 3));
        }
        i += 1;
    }
    None
}

/// Extract the joined `data:` payload of one frame, if it has any.
fn parse_frame_data(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let mut data_lines: Vec<&str> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_shape() {
        let ev = StreamEvent::Text {
            content: "hi".to_string(),
            sequence_number: 3,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert_eq!(json, r#"{"kind":"text","content":"hi","sequenceNumber":3}"#);

        let complete: StreamEvent = serde_json::from_str(r#"{"kind":"complete"}"#).unwrap();
        assert_eq!(complete, StreamEvent::Complete);
        assert!(complete.is_terminal());

        let err: StreamEvent =
            serde_json::from_str(r#"{"kind":"error","message":"boom"}"#).unwrap();
        assert!(err.is_terminal());
    }

    #[test]
    fn test_frame_round_trip() {
        let ev = StreamEvent::Text {
            content: "hello".to_string(),
            sequence_number: 1,
        };
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push_chunk(ev.to_frame().as_bytes());
        assert_eq!(payloads.len(), 1);
        let parsed: StreamEvent = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(parsed, ev);
    }

    #[test]
    fn test_partial_frame_across_chunk_boundary() {
        let mut decoder = SseDecoder::new();
        let first = decoder.push_chunk(b"data: {\"kind\"");
        assert!(first.is_empty());
        let second = decoder.push_chunk(b":\"text\",\"content\":\"hi\",\"sequenceNumber\":1}\n\n");
        assert_eq!(second.len(), 1);
        let parsed: StreamEvent = serde_json::from_str(&second[0]).unwrap();
        assert_eq!(
            parsed,
            StreamEvent::Text {
                content: "hi".to_string(),
                sequence_number: 1
            }
        );
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push_chunk(b"data: one\n\ndata: two\n\ndata: thr");
        assert_eq!(payloads, vec!["one".to_string(), "two".to_string()]);
        let rest = decoder.push_chunk(b"ee\n\n");
        assert_eq!(rest, vec!["three".to_string()]);
    }

    #[test]
    fn test_mixed_line_endings_in_one_stream() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push_chunk(b"data: one\n\r\ndata: two\r\n\ndata: three\n\n");
        assert_eq!(
            payloads,
            vec!["one".to_string(), "two".to_string(), "three".to_string()]
        );
    }

    #[test]
    fn test_mixed_delimiter_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push_chunk(b"data: one\n").is_empty());
        let payloads = decoder.push_chunk(b"\r\ndata: two\n\n");
        assert_eq!(payloads, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_crlf_delimiters() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push_chunk(b"data: alpha\r\n\r\ndata: beta\r\n\r\n");
        assert_eq!(payloads, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_comment_frames_are_dropped() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push_chunk(b": keep-alive\n\ndata: real\n\n");
        assert_eq!(payloads, vec!["real".to_string()]);
    }
}
