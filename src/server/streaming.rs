//! SSE re-framing for the stream relay.
//!
//! Converts the adapter's channel of upstream fragments into the relay's own
//! event protocol: `text` events numbered 1..N followed by exactly one
//! terminal (`complete` or `error`).

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::provider::UpstreamEvent;
use crate::sse::StreamEvent;

/// Number upstream fragments into relay events.
///
/// Sequence numbers start at 1 and increase by one per fragment. The
/// adapter guarantees exactly one terminal per stream, which maps to the
/// relay's terminal event one-to-one.
pub fn relay_event_stream(rx: mpsc::Receiver<UpstreamEvent>) -> impl Stream<Item = StreamEvent> {
    let mut sequence = 0u64;
    ReceiverStream::new(rx).map(move |event| match event {
        UpstreamEvent::Delta(content) => {
            sequence += 1;
            StreamEvent::Text {
                content,
                sequence_number: sequence,
            }
        }
        UpstreamEvent::Done => StreamEvent::Complete,
        UpstreamEvent::Error(message) => StreamEvent::Error { message },
    })
}

/// Wrap the relayed events as axum SSE events.
pub fn relay_sse_stream(
    rx: mpsc::Receiver<UpstreamEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    relay_event_stream(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().data(data))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(rx: mpsc::Receiver<UpstreamEvent>) -> Vec<StreamEvent> {
        let stream = relay_event_stream(rx);
        tokio::pin!(stream);
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_fragments_are_numbered_from_one() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(UpstreamEvent::Delta("a".into())).await.unwrap();
        tx.send(UpstreamEvent::Delta("b".into())).await.unwrap();
        tx.send(UpstreamEvent::Delta("c".into())).await.unwrap();
        tx.send(UpstreamEvent::Done).await.unwrap();
        drop(tx);

        let events = drain(rx).await;
        assert_eq!(events.len(), 4);
        for (i, event) in events[..3].iter().enumerate() {
            match event {
                StreamEvent::Text {
                    sequence_number, ..
                } => assert_eq!(*sequence_number, i as u64 + 1),
                other => panic!("expected text event, got {other:?}"),
            }
        }
        assert_eq!(events[3], StreamEvent::Complete);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_upstream_error_maps_to_terminal_error() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(UpstreamEvent::Delta("partial".into())).await.unwrap();
        tx.send(UpstreamEvent::Error("connection reset".into()))
            .await
            .unwrap();
        drop(tx);

        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            StreamEvent::Error {
                message: "connection reset".into()
            }
        );
    }
}
