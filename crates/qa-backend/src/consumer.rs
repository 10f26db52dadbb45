//! Streaming-response consumer.
//!
//! Turns an SSE response body into either an accumulated reply text
//! (content-delta mode) or an ordered agent trace (structured mode).
//! Each call owns its decode buffer, frame buffer, and accumulator;
//! dropping the returned future abandons the stream cleanly and the
//! sink is never touched afterwards.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use qa_protocol::{AgentEvent, AgentTrace};
use tracing::warn;

use crate::sse::{split_frames, FrameMode};

/// In-band end-of-stream marker, distinct from transport-level closure.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Consume a content-delta stream: one `data:` line per frame.
///
/// Every non-sentinel payload is appended to the reply; payloads are
/// decoded as JSON string scalars when possible and taken verbatim
/// otherwise. After each increment the sink receives the full
/// accumulated buffer, so re-rendering it is idempotent. Consumption
/// stops at the `[DONE]` sentinel without reading further frames, or at
/// stream end. Transport errors propagate to the caller.
pub async fn consume_content<S, E, F>(stream: S, mut on_update: F) -> Result<String, E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    F: FnMut(&str),
{
    let mut frames = split_frames(stream, FrameMode::Line);
    let mut message = String::new();

    while let Some(payload) = frames.next().await {
        let payload = payload?;
        if payload == DONE_SENTINEL {
            break;
        }
        match serde_json::from_str::<String>(&payload) {
            Ok(text) => message.push_str(&text),
            // Not a JSON string scalar: take the raw payload verbatim.
            Err(_) => message.push_str(&payload),
        }
        on_update(&message);
    }

    Ok(message)
}

/// Consume an agent-mode stream: blank-line-delimited frames carrying
/// JSON objects with a `type` discriminant.
///
/// Events are appended in arrival order; `answer` content additionally
/// accumulates into the running answer. After each accepted frame the
/// sink receives the event sequence and the running answer. The
/// `done`-typed event terminates consumption; the `[DONE]` sentinel is
/// skipped, not terminal, because agent streams close with `done` first.
/// Malformed frames are logged and dropped, never fatal.
pub async fn consume_agent<S, E, F>(stream: S, mut on_update: F) -> Result<AgentTrace, E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    F: FnMut(&[AgentEvent], &str),
{
    let mut frames = split_frames(stream, FrameMode::Block);
    let mut trace = AgentTrace::new();

    while let Some(payload) = frames.next().await {
        let payload = payload?;
        if payload == DONE_SENTINEL {
            continue;
        }
        let event: AgentEvent = match serde_json::from_str(&payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, payload = %payload, "dropping malformed agent frame");
                continue;
            }
        };

        let terminal = event.is_terminal();
        trace.push(event);
        on_update(&trace.events, &trace.answer);
        if terminal {
            break;
        }
    }

    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn chunks(parts: Vec<&'static str>) -> impl Stream<Item = Result<Bytes, io::Error>> + Unpin {
        futures::stream::iter(parts.into_iter().map(|s| Ok(Bytes::from_static(s.as_bytes()))))
    }

    #[tokio::test]
    async fn accumulates_decoded_payloads_until_sentinel() {
        let stream = chunks(vec!["data: \"A\"\ndata: \"B\"\ndata: [DONE]\n"]);
        let message = consume_content(stream, |_| {}).await.unwrap();
        assert_eq!(message, "AB");
    }

    #[tokio::test]
    async fn sentinel_stops_before_later_frames() {
        let stream = chunks(vec!["data: \"A\"\ndata: \"B\"\ndata: [DONE]\ndata: \"C\"\n"]);
        let message = consume_content(stream, |_| {}).await.unwrap();
        assert_eq!(message, "AB");
    }

    #[tokio::test]
    async fn invalid_json_payload_falls_back_to_raw_text() {
        let stream = chunks(vec!["data: hello\ndata: [DONE]\n"]);
        let message = consume_content(stream, |_| {}).await.unwrap();
        assert_eq!(message, "hello");
    }

    #[tokio::test]
    async fn sink_receives_full_buffer_each_time() {
        let stream = chunks(vec!["data: \"He\"\ndata: \"llo\"\ndata: [DONE]\n"]);
        let mut snapshots = Vec::new();
        let message = consume_content(stream, |buf| snapshots.push(buf.to_string()))
            .await
            .unwrap();
        assert_eq!(snapshots, vec!["He", "Hello"]);
        assert_eq!(message, "Hello");
    }

    #[tokio::test]
    async fn stream_end_without_sentinel_completes() {
        let stream = chunks(vec!["data: \"partial\"\n"]);
        let message = consume_content(stream, |_| {}).await.unwrap();
        assert_eq!(message, "partial");
    }

    #[tokio::test]
    async fn json_escapes_decoded_in_payloads() {
        let stream = chunks(vec!["data: \"line\\nbreak\"\ndata: [DONE]\n"]);
        let message = consume_content(stream, |_| {}).await.unwrap();
        assert_eq!(message, "line\nbreak");
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let parts: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"data: \"A\"\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionAborted, "dropped")),
        ];
        let result = consume_content(futures::stream::iter(parts), |_| {}).await;
        assert_eq!(
            result.unwrap_err().kind(),
            io::ErrorKind::ConnectionAborted
        );
    }

    #[tokio::test]
    async fn agent_events_preserve_order_and_accumulate_answer() {
        let stream = chunks(vec![
            "data: {\"type\":\"thinking\",\"content\":\"need the date\"}\n\n",
            "data: {\"type\":\"tool_start\",\"tool\":\"time\",\"input\":\"{}\"}\n\n",
            "data: {\"type\":\"tool_result\",\"tool\":\"time\",\"output\":\"2024-06-01\"}\n\n",
            "data: {\"type\":\"answer\",\"content\":\"It is \"}\n\n",
            "data: {\"type\":\"answer\",\"content\":\"June 1st.\"}\n\n",
            "data: {\"type\":\"done\"}\n\n",
        ]);
        let trace = consume_agent(stream, |_, _| {}).await.unwrap();

        assert_eq!(trace.events.len(), 6);
        assert!(matches!(trace.events[0], AgentEvent::Thinking { .. }));
        assert!(matches!(trace.events[1], AgentEvent::ToolStart { .. }));
        assert!(matches!(trace.events[2], AgentEvent::ToolResult { .. }));
        assert!(matches!(trace.events[3], AgentEvent::Answer { .. }));
        assert_eq!(trace.events[5], AgentEvent::Done);
        assert_eq!(trace.answer, "It is June 1st.");
    }

    #[tokio::test]
    async fn agent_mode_skips_sentinel_and_stops_on_done() {
        let stream = chunks(vec![
            "data: [DONE]\n\n",
            "data: {\"type\":\"answer\",\"content\":\"hi\"}\n\n",
            "data: {\"type\":\"done\"}\n\n",
            "data: {\"type\":\"answer\",\"content\":\"late\"}\n\n",
        ]);
        let trace = consume_agent(stream, |_, _| {}).await.unwrap();
        assert_eq!(trace.answer, "hi");
        assert_eq!(trace.events.last(), Some(&AgentEvent::Done));
    }

    #[tokio::test]
    async fn agent_mode_drops_malformed_frames() {
        let stream = chunks(vec![
            "data: {not json}\n\n",
            "data: {\"type\":\"mystery\"}\n\n",
            "data: {\"type\":\"answer\",\"content\":\"ok\"}\n\n",
            "data: {\"type\":\"done\"}\n\n",
        ]);
        let trace = consume_agent(stream, |_, _| {}).await.unwrap();
        assert_eq!(trace.events.len(), 2);
        assert_eq!(trace.answer, "ok");
    }

    #[tokio::test]
    async fn agent_sink_sees_sequence_and_running_answer() {
        let stream = chunks(vec![
            "data: {\"type\":\"answer\",\"content\":\"a\"}\n\n",
            "data: {\"type\":\"answer\",\"content\":\"b\"}\n\n",
            "data: {\"type\":\"done\"}\n\n",
        ]);
        let mut seen = Vec::new();
        consume_agent(stream, |events, answer| {
            seen.push((events.len(), answer.to_string()));
        })
        .await
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (1, "a".to_string()),
                (2, "ab".to_string()),
                (3, "ab".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn abandoned_consume_never_touches_sink_again() {
        let sink_calls = Arc::new(AtomicUsize::new(0));
        let calls = sink_calls.clone();

        let stream = Box::pin(async_stream::stream! {
            yield Ok::<_, io::Error>(Bytes::from_static(b"data: \"A\"\n"));
            // Transport hangs; the caller abandons the read loop.
            futures::future::pending::<()>().await;
        });

        let mut fut = Box::pin(consume_content(stream, move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::select! {
            _ = &mut fut => panic!("stream should not complete"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        assert_eq!(sink_calls.load(Ordering::SeqCst), 1);

        drop(fut);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn content_split_mid_character_matches_unsplit() {
        let body = "data: \"流式输出\"\ndata: [DONE]\n".as_bytes();
        let whole = consume_content(chunks_from(vec![body.to_vec()]), |_| {})
            .await
            .unwrap();

        for at in 1..body.len() {
            let split = consume_content(
                chunks_from(vec![body[..at].to_vec(), body[at..].to_vec()]),
                |_| {},
            )
            .await
            .unwrap();
            assert_eq!(split, whole, "split at byte {at}");
        }
    }

    fn chunks_from(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes, io::Error>> + Unpin {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }
}
