//! End-to-end consumer tests over scripted transports.
//!
//! The main property: chunk boundaries are invisible. Splitting a valid
//! SSE body at any byte offset, including mid-character and
//! mid-delimiter, yields the same accumulated result as the unsplit
//! body.

use qa_backend::mock::{fixtures, mock_transport, split_at, chunk_every, MockConfig};
use qa_backend::{consume_agent, consume_content};
use qa_protocol::{AgentEvent, AgentTrace};

async fn content_of(config: MockConfig) -> String {
    consume_content(Box::pin(mock_transport(config)), |_| {})
        .await
        .expect("transport does not fail")
}

async fn trace_of(config: MockConfig) -> AgentTrace {
    consume_agent(Box::pin(mock_transport(config)), |_, _| {})
        .await
        .expect("transport does not fail")
}

#[tokio::test]
async fn content_is_split_invariant_at_every_offset() {
    let body = fixtures::content_body(&["你好", "，世界", "!"]);
    let whole = content_of(fixtures::whole(body.clone())).await;
    assert_eq!(whole, "你好，世界!");

    for at in 1..body.len() {
        let config = MockConfig::new().with_chunks(split_at(&body, at));
        assert_eq!(content_of(config).await, whole, "split at byte {at}");
    }
}

#[tokio::test]
async fn content_is_split_invariant_for_small_chunk_sizes() {
    let body = fixtures::content_body(&["streamed ", "reply ", "text"]);
    let whole = content_of(fixtures::whole(body.clone())).await;

    for size in 1..=5 {
        let config = MockConfig::new().with_chunks(chunk_every(&body, size));
        assert_eq!(content_of(config).await, whole, "chunk size {size}");
    }
}

#[tokio::test]
async fn agent_trace_is_split_invariant() {
    let events = fixtures::calculator_trace();
    let body = fixtures::agent_body(&events);
    let whole = trace_of(fixtures::whole(body.clone())).await;
    assert_eq!(whole.events, events);
    assert_eq!(whole.answer, "123 × 456 = 56088");

    for size in 1..=7 {
        let config = MockConfig::new().with_chunks(chunk_every(&body, size));
        assert_eq!(trace_of(config).await, whole, "chunk size {size}");
    }
}

#[tokio::test]
async fn raw_payloads_accumulate_verbatim() {
    let body = fixtures::raw_content_body(&["hello", " world"]);
    let reply = content_of(fixtures::whole(body)).await;
    assert_eq!(reply, "hello world");
}

#[tokio::test]
async fn delayed_chunks_change_nothing() {
    let body = fixtures::content_body(&["slow", " but", " sure"]);
    let config = MockConfig::new()
        .with_chunks(chunk_every(&body, 4))
        .with_chunk_delay(1);
    assert_eq!(content_of(config).await, "slow but sure");
}

#[tokio::test]
async fn transport_error_mid_stream_propagates() {
    let body = fixtures::content_body(&["partial"]);
    let config = fixtures::error_after(&body, 6, "connection reset");

    let result = consume_content(Box::pin(mock_transport(config)), |_| {}).await;
    let err = result.expect_err("transport failure must surface");
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionAborted);
}

#[tokio::test]
async fn updates_arrive_in_order_while_streaming() {
    let body = fixtures::content_body(&["a", "b", "c"]);
    let config = MockConfig::new().with_chunks(chunk_every(&body, 3));

    let mut snapshots = Vec::new();
    consume_content(Box::pin(mock_transport(config)), |buf| {
        snapshots.push(buf.to_string());
    })
    .await
    .expect("transport does not fail");

    assert_eq!(snapshots, vec!["a", "ab", "abc"]);
}

#[tokio::test]
async fn agent_updates_preserve_arrival_order() {
    let body = fixtures::agent_body(&fixtures::calculator_trace());
    let config = MockConfig::new().with_chunks(chunk_every(&body, 16));

    let mut kinds = Vec::new();
    consume_agent(Box::pin(mock_transport(config)), |events, _| {
        if let Some(last) = events.last() {
            kinds.push(match last {
                AgentEvent::Thinking { .. } => "thinking",
                AgentEvent::ToolStart { .. } => "tool_start",
                AgentEvent::ToolResult { .. } => "tool_result",
                AgentEvent::Answer { .. } => "answer",
                AgentEvent::Done => "done",
            });
        }
    })
    .await
    .expect("transport does not fail");

    assert_eq!(
        kinds,
        vec!["thinking", "tool_start", "tool_result", "answer", "answer", "done"]
    );
}
