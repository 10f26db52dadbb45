//! Mock transports for testing.
//!
//! Produces scripted byte streams shaped exactly like the backend's SSE
//! response bodies, so every consumer layer can be tested without HTTP.

use std::io;
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use qa_protocol::AgentEvent;
use tokio::time::sleep;

/// One scripted step of a mock transport.
#[derive(Debug, Clone)]
pub enum MockChunk {
    /// Deliver raw bytes.
    Bytes(Vec<u8>),
    /// Delay before the next step (for timing tests).
    Delay { ms: u64 },
    /// Fail the transport mid-stream.
    Error { message: String },
}

/// Configuration for a mock transport.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Scripted steps, delivered in order.
    pub chunks: Vec<MockChunk>,
    /// Optional delay between each step (ms).
    pub chunk_delay_ms: Option<u64>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunks(mut self, chunks: Vec<MockChunk>) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn with_chunk_delay(mut self, ms: u64) -> Self {
        self.chunk_delay_ms = Some(ms);
        self
    }
}

/// Create a byte stream from mock config.
pub fn mock_transport(config: MockConfig) -> impl Stream<Item = Result<Bytes, io::Error>> {
    stream! {
        for chunk in config.chunks {
            if let Some(delay_ms) = config.chunk_delay_ms {
                sleep(Duration::from_millis(delay_ms)).await;
            }

            match chunk {
                MockChunk::Bytes(bytes) => {
                    yield Ok(Bytes::from(bytes));
                }
                MockChunk::Delay { ms } => {
                    sleep(Duration::from_millis(ms)).await;
                }
                MockChunk::Error { message } => {
                    yield Err(io::Error::new(io::ErrorKind::ConnectionAborted, message));
                    return;
                }
            }
        }
    }
}

/// Split a body into chunks at the given byte offset.
///
/// Offsets may land mid-character or mid-delimiter; that is the point.
pub fn split_at(body: &[u8], at: usize) -> Vec<MockChunk> {
    let at = at.min(body.len());
    vec![
        MockChunk::Bytes(body[..at].to_vec()),
        MockChunk::Bytes(body[at..].to_vec()),
    ]
}

/// Split a body into chunks of at most `size` bytes.
pub fn chunk_every(body: &[u8], size: usize) -> Vec<MockChunk> {
    body.chunks(size.max(1))
        .map(|c| MockChunk::Bytes(c.to_vec()))
        .collect()
}

/// Built-in fixtures shaped like the backend's observed streams.
pub mod fixtures {
    use super::*;

    /// Content-delta body: each chunk as a JSON-encoded `data:` line,
    /// closed with the `[DONE]` sentinel.
    pub fn content_body(chunks: &[&str]) -> Vec<u8> {
        let mut body = String::new();
        for chunk in chunks {
            let encoded = serde_json::to_string(chunk).expect("string encodes");
            body.push_str(&format!("data: {encoded}\n"));
        }
        body.push_str("data: [DONE]\n");
        body.into_bytes()
    }

    /// Content-delta body with raw, unencoded payloads (legacy servers).
    pub fn raw_content_body(chunks: &[&str]) -> Vec<u8> {
        let mut body = String::new();
        for chunk in chunks {
            body.push_str(&format!("data: {chunk}\n"));
        }
        body.push_str("data: [DONE]\n");
        body.into_bytes()
    }

    /// Agent-mode body: each event as a blank-line-terminated frame,
    /// closed with the `[DONE]` sentinel after the `done` event.
    pub fn agent_body(events: &[AgentEvent]) -> Vec<u8> {
        let mut body = String::new();
        for event in events {
            let encoded = serde_json::to_string(event).expect("event encodes");
            body.push_str(&format!("data: {encoded}\n\n"));
        }
        body.push_str("data: [DONE]\n\n");
        body.into_bytes()
    }

    /// A short tool-using trace ending in a two-part answer.
    pub fn calculator_trace() -> Vec<AgentEvent> {
        vec![
            AgentEvent::Thinking {
                content: "needs arithmetic".to_string(),
            },
            AgentEvent::ToolStart {
                tool: "calculator".to_string(),
                input: r#"{"expression":"123*456"}"#.to_string(),
            },
            AgentEvent::ToolResult {
                tool: "calculator".to_string(),
                output: "56088".to_string(),
            },
            AgentEvent::Answer {
                content: "123 × 456 = ".to_string(),
            },
            AgentEvent::Answer {
                content: "56088".to_string(),
            },
            AgentEvent::Done,
        ]
    }

    /// A config that streams the body in one piece.
    pub fn whole(body: Vec<u8>) -> MockConfig {
        MockConfig::new().with_chunks(vec![MockChunk::Bytes(body)])
    }

    /// A config that errors after delivering a prefix of the body.
    pub fn error_after(body: &[u8], at: usize, message: &str) -> MockConfig {
        MockConfig::new().with_chunks(vec![
            MockChunk::Bytes(body[..at.min(body.len())].to_vec()),
            MockChunk::Error {
                message: message.to_string(),
            },
        ])
    }
}
