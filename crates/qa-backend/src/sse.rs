//! Server-Sent Events frame splitting over a byte stream.
//!
//! Transport chunks arrive at arbitrary boundaries: a chunk may split a
//! frame, a line, or a multi-byte character. Decoding is therefore
//! stateful: bytes that end mid-sequence are held back until the next
//! chunk, and a trailing unterminated frame is buffered, never discarded.

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Frame delimiter convention in effect for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Every line is a frame. Legacy content-delta framing.
    Line,
    /// A blank-line-terminated block is a frame; its lines are scanned
    /// for `data:` fields and other fields are ignored.
    Block,
}

/// Extract the value of a `data:` field, or None for any other line.
fn data_value(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Parser state carried across chunks.
struct FrameParserState {
    mode: FrameMode,
    /// Bytes held back because the chunk ended mid-UTF-8 sequence.
    partial_bytes: Vec<u8>,
    /// Decoded text of the current, not yet terminated line.
    line_buf: String,
    /// Data lines of the current block (Block mode only).
    block_data: Vec<String>,
}

impl FrameParserState {
    fn new(mode: FrameMode) -> Self {
        Self {
            mode,
            partial_bytes: Vec::new(),
            line_buf: String::new(),
            block_data: Vec::new(),
        }
    }

    /// Decode as much of the buffered bytes as possible.
    ///
    /// A trailing incomplete sequence stays in `partial_bytes`; invalid
    /// (not merely incomplete) bytes are replaced with U+FFFD.
    fn take_decoded(&mut self, chunk: &[u8]) -> String {
        self.partial_bytes.extend_from_slice(chunk);
        let mut buf = std::mem::take(&mut self.partial_bytes);
        let mut out = String::new();
        let mut pos = 0;
        loop {
            match std::str::from_utf8(&buf[pos..]) {
                Ok(s) => {
                    out.push_str(s);
                    pos = buf.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(s) = std::str::from_utf8(&buf[pos..pos + valid]) {
                        out.push_str(s);
                    }
                    pos += valid;
                    match e.error_len() {
                        Some(n) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            pos += n;
                        }
                        // Incomplete tail: hold it for the next chunk.
                        None => break,
                    }
                }
            }
        }
        buf.drain(..pos);
        self.partial_bytes = buf;
        out
    }

    /// Process one complete line. Returns a frame payload if one is complete.
    fn process_line(&mut self, line: &str) -> Option<String> {
        match self.mode {
            FrameMode::Line => data_value(line).map(str::to_string),
            FrameMode::Block => {
                if line.is_empty() {
                    if self.block_data.is_empty() {
                        return None;
                    }
                    return Some(self.block_data.drain(..).collect::<Vec<_>>().join("\n"));
                }
                if let Some(value) = data_value(line) {
                    self.block_data.push(value.to_string());
                }
                None
            }
        }
    }

    /// Flush state at end of stream: an unterminated line, then an
    /// unterminated block.
    fn flush(&mut self) -> Option<String> {
        if !self.line_buf.is_empty() || !self.partial_bytes.is_empty() {
            // Any held-back partial bytes are by definition incomplete;
            // decode what remains with replacement.
            let tail = std::mem::take(&mut self.partial_bytes);
            self.line_buf.push_str(&String::from_utf8_lossy(&tail));
            let line = std::mem::take(&mut self.line_buf);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(payload) = self.process_line(line) {
                return Some(payload);
            }
        }
        if !self.block_data.is_empty() {
            return Some(self.block_data.drain(..).collect::<Vec<_>>().join("\n"));
        }
        None
    }
}

/// Stream adapter that splits a byte stream into SSE frame payloads.
///
/// Yields one item per `data:` payload; frames without a `data:` field
/// (comments, keep-alives, other SSE fields) produce nothing. Transport
/// errors pass through unchanged.
pub struct SseFrames<S> {
    inner: S,
    state: FrameParserState,
    pending: Vec<String>,
    done: bool,
}

impl<S> SseFrames<S> {
    pub fn new(inner: S, mode: FrameMode) -> Self {
        Self {
            inner,
            state: FrameParserState::new(mode),
            pending: Vec::new(),
            done: false,
        }
    }
}

impl<S, E> Stream for SseFrames<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if !this.pending.is_empty() {
                return Poll::Ready(Some(Ok(this.pending.remove(0))));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let text = this.state.take_decoded(&bytes);
                    for c in text.chars() {
                        if c == '\n' {
                            let line = std::mem::take(&mut this.state.line_buf);
                            let line = line.strip_suffix('\r').unwrap_or(&line);
                            if let Some(payload) = this.state.process_line(line) {
                                this.pending.push(payload);
                            }
                        } else {
                            this.state.line_buf.push(c);
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    if let Some(payload) = this.state.flush() {
                        this.pending.push(payload);
                    }
                }
                Poll::Pending => {
                    return Poll::Pending;
                }
            }
        }
    }
}

/// Split a byte stream into SSE frame payloads using the given framing mode.
pub fn split_frames<S, E>(stream: S, mode: FrameMode) -> SseFrames<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    SseFrames::new(stream, mode)
}
