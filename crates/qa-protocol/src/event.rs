//! Event types for streamed agent responses.

use serde::{Deserialize, Serialize};

/// One step of an agent's reasoning/tool-use trace.
///
/// Arrives on the wire as a JSON object with a `type` discriminant.
/// Ordering is significant: the sequence reconstructs the trace and is
/// rendered in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Free-text reasoning emitted before the agent acts.
    Thinking { content: String },

    /// The agent is about to invoke a tool.
    ToolStart { tool: String, input: String },

    /// A tool invocation returned.
    ToolResult { tool: String, output: String },

    /// A chunk of the final answer.
    Answer { content: String },

    /// The trace is complete. Terminal signal for agent-mode streams.
    Done,
}

impl AgentEvent {
    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done)
    }
}

/// The ordered event sequence plus the running answer text for one
/// streamed agent reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentTrace {
    pub events: Vec<AgentEvent>,
    pub answer: String,
}

impl AgentTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, folding `answer` content into the running answer.
    pub fn push(&mut self, event: AgentEvent) {
        if let AgentEvent::Answer { content } = &event {
            self.answer.push_str(content);
        }
        self.events.push(event);
    }
}
