//! qa-protocol: Shared types for the qachat client.
//!
//! This crate defines the wire and session types used between the terminal
//! client, the streaming consumer, and the backend REST API.

pub mod event;
pub mod session;

pub use event::{AgentEvent, AgentTrace};
pub use session::{
    ConversationInfo, ConversationMessage, MessageResponse, MessagesResponse, Role,
    SendMessageRequest, SessionContext,
};
