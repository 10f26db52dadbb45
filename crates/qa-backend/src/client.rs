//! Chat backend API client with SSE streaming support.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use qa_protocol::{AgentEvent, AgentTrace, MessageResponse, MessagesResponse, SendMessageRequest, SessionContext};

use crate::consumer::{consume_agent, consume_content};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error: {0}")]
    Api(String),
}

/// Error body shape used by the backend for non-OK responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: String,
}

/// Chat backend API client.
pub struct ChatClient {
    http: Client,
}

/// Build an HTTP client with appropriate timeouts and connection limits.
fn build_http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
}

/// URL of a message endpoint for the session, e.g. suffix "/stream".
fn messages_url(session: &SessionContext, suffix: &str) -> String {
    format!(
        "{}/conversations/{}/messages{}",
        session.base_url.trim_end_matches('/'),
        session.session_id,
        suffix
    )
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatClient {
    pub fn new() -> Self {
        Self {
            http: build_http_client(),
        }
    }

    /// Send a message and stream the reply as accumulated content.
    ///
    /// The sink receives the full reply-so-far after each increment.
    /// Returns the final reply text.
    pub async fn send_streaming(
        &self,
        session: &SessionContext,
        content: &str,
        on_update: impl FnMut(&str),
    ) -> Result<String, BackendError> {
        let response = self.post_message(session, "/stream", content).await?;
        let reply = consume_content(response.bytes_stream(), on_update).await?;
        debug!(chars = reply.len(), "content stream complete");
        Ok(reply)
    }

    /// Send a message in agent mode and stream the reasoning trace.
    ///
    /// The sink receives the event sequence and running answer after
    /// each accepted frame. Returns the completed trace.
    pub async fn send_agent_streaming(
        &self,
        session: &SessionContext,
        content: &str,
        on_update: impl FnMut(&[AgentEvent], &str),
    ) -> Result<AgentTrace, BackendError> {
        let response = self.post_message(session, "/agent/stream", content).await?;
        let trace = consume_agent(response.bytes_stream(), on_update).await?;
        debug!(events = trace.events.len(), "agent stream complete");
        Ok(trace)
    }

    /// Send a message without streaming. Returns the complete reply.
    pub async fn send(
        &self,
        session: &SessionContext,
        content: &str,
    ) -> Result<MessageResponse, BackendError> {
        let response = self.post_message(session, "", content).await?;
        Ok(response.json().await?)
    }

    /// Fetch the conversation history for the session.
    pub async fn history(&self, session: &SessionContext) -> Result<MessagesResponse, BackendError> {
        let url = messages_url(session, "");
        let mut request = self.http.get(&url);
        if let Some(token) = &session.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn post_message(
        &self,
        session: &SessionContext,
        suffix: &str,
        content: &str,
    ) -> Result<reqwest::Response, BackendError> {
        let url = messages_url(session, suffix);
        debug!(%url, "sending message");

        let body = SendMessageRequest {
            content: content.to_string(),
        };
        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &session.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response)
    }
}

/// Turn a non-OK response into an API error, preferring the backend's
/// `detail` field over the raw body.
async fn api_error(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);
    BackendError::Api(format!("{status}: {detail}"))
}
