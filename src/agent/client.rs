//! Model call boundary.
//!
//! The rest of the crate talks to the language model only through
//! [`ModelClient`]: an optional system instruction plus an ordered list of
//! user/assistant turns in, reply text out.

use serde::{Deserialize, Serialize};

use super::AgentError;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub turns: Vec<Turn>,
    pub max_tokens: u32,
}

/// Anything that can answer a conversation. Calls block until the full reply
/// has arrived.
pub trait ModelClient {
    fn send(&self, request: &ModelRequest) -> Result<String, AgentError>;
}

impl<M: ModelClient + ?Sized> ModelClient for Box<M> {
    fn send(&self, request: &ModelRequest) -> Result<String, AgentError> {
        (**self).send(request)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Turn],
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Blocking client for the Anthropic Messages API
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

impl AnthropicClient {
    pub fn new(base_url: &str, api_key: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    /// Build a client from the `ANTHROPIC_API_KEY` environment variable
    pub fn from_env(base_url: &str, model: &str) -> Result<Self, AgentError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgentError::MissingApiKey)?;
        Ok(Self::new(base_url, api_key, model.to_string()))
    }
}

impl ModelClient for AnthropicClient {
    fn send(&self, request: &ModelRequest) -> Result<String, AgentError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: &request.turns,
        };

        tracing::debug!(
            model = %self.model,
            turns = request.turns.len(),
            max_tokens = request.max_tokens,
            "sending model request"
        );

        let response = self
            .agent
            .post(&url)
            .set("x-api-key", &self.api_key)
            .set("anthropic-version", API_VERSION)
            .set("content-type", "application/json")
            .send_json(&body)
            .map_err(|e| match e {
                ureq::Error::Status(code, response) => AgentError::ApiError {
                    status: code,
                    body: response.into_string().unwrap_or_default(),
                },
                other => AgentError::NetworkError(other.to_string()),
            })?;

        let parsed: MessagesResponse = response
            .into_json()
            .map_err(|e| AgentError::NetworkError(format!("Failed to read response: {}", e)))?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AgentError::EmptyResponse);
        }
        Ok(text)
    }
}
