//! Conversation engine.
//!
//! [`Agent`] is a stateless wrapper around a [`ModelClient`]: it picks or
//! builds the system instruction, appends the user turn, dispatches, and
//! strips emphasis markup from the reply. Callers own the history.

pub mod client;
pub mod prompts;

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

pub use client::{AnthropicClient, ModelClient, ModelRequest, Role, Turn};
pub use prompts::{CheckinContext, SessionSnapshot};

use crate::extract::{self, TaskDraft};
use crate::models::Goal;
use crate::profile::{self, ProfileDocument};
use crate::utils;

const CONVERSATION_MAX_TOKENS: u32 = 1000;
const GREETING_MAX_TOKENS: u32 = 500;
const EXTRACTION_MAX_TOKENS: u32 = 500;
const TASK_GENERATION_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Model API returned status {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("Model returned an empty response")]
    EmptyResponse,
}

static BOLD_STARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static ITALIC_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("valid regex"));
static BOLD_UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b__(.+?)__\b").expect("valid regex"));
static ITALIC_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b_(.+?)_\b").expect("valid regex"));

/// Remove bold/italic markers so replies read cleanly in a plain terminal.
/// Underscores inside identifiers like `snake_case` are left alone.
pub fn clean_markdown(text: &str) -> String {
    let text = BOLD_STARS.replace_all(text, "$1");
    let text = ITALIC_STAR.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORES.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "$1");
    text.into_owned()
}

pub struct Agent {
    client: Box<dyn ModelClient>,
}

impl Agent {
    pub fn new(client: Box<dyn ModelClient>) -> Self {
        Self { client }
    }

    fn dispatch(&self, system: Option<String>, turns: Vec<Turn>, max_tokens: u32) -> Result<String, AgentError> {
        let request = ModelRequest { system, turns, max_tokens };
        self.client.send(&request)
    }

    /// Single prompt, no history, no system instruction
    fn one_shot(&self, prompt: String, max_tokens: u32) -> Result<String, AgentError> {
        self.dispatch(None, vec![Turn::user(prompt)], max_tokens)
    }

    /// One turn of a multi-turn conversation.
    ///
    /// `user_message` is appended to `history` before dispatch; the reply is
    /// not, so the caller decides whether to keep it. An explicit
    /// `system_prompt` wins; otherwise a check-in `context` produces the
    /// accountability persona, and without either a generic one is used.
    pub fn conversation_turn(
        &self,
        history: &mut Vec<Turn>,
        user_message: &str,
        system_prompt: Option<&str>,
        context: Option<&CheckinContext>,
    ) -> Result<String, AgentError> {
        let system = match (system_prompt, context) {
            (Some(prompt), _) => prompt.to_string(),
            (None, Some(context)) => prompts::accountability_system_prompt(context),
            (None, None) => prompts::GENERIC_SYSTEM_PROMPT.to_string(),
        };

        history.push(Turn::user(user_message));
        let reply = self.dispatch(Some(system), history.clone(), CONVERSATION_MAX_TOKENS)?;
        Ok(clean_markdown(&reply))
    }

    pub fn daily_checkin_greeting(&self, context: &CheckinContext) -> Result<String, AgentError> {
        let prompt = prompts::checkin_greeting_prompt(context, utils::today());
        let reply = self.one_shot(prompt, CONVERSATION_MAX_TOKENS)?;
        Ok(clean_markdown(&reply))
    }

    pub fn goal_discovery_greeting(
        &self,
        goal_name: &str,
        profile: &ProfileDocument,
        category: &str,
    ) -> Result<String, AgentError> {
        let known = profile::known_fields(profile, category);
        let prompt = prompts::discovery_prompt(goal_name, category, &known, utils::today());
        let reply = self.one_shot(prompt, GREETING_MAX_TOKENS)?;
        Ok(clean_markdown(&reply))
    }

    /// Ask for a task list. Transport failures propagate; an unreadable reply
    /// yields an empty list.
    pub fn generate_tasks_from_context(
        &self,
        goal: &Goal,
        goal_context: &str,
        profile: &ProfileDocument,
    ) -> Result<Vec<TaskDraft>, AgentError> {
        let prompt = prompts::task_generation_prompt(goal, goal_context, profile, utils::today());
        let reply = self.one_shot(prompt, TASK_GENERATION_MAX_TOKENS)?;
        Ok(extract::extract_tasks(&reply))
    }

    /// Ask which durable facts the conversation revealed about the user
    pub fn extract_profile_updates(
        &self,
        conversation: &[Turn],
        category: &str,
    ) -> Result<Map<String, Value>, AgentError> {
        let prompt = prompts::profile_extraction_prompt(conversation, category);
        let reply = self.one_shot(prompt, EXTRACTION_MAX_TOKENS)?;
        Ok(extract::extract_profile_updates(&reply))
    }
}
