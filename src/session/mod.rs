//! Orchestrators: guided goal creation, daily check-in and the interactive
//! chat. They read state from the store, talk through the [`Agent`] and write
//! results back; all user I/O goes through a [`Console`].

pub mod checkin;
pub mod console;
pub mod goal;
pub mod interactive;

use thiserror::Error;

use crate::agent::{Agent, AgentError, Turn};
use crate::database::{Database, DatabaseError};
use crate::models::Task;
use crate::profile::{ProfileError, ProfileStore};

pub use console::{Console, TerminalConsole};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Profile error: {0}")]
    ProfileError(#[from] ProfileError),
    #[error("Agent error: {0}")]
    AgentError(#[from] AgentError),
    #[error("Failed to serialize goal context: {0}")]
    SerializeError(#[from] serde_json::Error),
    #[error("No goal with ID {0}")]
    NoSuchGoal(i64),
    #[error("No task with ID {0}")]
    NoSuchTask(i64),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Prompt failed: {0}")]
    Prompt(String),
}

/// The long-lived service objects a session works with
pub struct Services<'a> {
    pub db: &'a Database,
    pub profile: &'a ProfileStore,
    pub agent: &'a Agent,
}

const EXIT_KEYWORDS: [&str; 5] = ["done", "exit", "quit", "bye", "/quit"];
const READY_KEYWORDS: [&str; 3] = ["done", "ready", "generate"];

fn matches_keyword(input: &str, keywords: &[&str]) -> bool {
    let input = input.trim().to_lowercase();
    keywords.iter().any(|k| *k == input)
}

pub fn is_exit(input: &str) -> bool {
    matches_keyword(input, &EXIT_KEYWORDS)
}

pub fn is_ready(input: &str) -> bool {
    matches_keyword(input, &READY_KEYWORDS)
}

/// One line per task, as shown to the user
pub fn format_task_line(task: &Task) -> String {
    let icon = if task.is_done() { "✓" } else { "○" };
    let mut line = format!("{} ID {}: {}", icon, task.id.unwrap_or_default(), task.description);
    if let Some(hours) = task.estimated_hours {
        line.push_str(&format!(" ({}h)", hours));
    }
    if let Some(due) = &task.due_date {
        line.push_str(&format!(" [due {}]", due));
    }
    line
}

/// Free chat until the user types an exit keyword. Returns the number of
/// exchanges.
pub(crate) fn chat_loop(
    services: &Services<'_>,
    console: &mut dyn Console,
    history: &mut Vec<Turn>,
    system_prompt: &str,
) -> Result<usize, SessionError> {
    let mut exchanges = 0;
    loop {
        let input = console.ask("You")?;
        if input.trim().is_empty() {
            continue;
        }
        if is_exit(&input) {
            break;
        }
        let reply = services
            .agent
            .conversation_turn(history, input.trim(), Some(system_prompt), None)?;
        history.push(Turn::assistant(reply.clone()));
        console.say(&reply);
        exchanges += 1;
    }
    Ok(exchanges)
}
