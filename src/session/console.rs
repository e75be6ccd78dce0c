use dialoguer::{Confirm, Input, Select};
use dialoguer::theme::ColorfulTheme;

use super::SessionError;

/// User-facing I/O for the orchestrators. The terminal implementation uses
/// dialoguer; tests script it.
pub trait Console {
    /// Show a line of output
    fn say(&mut self, text: &str);

    /// Read one line of free text (may be empty)
    fn ask(&mut self, prompt: &str) -> Result<String, SessionError>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, SessionError>;

    /// Pick one of `options`, returning its index
    fn choose(&mut self, prompt: &str, options: &[&str]) -> Result<usize, SessionError>;
}

pub struct TerminalConsole {
    theme: ColorfulTheme,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self { theme: ColorfulTheme::default() }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn say(&mut self, text: &str) {
        println!("{}", text);
    }

    fn ask(&mut self, prompt: &str) -> Result<String, SessionError> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| SessionError::Prompt(e.to_string()))
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, SessionError> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(|e| SessionError::Prompt(e.to_string()))
    }

    fn choose(&mut self, prompt: &str, options: &[&str]) -> Result<usize, SessionError> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact()
            .map_err(|e| SessionError::Prompt(e.to_string()))
    }
}
