use chrono::{Duration, Local, NaiveDate};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Date format used for every calendar date stored or exchanged (YYYY-MM-DD)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format used for created_at / completed_at columns
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Run mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Dev,
    Prod,
}

impl RunMode {
    fn app_name(self) -> &'static str {
        match self {
            RunMode::Dev => "compass-dev",
            RunMode::Prod => "compass",
        }
    }
}

/// Get the configuration directory path for Compass
/// If mode is Dev, uses "compass-dev" instead of "compass"
pub fn get_config_dir(mode: RunMode) -> Option<PathBuf> {
    ProjectDirs::from("com", "compass", mode.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for Compass
/// If mode is Dev, uses "compass-dev" instead of "compass"
pub fn get_data_dir(mode: RunMode) -> Option<PathBuf> {
    ProjectDirs::from("com", "compass", mode.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(date_str.trim(), DATE_FORMAT)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Today's calendar date in local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn yesterday() -> NaiveDate {
    today() - Duration::days(1)
}

/// Get the current date as an ISO 8601 string (YYYY-MM-DD)
pub fn get_current_date_string() -> String {
    format_date(today())
}

/// Local timestamp for created_at / completed_at columns
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
