use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::utils;

pub const DEFAULT_CATEGORY: &str = "general";

/// Conventional goal categories. Any other text is accepted as-is.
pub const CATEGORIES: [&str; 5] = ["general", "career", "health", "finance", "learning"];

#[derive(Debug, Error)]
#[error("Unknown status: {0}")]
pub struct ParseStatusError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Done,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Archived => "archived",
        }
    }
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Done => "done",
        }
    }
}

impl FromStr for GoalStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GoalStatus::Active),
            "archived" => Ok(GoalStatus::Archived),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "done" => Ok(TaskStatus::Done),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for GoalStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for GoalStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub deadline: Option<String>, // YYYY-MM-DD
    pub status: GoalStatus,
    pub category: String,
    pub context: Option<String>, // JSON, see session::goal::GoalContext
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub goal_id: i64,
    pub description: String,
    pub status: TaskStatus,
    pub estimated_hours: Option<f64>,
    pub due_date: Option<String>, // YYYY-MM-DD
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyLog {
    pub id: Option<i64>,
    pub date: String, // YYYY-MM-DD
    pub task_id: Option<i64>,
    pub hours_spent: f64,
    pub notes: String,
    pub created_at: String,
}

impl Goal {
    pub fn new(name: String) -> Self {
        Self {
            id: None,
            name,
            description: None,
            deadline: None,
            status: GoalStatus::Active,
            category: DEFAULT_CATEGORY.to_string(),
            context: None,
            created_at: utils::now_timestamp(),
        }
    }
}

impl Task {
    pub fn new(goal_id: i64, description: String) -> Self {
        Self {
            id: None,
            goal_id,
            description,
            status: TaskStatus::Todo,
            estimated_hours: None,
            due_date: None,
            created_at: utils::now_timestamp(),
            completed_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Overdue when the due date is strictly before `today` and the task is not done
    pub fn is_overdue(&self, today: chrono::NaiveDate) -> bool {
        if self.is_done() {
            return false;
        }
        self.due_date
            .as_deref()
            .and_then(|d| utils::parse_date(d).ok())
            .is_some_and(|due| due < today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        assert_eq!("done".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert_eq!(GoalStatus::Archived.to_string(), "archived");
        assert!("paused".parse::<GoalStatus>().is_err());
    }

    #[test]
    fn test_task_overdue_ignores_done_tasks() {
        let today = utils::parse_date("2025-06-10").unwrap();
        let mut task = Task::new(1, "Write report".to_string());
        task.due_date = Some("2025-06-09".to_string());
        assert!(task.is_overdue(today));

        task.status = TaskStatus::Done;
        assert!(!task.is_overdue(today));
    }

    #[test]
    fn test_task_due_today_is_not_overdue() {
        let today = utils::parse_date("2025-06-10").unwrap();
        let mut task = Task::new(1, "Stretch".to_string());
        task.due_date = Some("2025-06-10".to_string());
        assert!(!task.is_overdue(today));
    }
}
