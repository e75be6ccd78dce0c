use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{DailyLog, Goal, GoalStatus, Task, TaskStatus};
use crate::utils;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
}

const GOAL_COLUMNS: &str =
    "id, name, description, deadline, status, category, context, created_at";

const TASK_COLUMNS: &str =
    "id, goal_id, description, status, estimated_hours, due_date, created_at, completed_at";

/// Durable store for goals, tasks and daily logs.
///
/// Every mutating call commits before it returns, so the next read on the same
/// handle always sees the change.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        tracing::debug!(path = %db_path.display(), "opened database");
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and dry runs
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        // Goal and task references are enforced by SQLite
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS goals (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL,
                description     TEXT,
                deadline        TEXT,
                status          TEXT DEFAULT 'active',
                category        TEXT DEFAULT 'general',
                context         TEXT,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                goal_id         INTEGER,
                description     TEXT NOT NULL,
                status          TEXT DEFAULT 'todo',
                estimated_hours REAL,
                due_date        TEXT,
                created_at      TEXT NOT NULL,
                completed_at    TEXT,
                FOREIGN KEY (goal_id) REFERENCES goals (id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS daily_logs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                date            TEXT NOT NULL,
                task_id         INTEGER,
                hours_spent     REAL,
                notes           TEXT,
                created_at      TEXT NOT NULL,
                FOREIGN KEY (task_id) REFERENCES tasks (id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_goal_id ON tasks(goal_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_daily_logs_date ON daily_logs(date)",
            [],
        )?;

        self.migrate_goal_columns()?;

        Ok(())
    }

    /// Older databases were created before goals carried a category and a context
    fn migrate_goal_columns(&self) -> Result<(), DatabaseError> {
        fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
            let mut stmt = conn.prepare(
                "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2"
            )?;
            let count: i64 = stmt.query_row(rusqlite::params![table, column], |row| row.get(0))?;
            Ok(count > 0)
        }

        if !column_exists(&self.conn, "goals", "category")? {
            tracing::info!("adding goals.category column");
            self.conn.execute(
                "ALTER TABLE goals ADD COLUMN category TEXT DEFAULT 'general'",
                [],
            )?;
        }

        if !column_exists(&self.conn, "goals", "context")? {
            tracing::info!("adding goals.context column");
            self.conn.execute("ALTER TABLE goals ADD COLUMN context TEXT", [])?;
        }

        Ok(())
    }

    // ============ Goals ============

    /// Insert a goal and return its ID
    pub fn insert_goal(&self, goal: &Goal) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO goals (name, description, deadline, status, category, context, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                goal.name,
                goal.description,
                goal.deadline,
                goal.status,
                goal.category,
                goal.context,
                goal.created_at
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(goal_id = id, name = %goal.name, "inserted goal");
        Ok(id)
    }

    fn row_to_goal(row: &rusqlite::Row) -> Result<Goal, rusqlite::Error> {
        Ok(Goal {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
            deadline: row.get(3)?,
            status: row.get::<_, Option<GoalStatus>>(4)?.unwrap_or(GoalStatus::Active),
            category: row
                .get::<_, Option<String>>(5)?
                .unwrap_or_else(|| crate::models::DEFAULT_CATEGORY.to_string()),
            context: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    /// Get goals with the given status, newest first
    pub fn get_all_goals(&self, status: GoalStatus) -> Result<Vec<Goal>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE status = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let goals = stmt
            .query_map(rusqlite::params![status], Self::row_to_goal)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    /// Get a single goal by ID, `None` if it doesn't exist
    pub fn get_goal(&self, id: i64) -> Result<Option<Goal>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"))?;
        let goal = stmt
            .query_row(rusqlite::params![id], Self::row_to_goal)
            .optional()?;
        Ok(goal)
    }

    /// Overwrite the conversation context stored on a goal
    pub fn update_goal_context(&self, id: i64, context: Option<&str>) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE goals SET context = ?1 WHERE id = ?2",
            rusqlite::params![context, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a goal and every task it owns. Progress logged against those
    /// tasks is kept, detached from the task.
    pub fn delete_goal(&self, id: i64) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE daily_logs SET task_id = NULL
             WHERE task_id IN (SELECT id FROM tasks WHERE goal_id = ?1)",
            rusqlite::params![id],
        )?;
        let removed = tx.execute("DELETE FROM tasks WHERE goal_id = ?1", rusqlite::params![id])?;
        tx.execute("DELETE FROM goals WHERE id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        tracing::debug!(goal_id = id, tasks_removed = removed, "deleted goal");
        Ok(())
    }

    // ============ Tasks ============

    /// Insert a task and return its ID. Fails with a constraint error if the
    /// goal does not exist.
    pub fn insert_task(&self, task: &Task) -> Result<i64, DatabaseError> {
        Self::insert_task_row(&self.conn, task)
    }

    /// Insert several tasks in one transaction: either all are stored or none
    pub fn insert_tasks(&self, tasks: &[Task]) -> Result<Vec<i64>, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let ids = tasks
            .iter()
            .map(|task| Self::insert_task_row(&tx, task))
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit()?;
        Ok(ids)
    }

    fn insert_task_row(conn: &Connection, task: &Task) -> Result<i64, DatabaseError> {
        conn.execute(
            "INSERT INTO tasks (goal_id, description, status, estimated_hours, due_date, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                task.goal_id,
                task.description,
                task.status,
                task.estimated_hours,
                task.due_date,
                task.created_at,
                task.completed_at
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(task_id = id, goal_id = task.goal_id, "inserted task");
        Ok(id)
    }

    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        Ok(Task {
            id: Some(row.get(0)?),
            goal_id: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
            description: row.get(2)?,
            status: row.get::<_, Option<TaskStatus>>(3)?.unwrap_or(TaskStatus::Todo),
            estimated_hours: row.get(4)?,
            due_date: row.get(5)?,
            created_at: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }

    fn query_tasks<P: rusqlite::Params>(&self, filter: &str, params: P) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks {filter}"))?;
        let tasks = stmt
            .query_map(params, Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Get tasks for a goal in creation order, optionally filtered by status
    pub fn get_tasks_for_goal(&self, goal_id: i64, status: Option<TaskStatus>) -> Result<Vec<Task>, DatabaseError> {
        match status {
            Some(status) => self.query_tasks(
                "WHERE goal_id = ?1 AND status = ?2 ORDER BY created_at, id",
                rusqlite::params![goal_id, status],
            ),
            None => self.query_tasks(
                "WHERE goal_id = ?1 ORDER BY created_at, id",
                rusqlite::params![goal_id],
            ),
        }
    }

    /// Get a single task by ID, `None` if it doesn't exist
    pub fn get_task(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
        let task = stmt
            .query_row(rusqlite::params![id], Self::row_to_task)
            .optional()?;
        Ok(task)
    }

    /// Mark a task done and stamp completed_at. No-op for unknown IDs.
    pub fn complete_task(&self, id: i64) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE tasks SET status = ?1, completed_at = ?2 WHERE id = ?3",
            rusqlite::params![TaskStatus::Done, utils::now_timestamp(), id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Mark a task todo again and clear completed_at. No-op for unknown IDs.
    pub fn uncomplete_task(&self, id: i64) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE tasks SET status = ?1, completed_at = NULL WHERE id = ?2",
            rusqlite::params![TaskStatus::Todo, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a task by ID. Its progress log entries are kept, detached.
    pub fn delete_task(&self, id: i64) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE daily_logs SET task_id = NULL WHERE task_id = ?1",
            rusqlite::params![id],
        )?;
        tx.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(())
    }

    /// Tasks whose due date is `date`, whatever their status
    pub fn get_tasks_due_on(&self, date: NaiveDate) -> Result<Vec<Task>, DatabaseError> {
        self.query_tasks(
            "WHERE due_date = ?1 ORDER BY created_at, id",
            rusqlite::params![utils::format_date(date)],
        )
    }

    pub fn get_todays_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        self.get_tasks_due_on(utils::today())
    }

    /// Tasks whose completed_at falls on the calendar day `date`
    pub fn get_tasks_completed_on(&self, date: NaiveDate) -> Result<Vec<Task>, DatabaseError> {
        self.query_tasks(
            "WHERE status = 'done' AND DATE(completed_at) = ?1 ORDER BY completed_at, id",
            rusqlite::params![utils::format_date(date)],
        )
    }

    pub fn get_yesterdays_completed_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        self.get_tasks_completed_on(utils::yesterday())
    }

    /// Tasks due strictly before `today` that are not done, earliest due first
    pub fn get_overdue_tasks_as_of(&self, today: NaiveDate) -> Result<Vec<Task>, DatabaseError> {
        self.query_tasks(
            "WHERE due_date IS NOT NULL AND due_date < ?1 AND status != 'done'
             ORDER BY due_date, id",
            rusqlite::params![utils::format_date(today)],
        )
    }

    pub fn get_overdue_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        self.get_overdue_tasks_as_of(utils::today())
    }

    /// All tasks that are not done, in creation order
    pub fn get_all_active_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        self.query_tasks("WHERE status != 'done' ORDER BY created_at, id", [])
    }

    // ============ Daily logs ============

    /// Append a progress entry. `date` defaults to today.
    pub fn log_progress(
        &self,
        task_id: Option<i64>,
        hours_spent: f64,
        notes: &str,
        date: Option<NaiveDate>,
    ) -> Result<i64, DatabaseError> {
        let date = utils::format_date(date.unwrap_or_else(utils::today));
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO daily_logs (date, task_id, hours_spent, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![date, task_id, hours_spent, notes, utils::now_timestamp()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        tracing::debug!(log_id = id, ?task_id, hours_spent, "logged progress");
        Ok(id)
    }

    /// Log entries recorded for `date`, in insertion order
    pub fn get_logs_on(&self, date: NaiveDate) -> Result<Vec<DailyLog>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, task_id, hours_spent, notes, created_at
             FROM daily_logs WHERE date = ?1 ORDER BY id",
        )?;
        let logs = stmt
            .query_map(rusqlite::params![utils::format_date(date)], |row| {
                Ok(DailyLog {
                    id: Some(row.get(0)?),
                    date: row.get(1)?,
                    task_id: row.get(2)?,
                    hours_spent: row.get::<_, Option<f64>>(3)?.unwrap_or_default(),
                    notes: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}
