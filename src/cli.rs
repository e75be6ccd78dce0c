use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::agent::{Agent, AgentError, AnthropicClient};
use crate::config::Config;
use crate::database::{Database, DatabaseError};
use crate::models::{Goal, GoalStatus, Task, TaskStatus};
use crate::profile::{ProfileError, ProfileStore};
use crate::session::goal::{GoalOutcome, NewGoalRequest};
use crate::session::{Console, SessionError, format_task_line};
use crate::utils::{self, parse_date};

#[derive(Parser)]
#[command(name = "compass")]
#[command(about = "Compass - goals, tasks and daily check-ins with an AI accountability agent")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Verbose logging to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with your agent (default if no subcommand)
    Chat,
    /// Set up a new goal with guided discovery and generated tasks
    New {
        /// Goal name (asked for if omitted)
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
        /// general, career, health, finance, learning, ...
        #[arg(long)]
        category: Option<String>,
    },
    /// Add a goal without the guided flow
    AddGoal {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List goals
    Goals {
        /// Show archived goals instead of active ones
        #[arg(long)]
        archived: bool,
    },
    /// Add a task to a goal
    AddTask {
        goal_id: i64,
        description: String,
        /// Estimated hours
        #[arg(long)]
        hours: Option<f64>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },
    /// List tasks for a goal
    Tasks {
        goal_id: i64,
    },
    /// Show overdue tasks and tasks due today
    Today,
    /// Mark a task as complete
    Done {
        task_id: i64,
    },
    /// Mark a task as incomplete
    Undone {
        task_id: i64,
    },
    /// Delete a task
    DeleteTask {
        task_id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete a goal and all its tasks
    DeleteGoal {
        goal_id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Daily check-in with your agent
    Checkin,
    /// Log hours of progress
    Log {
        hours: f64,
        notes: Option<String>,
        /// Task the time was spent on
        #[arg(long)]
        task: Option<i64>,
    },
    /// View or edit your profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileCommand>,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Print the profile
    Show,
    /// Write the default profile skeleton
    Init {
        /// Overwrite an existing profile
        #[arg(long)]
        force: bool,
    },
    /// Set one field; JSON values (numbers, lists) are accepted
    Set {
        category: String,
        field: String,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Profile error: {0}")]
    ProfileError(#[from] ProfileError),
    #[error("{0}")]
    SessionError(#[from] SessionError),
    #[error("{0}")]
    AgentError(#[from] AgentError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("No goal with ID {0}")]
    NoSuchGoal(i64),
    #[error("No task with ID {0}")]
    NoSuchTask(i64),
    #[error("{0}")]
    InvalidInput(String),
}

/// Build the agent from config and the API key in the environment
pub fn build_agent(config: &Config) -> Result<Agent, AgentError> {
    let client = AnthropicClient::from_env(&config.api_base_url, &config.model)?;
    Ok(Agent::new(Box::new(client)))
}

fn validate_date(input: Option<String>) -> Result<Option<String>, CliError> {
    match input {
        Some(date_str) => {
            let date = parse_date(&date_str)
                .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", date_str, e)))?;
            Ok(Some(utils::format_date(date)))
        }
        None => Ok(None),
    }
}

fn require_goal(db: &Database, goal_id: i64) -> Result<Goal, CliError> {
    db.get_goal(goal_id)?.ok_or(CliError::NoSuchGoal(goal_id))
}

fn require_task(db: &Database, task_id: i64) -> Result<Task, CliError> {
    db.get_task(task_id)?.ok_or(CliError::NoSuchTask(task_id))
}

/// Handle the add-goal command
pub fn handle_add_goal(
    name: String,
    description: Option<String>,
    deadline: Option<String>,
    category: Option<String>,
    db: &Database,
) -> Result<i64, CliError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(CliError::InvalidInput("Goal name cannot be empty".to_string()));
    }

    let mut goal = Goal::new(name);
    goal.description = description;
    goal.deadline = validate_date(deadline)?;
    if let Some(category) = category.filter(|c| !c.trim().is_empty()) {
        goal.category = category.trim().to_lowercase();
    }

    let id = db.insert_goal(&goal)?;
    println!("✓ Added goal: {} (ID: {})", goal.name, id);
    Ok(id)
}

/// Handle the new command (guided flow)
pub fn handle_new_goal(
    request: NewGoalRequest,
    config: &Config,
    db: &Database,
    profile: &ProfileStore,
    console: &mut dyn Console,
) -> Result<GoalOutcome, CliError> {
    let agent = build_agent(config)?;
    let services = crate::session::Services { db, profile, agent: &agent };
    let outcome = crate::session::goal::run_new_goal(&services, console, request, config.max_discovery_turns)?;
    Ok(outcome)
}

/// Handle the goals command
pub fn handle_list_goals(archived: bool, db: &Database) -> Result<(), CliError> {
    let status = if archived { GoalStatus::Archived } else { GoalStatus::Active };
    let goals = db.get_all_goals(status)?;

    if goals.is_empty() {
        println!("No {} goals. Add one with: compass new", status);
        return Ok(());
    }

    println!("\nYour Goals:\n");
    for goal in goals {
        let id = goal.id.unwrap_or_default();
        let tasks = db.get_tasks_for_goal(id, None)?;
        let done = tasks.iter().filter(|t| t.is_done()).count();
        println!("ID {}: {} [{}] ({}/{} tasks done)", id, goal.name, goal.category, done, tasks.len());
        if let Some(deadline) = &goal.deadline {
            println!("   Deadline: {}", deadline);
        }
        if let Some(description) = goal.description.as_deref().filter(|d| !d.is_empty()) {
            println!("   {}", description);
        }
        println!();
    }
    Ok(())
}

/// Handle the add-task command
pub fn handle_add_task(
    goal_id: i64,
    description: String,
    hours: Option<f64>,
    due: Option<String>,
    db: &Database,
) -> Result<i64, CliError> {
    let description = description.trim().to_string();
    if description.is_empty() {
        return Err(CliError::InvalidInput("Task description cannot be empty".to_string()));
    }
    if let Some(h) = hours {
        if !(h.is_finite() && h > 0.0) {
            return Err(CliError::InvalidInput(format!("Estimated hours must be positive, got {}", h)));
        }
    }
    let due_date = validate_date(due)?;
    require_goal(db, goal_id)?;

    let mut task = Task::new(goal_id, description);
    task.estimated_hours = hours;
    task.due_date = due_date;

    let id = db.insert_task(&task)?;
    println!("✓ Added task: {} (ID: {})", task.description, id);
    Ok(id)
}

/// Handle the tasks command
pub fn handle_list_tasks(goal_id: i64, db: &Database) -> Result<(), CliError> {
    let goal = require_goal(db, goal_id)?;
    let tasks = db.get_tasks_for_goal(goal_id, None)?;

    if tasks.is_empty() {
        println!("No tasks for goal {} ({})", goal_id, goal.name);
        return Ok(());
    }

    println!("\nTasks for {} (goal {}):\n", goal.name, goal_id);
    let today = utils::today();
    for task in tasks {
        let overdue = if task.is_overdue(today) { "  OVERDUE" } else { "" };
        println!("{}{}", format_task_line(&task), overdue);
    }
    println!();
    Ok(())
}

/// Handle the today command
pub fn handle_today(db: &Database) -> Result<(), CliError> {
    let overdue = db.get_overdue_tasks()?;
    let due_today = db.get_todays_tasks()?;

    if overdue.is_empty() && due_today.is_empty() {
        println!("Nothing overdue and nothing due today.");
        return Ok(());
    }
    if !overdue.is_empty() {
        println!("\nOverdue ({}):", overdue.len());
        for task in &overdue {
            println!("  {}", format_task_line(task));
        }
    }
    if !due_today.is_empty() {
        println!("\nDue today ({}):", due_today.len());
        for task in &due_today {
            println!("  {}", format_task_line(task));
        }
    }
    println!();
    Ok(())
}

/// Handle the done and undone commands
pub fn handle_set_status(task_id: i64, status: TaskStatus, db: &Database) -> Result<(), CliError> {
    let task = require_task(db, task_id)?;
    match status {
        TaskStatus::Done => {
            db.complete_task(task_id)?;
            println!("✓ Completed task {}: {}", task_id, task.description);
        }
        TaskStatus::Todo => {
            db.uncomplete_task(task_id)?;
            println!("○ Marked task {} as incomplete", task_id);
        }
    }
    Ok(())
}

/// Handle the delete-task command. Returns whether anything was deleted.
pub fn handle_delete_task(task_id: i64, yes: bool, db: &Database, console: &mut dyn Console) -> Result<bool, CliError> {
    let task = require_task(db, task_id)?;
    if !yes && !console.confirm(&format!("Delete task {} ({})?", task_id, task.description), false)? {
        return Ok(false);
    }
    db.delete_task(task_id)?;
    println!("✓ Deleted task {}", task_id);
    Ok(true)
}

/// Handle the delete-goal command. Returns whether anything was deleted.
pub fn handle_delete_goal(goal_id: i64, yes: bool, db: &Database, console: &mut dyn Console) -> Result<bool, CliError> {
    let goal = require_goal(db, goal_id)?;
    let count = db.get_tasks_for_goal(goal_id, None)?.len();
    let prompt = format!("Delete goal {} ({}) and ALL {} of its tasks?", goal_id, goal.name, count);
    if !yes && !console.confirm(&prompt, false)? {
        return Ok(false);
    }
    db.delete_goal(goal_id)?;
    println!("✓ Deleted goal {}", goal_id);
    Ok(true)
}

/// Handle the checkin command
pub fn handle_checkin(
    config: &Config,
    db: &Database,
    profile: &ProfileStore,
    console: &mut dyn Console,
) -> Result<(), CliError> {
    let agent = build_agent(config)?;
    let services = crate::session::Services { db, profile, agent: &agent };
    crate::session::checkin::run_checkin(&services, console)?;
    Ok(())
}

/// Handle the log command
pub fn handle_log(hours: f64, notes: Option<String>, task: Option<i64>, db: &Database) -> Result<i64, CliError> {
    if !(hours.is_finite() && hours > 0.0) {
        return Err(CliError::InvalidInput(format!("Hours must be positive, got {}", hours)));
    }
    if let Some(task_id) = task {
        require_task(db, task_id)?;
    }
    let id = db.log_progress(task, hours, notes.as_deref().unwrap_or(""), None)?;
    let total: f64 = db.get_logs_on(utils::today())?.iter().map(|l| l.hours_spent).sum();
    println!("✓ Logged {}h ({}h so far today)", hours, total);
    Ok(id)
}

/// Handle the profile command and its actions
pub fn handle_profile(action: Option<ProfileCommand>, profile: &ProfileStore) -> Result<(), CliError> {
    match action.unwrap_or(ProfileCommand::Show) {
        ProfileCommand::Show => println!("{}", profile.summary()?),
        ProfileCommand::Init { force } => {
            if profile.exists() && !force {
                return Err(CliError::InvalidInput(format!(
                    "Profile already exists at {} (use --force to overwrite)",
                    profile.path().display()
                )));
            }
            profile.initialize_default()?;
            println!("✓ Created profile at {}", profile.path().display());
        }
        ProfileCommand::Set { category, field, value } => {
            let parsed = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            let mut fields = Map::new();
            fields.insert(field.clone(), parsed);
            profile.update_category(&category, fields)?;
            println!("✓ Set {}.{}", category, field);
        }
    }
    Ok(())
}
