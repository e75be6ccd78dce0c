//! Daily check-in: snapshot the day's state, greet, chat until the user
//! leaves, then optionally log time against one active task.

use super::{Console, Services, SessionError, format_task_line, is_exit};
use crate::agent::{CheckinContext, Turn};
use crate::database::Database;
use crate::models::GoalStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckinSummary {
    pub exchanges: usize,
    pub logged: Option<i64>,
}

/// Context used for the greeting and attached, unchanged, to every turn
pub fn build_context(db: &Database) -> Result<CheckinContext, SessionError> {
    Ok(CheckinContext {
        goals: db.get_all_goals(GoalStatus::Active)?,
        yesterday_tasks: db.get_yesterdays_completed_tasks()?,
        today_tasks: db.get_todays_tasks()?,
        overdue_tasks: db.get_overdue_tasks()?,
    })
}

pub fn run_checkin(services: &Services<'_>, console: &mut dyn Console) -> Result<CheckinSummary, SessionError> {
    let context = build_context(services.db)?;
    tracing::info!(
        goals = context.goals.len(),
        today = context.today_tasks.len(),
        overdue = context.overdue_tasks.len(),
        "starting check-in"
    );

    let greeting = services.agent.daily_checkin_greeting(&context)?;
    console.say(&greeting);
    console.say("(Type 'done' to finish the check-in.)");

    let mut history = vec![
        Turn::user("Let's do my daily check-in."),
        Turn::assistant(greeting),
    ];
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
            .conversation_turn(&mut history, input.trim(), None, Some(&context))?;
        history.push(Turn::assistant(reply.clone()));
        console.say(&reply);
        exchanges += 1;
    }

    let logged = offer_progress_log(services.db, console)?;
    Ok(CheckinSummary { exchanges, logged })
}

/// Let the user log hours against an active task picked by its position in
/// the displayed list. Bad input aborts without writing anything.
fn offer_progress_log(db: &Database, console: &mut dyn Console) -> Result<Option<i64>, SessionError> {
    let active = db.get_all_active_tasks()?;
    if active.is_empty() {
        return Ok(None);
    }
    if !console.confirm("Log progress on a task?", false)? {
        return Ok(None);
    }

    console.say("");
    for (i, task) in active.iter().enumerate() {
        console.say(&format!("{}. {}", i + 1, format_task_line(task)));
    }

    let choice = console.ask("Task number")?;
    let Some(task) = choice
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| active.get(i))
    else {
        console.say(&format!("'{}' is not a task number from the list. Nothing logged.", choice.trim()));
        return Ok(None);
    };

    let hours_input = console.ask("How many hours?")?;
    let hours = match hours_input.trim().parse::<f64>() {
        Ok(h) if h.is_finite() && h > 0.0 => h,
        _ => {
            console.say("Hours must be a positive number. Nothing logged.");
            return Ok(None);
        }
    };
    let notes = console.ask("Notes (optional)")?;

    let task_id = task.id.ok_or(SessionError::NoSuchTask(0))?;
    let log_id = db.log_progress(Some(task_id), hours, notes.trim(), None)?;
    console.say(&format!("✓ Logged {}h on task {}", hours, task_id));
    Ok(Some(log_id))
}
