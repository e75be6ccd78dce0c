//! Default chat mode. The system prompt is built once from the current
//! profile, goals and tasks; slash commands are handled locally.

use super::goal::{NewGoalRequest, run_new_goal};
use super::{Console, Services, SessionError, checkin, format_task_line};
use crate::agent::{SessionSnapshot, Turn, prompts};
use crate::models::GoalStatus;
use crate::utils;

const HELP: &str = "Commands:
  /new [name]     set up a new goal with guided discovery
  /done <id>      mark a task done
  /undone <id>    mark a task not done
  /tasks          list active tasks
  /goals          list active goals
  /checkin        run the daily check-in
  /profile        show your profile
  /help           show this help
  /quit           leave";

#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Quit,
}

pub fn build_system_prompt(services: &Services<'_>) -> Result<String, SessionError> {
    let profile = services.profile.load()?;
    let goals = services.db.get_all_goals(GoalStatus::Active)?;
    let active_tasks = services.db.get_all_active_tasks()?;
    let overdue_tasks = services.db.get_overdue_tasks()?;
    let today_tasks = services.db.get_todays_tasks()?;

    let snapshot = SessionSnapshot {
        profile: &profile,
        goals: &goals,
        active_tasks: &active_tasks,
        overdue_tasks: &overdue_tasks,
        today_tasks: &today_tasks,
    };
    Ok(prompts::interactive_system_prompt(&snapshot, utils::today()))
}

/// Run the chat until `/quit` (or an exit word). Returns the number of
/// exchanges with the model.
pub fn run_interactive(
    services: &Services<'_>,
    console: &mut dyn Console,
    max_discovery_turns: usize,
) -> Result<usize, SessionError> {
    let system_prompt = build_system_prompt(services)?;
    console.say("Compass is listening. Type /help for commands, /quit to leave.");

    let mut history: Vec<Turn> = Vec::new();
    let mut exchanges = 0;
    loop {
        let input = console.ask("You")?;
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') || super::is_exit(input) {
            match handle_command(services, console, input, max_discovery_turns) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => continue,
                Err(e @ (SessionError::NoSuchGoal(_) | SessionError::NoSuchTask(_) | SessionError::InvalidDate(_))) => {
                    console.say(&e.to_string());
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        let reply = services
            .agent
            .conversation_turn(&mut history, input, Some(&system_prompt), None)?;
        history.push(Turn::assistant(reply.clone()));
        console.say(&reply);
        exchanges += 1;
    }
    Ok(exchanges)
}

fn parse_id(console: &mut dyn Console, arg: Option<&str>, usage: &str) -> Option<i64> {
    match arg.map(str::parse::<i64>) {
        Some(Ok(id)) => Some(id),
        Some(Err(_)) | None => {
            console.say(&format!("Usage: {}", usage));
            None
        }
    }
}

fn handle_command(
    services: &Services<'_>,
    console: &mut dyn Console,
    input: &str,
    max_discovery_turns: usize,
) -> Result<Flow, SessionError> {
    let mut parts = input.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match command.as_str() {
        "/quit" | "/exit" | "done" | "exit" | "quit" | "bye" => return Ok(Flow::Quit),
        "/help" => console.say(HELP),
        "/new" => {
            let request = NewGoalRequest {
                name: arg.map(str::to_string),
                ..Default::default()
            };
            run_new_goal(services, console, request, max_discovery_turns)?;
        }
        "/done" | "/undone" => {
            let Some(id) = parse_id(console, arg, &format!("{} <task_id>", command)) else {
                return Ok(Flow::Continue);
            };
            let task = services.db.get_task(id)?.ok_or(SessionError::NoSuchTask(id))?;
            if command == "/done" {
                services.db.complete_task(id)?;
                console.say(&format!("✓ Completed task {}: {}", id, task.description));
            } else {
                services.db.uncomplete_task(id)?;
                console.say(&format!("○ Marked task {} as incomplete", id));
            }
        }
        "/tasks" => {
            let tasks = services.db.get_all_active_tasks()?;
            if tasks.is_empty() {
                console.say("No active tasks.");
            }
            for task in &tasks {
                console.say(&format_task_line(task));
            }
        }
        "/goals" => {
            let goals = services.db.get_all_goals(GoalStatus::Active)?;
            if goals.is_empty() {
                console.say("No active goals. Start one with /new.");
            }
            for goal in &goals {
                let mut line = format!("ID {}: {} [{}]", goal.id.unwrap_or_default(), goal.name, goal.category);
                if let Some(deadline) = &goal.deadline {
                    line.push_str(&format!(" (deadline {})", deadline));
                }
                console.say(&line);
            }
        }
        "/checkin" => {
            checkin::run_checkin(services, console)?;
        }
        "/profile" => console.say(&services.profile.summary()?),
        other => console.say(&format!("Unknown command '{}'. Type /help.", other)),
    }
    Ok(Flow::Continue)
}
