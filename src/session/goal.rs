//! Guided goal creation: name, optional profile setup, discovery
//! conversation, profile learning, task generation and the
//! accept / regenerate / keep / delete / chat loop.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Console, Services, SessionError, chat_loop, is_ready};
use crate::agent::{Role, Turn, prompts};
use crate::database::Database;
use crate::extract::TaskDraft;
use crate::models::{CATEGORIES, DEFAULT_CATEGORY, Goal, Task};
use crate::profile;
use crate::utils;

/// What the goal's `context` column holds: the discovery transcript plus any
/// feedback given on rejected task lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalContext {
    #[serde(default)]
    pub transcript: Vec<Turn>,
    #[serde(default)]
    pub feedback: Vec<String>,
}

impl GoalContext {
    /// Read a stored context. Absent context is empty; plain text from older
    /// rows is kept as feedback.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Self::default(),
            Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Self {
                transcript: Vec::new(),
                feedback: vec![text.to_string()],
            }),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Text handed to task generation
    pub fn render(&self) -> String {
        let mut text = if self.transcript.is_empty() {
            "No conversation recorded.".to_string()
        } else {
            prompts::render_transcript(&self.transcript)
        };
        if !self.feedback.is_empty() {
            text.push_str("\n\nUser feedback on earlier task lists (most recent last):\n");
            for item in &self.feedback {
                text.push_str(&format!("- {}\n", item));
            }
        }
        text
    }

    fn user_replies(&self) -> usize {
        self.transcript.iter().filter(|t| t.role == Role::User).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewGoalRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GoalOutcome {
    TasksSaved { goal_id: i64, count: usize },
    KeptWithoutTasks { goal_id: i64 },
    Deleted { goal_id: i64 },
    Chatted { goal_id: i64 },
}

const REJECTION_OPTIONS: [&str; 4] = [
    "Regenerate with feedback",
    "Keep the goal without tasks",
    "Delete the goal",
    "Talk it through",
];

/// Run the whole guided flow for one new goal
pub fn run_new_goal(
    services: &Services<'_>,
    console: &mut dyn Console,
    request: NewGoalRequest,
    max_discovery_turns: usize,
) -> Result<GoalOutcome, SessionError> {
    let name = collect_name(console, request.name)?;

    let deadline = match request.deadline.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()) {
        Some(d) => {
            let parsed = utils::parse_date(&d).map_err(|_| SessionError::InvalidDate(d.clone()))?;
            Some(utils::format_date(parsed))
        }
        None => None,
    };

    let category = collect_category(console, request.category)?;

    offer_profile_setup(services, console)?;

    let mut goal = Goal::new(name);
    goal.description = request.description.filter(|d| !d.trim().is_empty());
    goal.deadline = deadline;
    goal.category = category;
    let goal_id = services.db.insert_goal(&goal)?;
    goal.id = Some(goal_id);
    tracing::info!(goal_id, name = %goal.name, category = %goal.category, "created goal");
    console.say(&format!("\n✓ Created goal: {} (ID: {})\n", goal.name, goal_id));

    let transcript = discover(services, console, &goal, max_discovery_turns)?;
    let mut context = GoalContext { transcript, feedback: Vec::new() };
    save_context(services.db, goal_id, &context)?;

    learn_profile(services, console, &context, &goal.category)?;

    confirmation_loop(services, console, &goal, &mut context)
}

fn collect_name(console: &mut dyn Console, name: Option<String>) -> Result<String, SessionError> {
    if let Some(name) = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        return Ok(name);
    }
    loop {
        let name = console.ask("What goal do you want to work on?")?;
        let name = name.trim();
        if !name.is_empty() {
            return Ok(name.to_string());
        }
        console.say("A goal needs a name.");
    }
}

/// A category given up front is taken as-is; otherwise the user picks one of
/// the conventional ones
fn collect_category(console: &mut dyn Console, category: Option<String>) -> Result<String, SessionError> {
    if let Some(category) = category.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()) {
        return Ok(category);
    }
    let choice = console.choose("Which area of your life is this goal in?", &CATEGORIES)?;
    Ok(CATEGORIES.get(choice).unwrap_or(&DEFAULT_CATEGORY).to_string())
}

/// Offer to create the profile skeleton on first use
fn offer_profile_setup(services: &Services<'_>, console: &mut dyn Console) -> Result<(), SessionError> {
    if services.profile.exists() {
        return Ok(());
    }
    if !console.confirm("No profile yet. Set one up now so plans fit you better?", false)? {
        return Ok(());
    }

    services.profile.initialize_default()?;
    let mut general = Map::new();
    let name = console.ask("What should I call you?")?;
    if !name.trim().is_empty() {
        general.insert("name".to_string(), Value::from(name.trim()));
    }
    let hours = console.ask("Hours per day you can realistically give your goals?")?;
    match hours.trim().parse::<f64>() {
        Ok(h) if h > 0.0 => {
            general.insert("availability_hours_per_day".to_string(), Value::from(h));
        }
        _ if hours.trim().is_empty() => {}
        _ => console.say("Skipping availability, that wasn't a positive number."),
    }
    if !general.is_empty() {
        services.profile.update_category("general", general)?;
    }
    console.say("✓ Profile created.");
    Ok(())
}

/// Bounded discovery conversation. Returns the full transcript.
fn discover(
    services: &Services<'_>,
    console: &mut dyn Console,
    goal: &Goal,
    max_turns: usize,
) -> Result<Vec<Turn>, SessionError> {
    let profile = services.profile.load()?;
    let greeting = services
        .agent
        .goal_discovery_greeting(&goal.name, &profile, &goal.category)?;

    let mut opening = format!("I want to set up a new goal: {}", goal.name);
    if let Some(description) = &goal.description {
        opening.push_str(&format!(" ({})", description));
    }
    let mut history = vec![Turn::user(opening), Turn::assistant(greeting.clone())];
    console.say(&greeting);
    console.say("(Answer the questions, or type 'done' when you're ready for tasks.)");

    let known = profile::known_fields(&profile, &goal.category);
    let system = prompts::discovery_system_prompt(&goal.name, &goal.category, &known);

    let mut turns = 0;
    while turns < max_turns {
        let input = console.ask("You")?;
        if is_ready(&input) {
            break;
        }
        if input.trim().is_empty() {
            continue;
        }
        let reply = services
            .agent
            .conversation_turn(&mut history, input.trim(), Some(&system), None)?;
        history.push(Turn::assistant(reply.clone()));
        console.say(&reply);
        turns += 1;
    }
    if turns == max_turns {
        console.say("That's enough to plan with.");
    }
    tracing::info!(goal_id = ?goal.id, turns, "discovery finished");
    Ok(history)
}

fn save_context(db: &Database, goal_id: i64, context: &GoalContext) -> Result<(), SessionError> {
    db.update_goal_context(goal_id, Some(&context.to_json()?))?;
    Ok(())
}

/// Merge whatever durable facts the conversation revealed into the profile
fn learn_profile(
    services: &Services<'_>,
    console: &mut dyn Console,
    context: &GoalContext,
    category: &str,
) -> Result<(), SessionError> {
    // only the seeded opening, nothing to learn from
    if context.user_replies() < 2 {
        return Ok(());
    }
    let updates = services.agent.extract_profile_updates(&context.transcript, category)?;
    if updates.is_empty() {
        return Ok(());
    }
    let keys: Vec<String> = updates.keys().cloned().collect();
    services.profile.update_category(category, updates)?;
    console.say(&format!("✓ Updated your {} profile: {}", category, keys.join(", ")));
    Ok(())
}

fn show_drafts(console: &mut dyn Console, drafts: &[TaskDraft]) {
    console.say("\nProposed tasks:\n");
    for (i, draft) in drafts.iter().enumerate() {
        let mut line = format!("{}. {}", i + 1, draft.description);
        if let Some(hours) = draft.estimated_hours {
            line.push_str(&format!(" ({}h)", hours));
        }
        if let Some(due) = &draft.due_date {
            line.push_str(&format!(" [due {}]", due));
        }
        console.say(&line);
    }
    console.say("");
}

/// Write drafts as tasks under `goal_id` in one transaction, refusing if the
/// goal is gone
pub fn persist_tasks(db: &Database, goal_id: i64, drafts: &[TaskDraft]) -> Result<usize, SessionError> {
    if db.get_goal(goal_id)?.is_none() {
        return Err(SessionError::NoSuchGoal(goal_id));
    }
    let tasks: Vec<Task> = drafts
        .iter()
        .map(|draft| {
            let mut task = Task::new(goal_id, draft.description.clone());
            task.estimated_hours = draft.estimated_hours;
            task.due_date = draft.due_date.clone();
            task
        })
        .collect();
    Ok(db.insert_tasks(&tasks)?.len())
}

fn confirmation_loop(
    services: &Services<'_>,
    console: &mut dyn Console,
    goal: &Goal,
    context: &mut GoalContext,
) -> Result<GoalOutcome, SessionError> {
    let goal_id = goal.id.ok_or(SessionError::NoSuchGoal(0))?;

    loop {
        console.say("\nThinking...");
        let profile = services.profile.load()?;
        let drafts = services
            .agent
            .generate_tasks_from_context(goal, &context.render(), &profile)?;

        if drafts.is_empty() {
            console.say("Could not generate tasks. You can retry with more detail or add tasks by hand with `compass add-task`.");
        } else {
            show_drafts(console, &drafts);
            if console.confirm("Add these tasks?", true)? {
                let count = persist_tasks(services.db, goal_id, &drafts)?;
                tracing::info!(goal_id, count, "saved generated tasks");
                console.say(&format!("✓ Added {} tasks to goal {}", count, goal_id));
                return Ok(GoalOutcome::TasksSaved { goal_id, count });
            }
        }

        match console.choose("What would you like to do?", &REJECTION_OPTIONS)? {
            0 => {
                let feedback = console.ask("What should be different?")?;
                if !feedback.trim().is_empty() {
                    context.feedback.push(feedback.trim().to_string());
                    save_context(services.db, goal_id, context)?;
                }
                tracing::info!(goal_id, rounds = context.feedback.len(), "regenerating tasks");
            }
            1 => {
                console.say(&format!("Kept goal {} without tasks.", goal_id));
                return Ok(GoalOutcome::KeptWithoutTasks { goal_id });
            }
            2 => {
                services.db.delete_goal(goal_id)?;
                console.say(&format!("✓ Deleted goal {}", goal_id));
                return Ok(GoalOutcome::Deleted { goal_id });
            }
            _ => {
                let system = prompts::goal_chat_system_prompt(goal, &context.render());
                console.say("Let's talk it through. Type 'done' when you're finished.");
                let mut history = context.transcript.clone();
                chat_loop(services, console, &mut history, &system)?;
                context.transcript = history;
                save_context(services.db, goal_id, context)?;
                return Ok(GoalOutcome::Chatted { goal_id });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_parse_handles_missing_and_legacy_text() {
        assert_eq!(GoalContext::parse(None), GoalContext::default());
        assert_eq!(GoalContext::parse(Some("  ")), GoalContext::default());

        let legacy = GoalContext::parse(Some("wants to switch careers"));
        assert!(legacy.transcript.is_empty());
        assert_eq!(legacy.feedback, vec!["wants to switch careers".to_string()]);
    }

    #[test]
    fn test_context_json_round_trip() {
        let context = GoalContext {
            transcript: vec![Turn::user("hi"), Turn::assistant("why?")],
            feedback: vec!["fewer tasks".to_string()],
        };
        let json = context.to_json().unwrap();
        assert_eq!(GoalContext::parse(Some(&json)), context);
    }

    #[test]
    fn test_render_includes_transcript_and_feedback() {
        let context = GoalContext {
            transcript: vec![Turn::user("I work nights")],
            feedback: vec!["too many tasks".to_string(), "start smaller".to_string()],
        };
        let text = context.render();
        assert!(text.starts_with("user: I work nights"));
        assert!(text.contains("- too many tasks\n- start smaller"));
    }

    #[test]
    fn test_persist_tasks_requires_goal() {
        let db = Database::in_memory().unwrap();
        let drafts = vec![TaskDraft {
            description: "x".to_string(),
            estimated_hours: None,
            due_date: None,
        }];
        assert!(matches!(
            persist_tasks(&db, 3, &drafts),
            Err(SessionError::NoSuchGoal(3))
        ));
        assert!(db.get_all_active_tasks().unwrap().is_empty());
    }

    #[test]
    fn test_persist_tasks_stores_drafts_in_order() {
        let db = Database::in_memory().unwrap();
        let goal_id = db.insert_goal(&Goal::new("Learn Rust".to_string())).unwrap();
        let drafts = vec![
            TaskDraft {
                description: "Read the book".to_string(),
                estimated_hours: Some(3.0),
                due_date: Some("2099-01-01".to_string()),
            },
            TaskDraft {
                description: "Build a CLI".to_string(),
                estimated_hours: None,
                due_date: None,
            },
        ];
        assert_eq!(persist_tasks(&db, goal_id, &drafts).unwrap(), 2);

        let tasks = db.get_tasks_for_goal(goal_id, None).unwrap();
        let descriptions: Vec<&str> = tasks.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Read the book", "Build a CLI"]);
        assert_eq!(tasks[0].estimated_hours, Some(3.0));
        assert_eq!(tasks[0].due_date.as_deref(), Some("2099-01-01"));
    }
}
