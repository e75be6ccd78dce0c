//! Prompt builders. All pure: they only format the context they are given.

use chrono::NaiveDate;
use std::fmt::Write;

use super::client::{Role, Turn};
use crate::models::{Goal, Task};
use crate::profile::{self, ProfileDocument};
use crate::utils;

/// Counts and names the check-in conversation is grounded on
#[derive(Debug, Clone, Default)]
pub struct CheckinContext {
    pub goals: Vec<Goal>,
    pub yesterday_tasks: Vec<Task>,
    pub today_tasks: Vec<Task>,
    pub overdue_tasks: Vec<Task>,
}

impl CheckinContext {
    fn goal_names(&self) -> Vec<&str> {
        self.goals.iter().map(|g| g.name.as_str()).collect()
    }
}

const NO_MARKDOWN: &str = "Do NOT use markdown formatting.";

pub const GENERIC_SYSTEM_PROMPT: &str =
    "You are a direct, helpful personal productivity agent. Keep responses concise.";

const ACCOUNTABILITY_PERSONA: &str = "You are a direct, firm accountability agent. Your job is to keep the user on track with their goals.

Be conversational but don't waste words. Ask pointed questions about progress and blockers.
If user committed to something, hold them to it (respectfully but firmly).
If user is avoiding work, ask what's really getting in the way.

Keep responses to 2-3 sentences. Be helpful but direct.";

/// Default system instruction for turns that carry a check-in context
pub fn accountability_system_prompt(context: &CheckinContext) -> String {
    let mut prompt = ACCOUNTABILITY_PERSONA.to_string();

    if !context.goals.is_empty() {
        prompt.push_str("\n\nCurrent context:\n");
        let _ = writeln!(prompt, "- Active goals: {}", context.goal_names().join(", "));
    }
    if !context.overdue_tasks.is_empty() {
        let _ = writeln!(prompt, "- Overdue tasks: {} tasks are past due", context.overdue_tasks.len());
    }
    if !context.today_tasks.is_empty() {
        let _ = writeln!(prompt, "- Today's tasks: {} tasks due today", context.today_tasks.len());
    }
    prompt
}

pub fn checkin_greeting_prompt(context: &CheckinContext, today: NaiveDate) -> String {
    format!(
        "You are starting a daily check-in conversation. Be direct and firm.
Today's date is {today}.

Context:
- Active goals: {goals:?}
- Yesterday's completed tasks: {yesterday} tasks
- Today's planned tasks: {planned} tasks
- Overdue tasks: {overdue} tasks

Start with a brief, direct greeting (2-3 sentences).
Reference specific context (overdue tasks, yesterday's work, etc.).
Ask what they're working on today.
{NO_MARKDOWN}",
        today = utils::format_date(today),
        goals = context.goal_names(),
        yesterday = context.yesterday_tasks.len(),
        planned = context.today_tasks.len(),
        overdue = context.overdue_tasks.len(),
    )
}

/// Opening prompt for a goal discovery conversation. Known profile fields are
/// listed so the model does not ask for them again.
pub fn discovery_prompt(
    goal_name: &str,
    category: &str,
    known: &[(String, String)],
    today: NaiveDate,
) -> String {
    let profile_context = if known.is_empty() {
        "No existing profile data for this category.".to_string()
    } else {
        let mut lines = String::from("I already know from their profile:\n");
        for (key, value) in known {
            let _ = writeln!(lines, "- {key}: {value}");
        }
        lines
    };

    format!(
        "You are helping a user set up a new goal: \"{goal_name}\"
Today's date: {today}
Category: {category}
{profile_context}

Ask 1-2 clarifying questions to understand their situation and what they want to achieve.
Be direct and specific. Ask about current state, target outcome, constraints.
Keep it to 2-3 sentences. Don't ask for information you already have.
{NO_MARKDOWN}",
        today = utils::format_date(today),
    )
}

/// System instruction for the follow-up turns of a discovery conversation
pub fn discovery_system_prompt(goal_name: &str, category: &str, known: &[(String, String)]) -> String {
    let mut prompt = format!(
        "You are gathering context for the user's new {category} goal: \"{goal_name}\".
Ask at most 2 clarifying questions per reply. Never ask for something the user already told you.
When you have enough to plan, say so and tell the user to type 'done' to generate tasks.
Keep replies to 2-3 sentences. {NO_MARKDOWN}"
    );
    if !known.is_empty() {
        prompt.push_str("\n\nAlready known about the user:\n");
        for (key, value) in known {
            let _ = writeln!(prompt, "- {key}: {value}");
        }
    }
    prompt
}

/// System instruction for talking a goal through after the task list was rejected
pub fn goal_chat_system_prompt(goal: &Goal, goal_context: &str) -> String {
    format!(
        "You are helping the user think through their goal \"{name}\" before committing to a plan.
They just rejected a generated task list. Find out what felt wrong: scope, pace, or the approach itself.
Keep replies to 2-3 sentences and end with a question. {NO_MARKDOWN}

What you know so far:
{goal_context}",
        name = goal.name,
    )
}

pub fn task_generation_prompt(
    goal: &Goal,
    goal_context: &str,
    profile: &ProfileDocument,
    today: NaiveDate,
) -> String {
    let profile_json = if profile.is_empty() {
        "None".to_string()
    } else {
        serde_json::to_string_pretty(profile).unwrap_or_else(|_| "None".to_string())
    };

    format!(
        "Generate specific, actionable tasks for this goal.

IMPORTANT: Today's date is {today}. All due dates must be today or later.

Goal: {name}
Description: {description}
Deadline: {deadline}

User Profile:
{profile_json}

Goal-Specific Context (from conversation):
{goal_context}

Return ONLY a JSON array. Each task:
- \"description\": specific action
- \"estimated_hours\": realistic estimate
- \"due_date\": YYYY-MM-DD or null

Example:
[
  {{\"description\": \"Task 1\", \"estimated_hours\": 2.5, \"due_date\": \"2026-02-15\"}},
  {{\"description\": \"Task 2\", \"estimated_hours\": 3, \"due_date\": null}}
]

5-10 tasks. Realistic and specific to their situation.",
        today = utils::format_date(today),
        name = goal.name,
        description = goal.description.as_deref().unwrap_or(""),
        deadline = goal.deadline.as_deref().unwrap_or("Not specified"),
    )
}

pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            format!("{role}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn profile_extraction_prompt(conversation: &[Turn], category: &str) -> String {
    format!(
        "Analyze this conversation and extract user facts for their profile.

Category: {category}

Conversation:
{transcript}

Extract generally-true facts (not goal-specific):
- Current role, experience level, company
- Skills, strengths, weaknesses
- Time availability, constraints

Return ONLY a JSON object. Field names:
- current_role, experience_years (number), current_company
- strengths (array), weaknesses (array)
- target_companies (array), target_roles (array)
- availability_hours_per_day (number)

Only include fields explicitly mentioned. Empty object if nothing to extract.",
        transcript = render_transcript(conversation),
    )
}

/// Snapshot the interactive session is grounded on. Built once per session.
pub struct SessionSnapshot<'a> {
    pub profile: &'a ProfileDocument,
    pub goals: &'a [Goal],
    pub active_tasks: &'a [Task],
    pub overdue_tasks: &'a [Task],
    pub today_tasks: &'a [Task],
}

pub fn interactive_system_prompt(snapshot: &SessionSnapshot<'_>, today: NaiveDate) -> String {
    let today_str = utils::format_date(today);
    let name = snapshot
        .profile
        .get("general")
        .and_then(|general| general.get("name"))
        .and_then(|v| v.as_str())
        .filter(|n| !n.trim().is_empty());

    let mut prompt = format!("You are Compass, a personal AI accountability agent. Today is {today_str}.\n");
    if let Some(name) = name {
        let _ = writeln!(prompt, "You are talking to {name}.");
    }
    prompt.push_str(
        "
Your personality: direct, firm, conversational. You don't waste words. You ask pointed questions.
You hold the user accountable to what they committed to, respectfully but firmly.
When the user is stuck, help them think through it. When they're avoiding something, name it.
Keep responses to 2-4 sentences unless more detail is needed.

Do NOT use markdown formatting (no bold, italics, bullet points). Write in plain conversational text.
",
    );

    if !snapshot.goals.is_empty() {
        prompt.push_str("\nACTIVE GOALS:\n");
        for goal in snapshot.goals {
            let _ = write!(prompt, "- \"{}\" (ID {})", goal.name, goal.id.unwrap_or_default());
            if let Some(deadline) = &goal.deadline {
                let _ = write!(prompt, ", deadline {deadline}");
            }
            prompt.push('\n');
        }
    }

    if !snapshot.overdue_tasks.is_empty() {
        let _ = writeln!(prompt, "\nOVERDUE TASKS ({}):", snapshot.overdue_tasks.len());
        for task in snapshot.overdue_tasks {
            let _ = writeln!(
                prompt,
                "- ID {}: \"{}\" (due {})",
                task.id.unwrap_or_default(),
                task.description,
                task.due_date.as_deref().unwrap_or("")
            );
        }
    }

    if !snapshot.today_tasks.is_empty() {
        let _ = writeln!(prompt, "\nDUE TODAY ({}):", snapshot.today_tasks.len());
        for task in snapshot.today_tasks {
            let _ = writeln!(prompt, "- ID {}: \"{}\"", task.id.unwrap_or_default(), task.description);
        }
    }

    if !snapshot.active_tasks.is_empty() {
        let _ = writeln!(prompt, "\nALL ACTIVE TASKS ({}):", snapshot.active_tasks.len());
        for task in snapshot.active_tasks {
            let status = if task.is_overdue(today) { "overdue" } else { "pending" };
            let _ = writeln!(
                prompt,
                "- ID {}: \"{}\" ({status})",
                task.id.unwrap_or_default(),
                task.description
            );
        }
    }

    let facts: Vec<(String, String)> = snapshot
        .profile
        .keys()
        .flat_map(|category| profile::known_fields(snapshot.profile, category))
        .collect();
    if !facts.is_empty() {
        prompt.push_str("\nUSER PROFILE:\n");
        for (key, value) in facts {
            let _ = writeln!(prompt, "- {key}: {value}");
        }
    }

    prompt.push_str(
        "
IMPORTANT BEHAVIORS:
- When the user says they finished something, acknowledge it and ask what's next.
- When the user wants to add a new goal, tell them to use: /new (it starts a guided flow).
- When the user asks about their tasks or goals, reference the actual data above.
- When the user seems stuck or avoidant, ask what's specifically blocking them.
- If the user asks you to mark something done, tell them to use /done <task_id>.
- Keep the conversation moving forward. Always end with a question or next step.
",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day() -> NaiveDate {
        utils::parse_date("2025-06-10").unwrap()
    }

    fn task(id: i64, description: &str, due: Option<&str>) -> Task {
        let mut task = Task::new(1, description.to_string());
        task.id = Some(id);
        task.due_date = due.map(str::to_string);
        task
    }

    #[test]
    fn test_discovery_prompt_lists_known_fields() {
        let known = vec![("current_role".to_string(), "Analyst".to_string())];
        let prompt = discovery_prompt("Get promoted", "career", &known, day());
        assert!(prompt.contains("\"Get promoted\""));
        assert!(prompt.contains("Category: career"));
        assert!(prompt.contains("- current_role: Analyst"));
        assert!(prompt.contains("Ask 1-2 clarifying questions"));
        assert!(!prompt.contains("No existing profile data"));
    }

    #[test]
    fn test_discovery_prompt_without_profile() {
        let prompt = discovery_prompt("Run 5k", "health", &[], day());
        assert!(prompt.contains("No existing profile data for this category."));
        assert!(prompt.contains("2025-06-10"));
    }

    #[test]
    fn test_checkin_greeting_counts() {
        let context = CheckinContext {
            goals: vec![Goal::new("Learn Rust".to_string())],
            yesterday_tasks: vec![task(1, "a", None)],
            today_tasks: vec![task(2, "b", None), task(3, "c", None)],
            overdue_tasks: vec![],
        };
        let prompt = checkin_greeting_prompt(&context, day());
        assert!(prompt.contains("Active goals: [\"Learn Rust\"]"));
        assert!(prompt.contains("Yesterday's completed tasks: 1 tasks"));
        assert!(prompt.contains("Today's planned tasks: 2 tasks"));
        assert!(prompt.contains("Overdue tasks: 0 tasks"));
    }

    #[test]
    fn test_accountability_prompt_only_mentions_present_context() {
        let empty = accountability_system_prompt(&CheckinContext::default());
        assert!(!empty.contains("Current context"));

        let context = CheckinContext {
            goals: vec![Goal::new("A".to_string()), Goal::new("B".to_string())],
            overdue_tasks: vec![task(1, "late", Some("2025-01-01"))],
            ..Default::default()
        };
        let prompt = accountability_system_prompt(&context);
        assert!(prompt.contains("- Active goals: A, B"));
        assert!(prompt.contains("- Overdue tasks: 1 tasks are past due"));
        assert!(!prompt.contains("Today's tasks"));
    }

    #[test]
    fn test_interactive_prompt_embeds_state() {
        let mut profile = ProfileDocument::new();
        profile.insert(
            "general".to_string(),
            json!({"name": "Sam", "timezone": ""}).as_object().cloned().unwrap(),
        );
        let mut goal = Goal::new("Learn Rust".to_string());
        goal.id = Some(4);
        goal.deadline = Some("2025-12-31".to_string());
        let goals = vec![goal];
        let overdue = vec![task(7, "Read ch. 1", Some("2025-06-01"))];
        let active = vec![overdue[0].clone(), task(8, "Write CLI", None)];

        let snapshot = SessionSnapshot {
            profile: &profile,
            goals: &goals,
            active_tasks: &active,
            overdue_tasks: &overdue,
            today_tasks: &[],
        };
        let prompt = interactive_system_prompt(&snapshot, day());
        assert!(prompt.contains("You are talking to Sam."));
        assert!(prompt.contains("- \"Learn Rust\" (ID 4), deadline 2025-12-31"));
        assert!(prompt.contains("OVERDUE TASKS (1):"));
        assert!(prompt.contains("- ID 7: \"Read ch. 1\" (overdue)"));
        assert!(prompt.contains("- ID 8: \"Write CLI\" (pending)"));
        assert!(prompt.contains("- name: Sam"));
        assert!(!prompt.contains("timezone"));
        assert!(!prompt.contains("DUE TODAY"));
    }

    #[test]
    fn test_render_transcript() {
        let turns = vec![Turn::user("hi"), Turn::assistant("what's the goal?")];
        assert_eq!(render_transcript(&turns), "user: hi\nassistant: what's the goal?");
    }
}
