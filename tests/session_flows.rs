use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use compass::agent::{Agent, AgentError, ModelClient, ModelRequest, Role};
use compass::models::{Goal, GoalStatus, Task, TaskStatus};
use compass::session::goal::{GoalContext, GoalOutcome, NewGoalRequest, run_new_goal};
use compass::session::{Console, Services, SessionError, checkin, interactive};
use compass::{Database, ProfileStore, utils};
use tempfile::TempDir;

type RequestLog = Rc<RefCell<Vec<ModelRequest>>>;

struct ScriptedModel {
    replies: RefCell<VecDeque<String>>,
    seen: RequestLog,
}

impl ModelClient for ScriptedModel {
    fn send(&self, request: &ModelRequest) -> Result<String, AgentError> {
        self.seen.borrow_mut().push(request.clone());
        self.replies.borrow_mut().pop_front().ok_or(AgentError::EmptyResponse)
    }
}

fn scripted_agent(replies: &[&str]) -> (Agent, RequestLog) {
    let seen: RequestLog = Rc::new(RefCell::new(Vec::new()));
    let model = ScriptedModel {
        replies: RefCell::new(replies.iter().map(|r| r.to_string()).collect()),
        seen: Rc::clone(&seen),
    };
    (Agent::new(Box::new(model)), seen)
}

#[derive(Default)]
struct ScriptedConsole {
    answers: VecDeque<String>,
    confirms: VecDeque<bool>,
    choices: VecDeque<usize>,
    output: Vec<String>,
}

impl ScriptedConsole {
    fn new(answers: &[&str], confirms: &[bool], choices: &[usize]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            confirms: confirms.iter().copied().collect(),
            choices: choices.iter().copied().collect(),
            output: Vec::new(),
        }
    }

    fn printed(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }
}

impl Console for ScriptedConsole {
    fn say(&mut self, text: &str) {
        self.output.push(text.to_string());
    }

    fn ask(&mut self, _prompt: &str) -> Result<String, SessionError> {
        self.answers
            .pop_front()
            .ok_or_else(|| SessionError::Prompt("script ran out of answers".to_string()))
    }

    fn confirm(&mut self, _prompt: &str, _default: bool) -> Result<bool, SessionError> {
        self.confirms
            .pop_front()
            .ok_or_else(|| SessionError::Prompt("script ran out of confirmations".to_string()))
    }

    fn choose(&mut self, _prompt: &str, options: &[&str]) -> Result<usize, SessionError> {
        let choice = self
            .choices
            .pop_front()
            .ok_or_else(|| SessionError::Prompt("script ran out of choices".to_string()))?;
        assert!(choice < options.len());
        Ok(choice)
    }
}

struct Fixture {
    _dir: TempDir,
    db: Database,
    profile: ProfileStore,
}

fn fixture(with_profile: bool) -> Fixture {
    let dir = TempDir::new().unwrap();
    let profile = ProfileStore::new(dir.path().join("user_profile.json"));
    if with_profile {
        profile.initialize_default().unwrap();
    }
    Fixture { _dir: dir, db: Database::in_memory().unwrap(), profile }
}

const TASKS_REPLY: &str = r#"Sure! Here's a plan:
[
  {"description": "Read chapters 1-3 of the Rust book", "estimated_hours": 4, "due_date": "2099-01-10"},
  {"description": "Write a CLI todo app", "estimated_hours": "6", "due_date": null}
]
Let me know!"#;

fn request(name: &str, category: &str) -> NewGoalRequest {
    NewGoalRequest {
        name: Some(name.to_string()),
        category: Some(category.to_string()),
        ..Default::default()
    }
}

#[test]
fn accepted_tasks_are_persisted_and_profile_learns() {
    let fx = fixture(false);
    let (agent, seen) = scripted_agent(&[
        "What's your **current** experience?",
        "Got it. Anything else?",
        r#"{"current_role": "Backend developer", "availability_hours_per_day": 1}"#,
        TASKS_REPLY,
    ]);
    let services = Services { db: &fx.db, profile: &fx.profile, agent: &agent };
    let mut console = ScriptedConsole::new(
        &["I write Python at work, about an hour a day free", "done"],
        &[false, true],
        &[],
    );

    let outcome = run_new_goal(&services, &mut console, request("Learn Rust", "learning"), 6).unwrap();

    let GoalOutcome::TasksSaved { goal_id, count } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert_eq!(count, 2);
    assert!(console.printed("What's your current experience?"));

    let tasks = fx.db.get_tasks_for_goal(goal_id, None).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].description, "Read chapters 1-3 of the Rust book");
    assert_eq!(tasks[0].due_date.as_deref(), Some("2099-01-10"));
    assert_eq!(tasks[1].estimated_hours, Some(6.0));
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Todo));

    let goal = fx.db.get_goal(goal_id).unwrap().unwrap();
    assert_eq!(goal.category, "learning");
    let context = GoalContext::parse(goal.context.as_deref());
    assert_eq!(context.transcript.len(), 4);
    assert_eq!(context.transcript[2].content, "I write Python at work, about an hour a day free");
    assert_eq!(context.transcript[3].role, Role::Assistant);

    let learning = fx.profile.get_category("learning").unwrap();
    assert_eq!(learning["current_role"], "Backend developer");

    let requests = seen.borrow();
    assert_eq!(requests.len(), 4);
    // discovery follow-up carries the full transcript so far
    assert_eq!(requests[1].turns.len(), 3);
    assert!(requests[3].turns[0].content.contains("about an hour a day free"));
}

#[test]
fn regeneration_keeps_transcript_and_adds_feedback() {
    let fx = fixture(true);
    let (agent, seen) = scripted_agent(&[
        "How much time do you have?",
        "Here you go: [{\"description\": \"broken\", }]",
        TASKS_REPLY,
    ]);
    let services = Services { db: &fx.db, profile: &fx.profile, agent: &agent };
    let mut console = ScriptedConsole::new(&["smaller steps please"], &[false], &[0, 2]);

    let outcome = run_new_goal(&services, &mut console, request("Run a 10k", "health"), 0).unwrap();

    let GoalOutcome::Deleted { goal_id } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(console.printed("Could not generate tasks"));
    assert!(fx.db.get_goal(goal_id).unwrap().is_none());
    assert!(fx.db.get_tasks_for_goal(goal_id, None).unwrap().is_empty());

    let requests = seen.borrow();
    assert_eq!(requests.len(), 3);
    let first = &requests[1].turns[0].content;
    let second = &requests[2].turns[0].content;
    assert!(first.contains("I want to set up a new goal: Run a 10k"));
    assert!(!first.contains("smaller steps please"));
    assert!(second.contains("I want to set up a new goal: Run a 10k"));
    assert!(second.contains("- smaller steps please"));
}

#[test]
fn rejected_tasks_can_keep_goal_without_tasks() {
    let fx = fixture(true);
    let (agent, _) = scripted_agent(&["Why now?", TASKS_REPLY]);
    let services = Services { db: &fx.db, profile: &fx.profile, agent: &agent };
    let mut console = ScriptedConsole::new(&["ready"], &[false], &[1]);

    let outcome = run_new_goal(&services, &mut console, request("Save $5k", "finance"), 6).unwrap();

    let GoalOutcome::KeptWithoutTasks { goal_id } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(fx.db.get_goal(goal_id).unwrap().is_some());
    assert!(fx.db.get_tasks_for_goal(goal_id, None).unwrap().is_empty());
}

#[test]
fn talking_it_through_extends_the_stored_transcript() {
    let fx = fixture(true);
    let (agent, seen) = scripted_agent(&["What's the target?", TASKS_REPLY, "Which part felt too big?"]);
    let services = Services { db: &fx.db, profile: &fx.profile, agent: &agent };
    let mut console = ScriptedConsole::new(&["done", "it's too much at once", "bye"], &[false], &[3]);

    let outcome = run_new_goal(&services, &mut console, request("Get promoted", "career"), 6).unwrap();

    let GoalOutcome::Chatted { goal_id } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    let goal = fx.db.get_goal(goal_id).unwrap().unwrap();
    let context = GoalContext::parse(goal.context.as_deref());
    assert_eq!(context.transcript.last().unwrap().content, "Which part felt too big?");
    assert!(context.transcript.iter().any(|t| t.content == "it's too much at once"));

    let requests = seen.borrow();
    let system = requests[2].system.as_deref().unwrap();
    assert!(system.contains("\"Get promoted\""));
}

#[test]
fn goal_name_is_asked_for_and_bad_deadline_rejected() {
    let fx = fixture(true);
    let (agent, _) = scripted_agent(&[]);
    let services = Services { db: &fx.db, profile: &fx.profile, agent: &agent };

    let mut console = ScriptedConsole::new(&[], &[], &[]);
    let bad = NewGoalRequest {
        name: Some("Ship side project".to_string()),
        deadline: Some("next month".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        run_new_goal(&services, &mut console, bad, 6),
        Err(SessionError::InvalidDate(_))
    ));
    assert!(fx.db.get_all_goals(GoalStatus::Active).unwrap().is_empty());

    // model is out of replies, so the flow stops right after the goal is created
    let mut console = ScriptedConsole::new(&["", "  Ship side project "], &[], &[3]);
    let result = run_new_goal(&services, &mut console, NewGoalRequest::default(), 6);
    assert!(matches!(result, Err(SessionError::AgentError(AgentError::EmptyResponse))));
    assert!(console.printed("A goal needs a name."));
    let goals = fx.db.get_all_goals(GoalStatus::Active).unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].name, "Ship side project");
    assert_eq!(goals[0].category, "finance");
}

fn seed_tasks(db: &Database) -> (i64, i64, i64) {
    let goal_id = db.insert_goal(&Goal::new("Learn Rust".to_string())).unwrap();
    let mut late = Task::new(goal_id, "Read the book".to_string());
    late.due_date = Some("2025-01-01".to_string());
    let late_id = db.insert_task(&late).unwrap();
    let mut today = Task::new(goal_id, "Write a CLI".to_string());
    today.due_date = Some(utils::get_current_date_string());
    let today_id = db.insert_task(&today).unwrap();
    (goal_id, late_id, today_id)
}

#[test]
fn checkin_uses_snapshot_and_logs_progress() {
    let fx = fixture(true);
    let (goal_id, late_id, _) = seed_tasks(&fx.db);
    let (agent, seen) = scripted_agent(&["Morning. One task is overdue.", "Then finish chapter 2 today."]);
    let services = Services { db: &fx.db, profile: &fx.profile, agent: &agent };
    let mut console = ScriptedConsole::new(&["I read a bit", "bye", "1", "2", "chapter 1"], &[true], &[]);

    let summary = checkin::run_checkin(&services, &mut console).unwrap();

    assert_eq!(summary.exchanges, 1);
    assert!(summary.logged.is_some());
    let logs = fx.db.get_logs_on(utils::today()).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].task_id, Some(late_id));
    assert_eq!(logs[0].hours_spent, 2.0);
    assert_eq!(logs[0].notes, "chapter 1");

    let requests = seen.borrow();
    let greeting = &requests[0].turns[0].content;
    assert!(greeting.contains("Active goals: [\"Learn Rust\"]"));
    assert!(greeting.contains("Today's planned tasks: 1 tasks"));
    assert!(greeting.contains("Overdue tasks: 1 tasks"));
    let system = requests[1].system.as_deref().unwrap();
    assert!(system.contains("- Overdue tasks: 1 tasks are past due"));
    assert_eq!(requests[1].turns[0].role, Role::User);
    drop(requests);

    // the goal can still be removed after time was logged against its task
    fx.db.delete_goal(goal_id).unwrap();
    assert!(fx.db.get_task(late_id).unwrap().is_none());
    let logs = fx.db.get_logs_on(utils::today()).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].task_id, None);
}

#[test]
fn checkin_ignores_bad_task_number() {
    let fx = fixture(true);
    seed_tasks(&fx.db);
    let (agent, _) = scripted_agent(&["Hello."]);
    let services = Services { db: &fx.db, profile: &fx.profile, agent: &agent };
    let mut console = ScriptedConsole::new(&["done", "7"], &[true], &[]);

    let summary = checkin::run_checkin(&services, &mut console).unwrap();

    assert_eq!(summary, checkin::CheckinSummary { exchanges: 0, logged: None });
    assert!(console.printed("Nothing logged"));
    assert!(fx.db.get_logs_on(utils::today()).unwrap().is_empty());
}

#[test]
fn interactive_handles_commands_locally() {
    let fx = fixture(true);
    let (_, late_id, _) = seed_tasks(&fx.db);
    let (agent, seen) = scripted_agent(&["Nice work. What's next?"]);
    let services = Services { db: &fx.db, profile: &fx.profile, agent: &agent };
    let done = format!("/done {}", late_id);
    let mut console = ScriptedConsole::new(
        &["/done 999", "/done abc", done.as_str(), "I finished the reading", "/tasks", "/quit"],
        &[],
        &[],
    );

    let exchanges = interactive::run_interactive(&services, &mut console, 6).unwrap();

    assert_eq!(exchanges, 1);
    assert!(console.printed("No task with ID 999"));
    assert!(console.printed("Usage: /done <task_id>"));
    assert_eq!(fx.db.get_task(late_id).unwrap().unwrap().status, TaskStatus::Done);
    assert!(fx.db.get_overdue_tasks().unwrap().is_empty());

    let requests = seen.borrow();
    assert_eq!(requests.len(), 1);
    let system = requests[0].system.as_deref().unwrap();
    assert!(system.contains("OVERDUE TASKS (1):"));
    assert!(system.contains("\"Read the book\""));
}
