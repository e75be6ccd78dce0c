use clap::Parser;
use color_eyre::Result;
use compass::cli::{self, Cli, Commands};
use compass::models::TaskStatus;
use compass::session::goal::NewGoalRequest;
use compass::session::{Services, TerminalConsole};
use compass::{Config, Database, ProfileStore, RunMode};
use std::path::Path;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // Logs go to stderr so the conversation on stdout stays clean
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mode = if cli.dev { RunMode::Dev } else { RunMode::Prod };
    let config = match &cli.config {
        Some(path) => Config::load_from_path(Path::new(path))?,
        None => Config::load_with_mode(mode)?,
    };

    let db_path = config.get_database_path();
    let db = Database::new(
        db_path.to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?
    )?;
    let profile = ProfileStore::new(config.get_profile_path());
    let mut console = TerminalConsole::new();

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let agent = cli::build_agent(&config)?;
            let services = Services { db: &db, profile: &profile, agent: &agent };
            compass::session::interactive::run_interactive(&services, &mut console, config.max_discovery_turns)?;
        }
        Commands::New { name, description, deadline, category } => {
            let request = NewGoalRequest { name, description, deadline, category };
            cli::handle_new_goal(request, &config, &db, &profile, &mut console)?;
        }
        Commands::AddGoal { name, description, deadline, category } => {
            cli::handle_add_goal(name, description, deadline, category, &db)?;
        }
        Commands::Goals { archived } => cli::handle_list_goals(archived, &db)?,
        Commands::AddTask { goal_id, description, hours, due } => {
            cli::handle_add_task(goal_id, description, hours, due, &db)?;
        }
        Commands::Tasks { goal_id } => cli::handle_list_tasks(goal_id, &db)?,
        Commands::Today => cli::handle_today(&db)?,
        Commands::Done { task_id } => cli::handle_set_status(task_id, TaskStatus::Done, &db)?,
        Commands::Undone { task_id } => cli::handle_set_status(task_id, TaskStatus::Todo, &db)?,
        Commands::DeleteTask { task_id, yes } => {
            cli::handle_delete_task(task_id, yes, &db, &mut console)?;
        }
        Commands::DeleteGoal { goal_id, yes } => {
            cli::handle_delete_goal(goal_id, yes, &db, &mut console)?;
        }
        Commands::Checkin => cli::handle_checkin(&config, &db, &profile, &mut console)?,
        Commands::Log { hours, notes, task } => {
            cli::handle_log(hours, notes, task, &db)?;
        }
        Commands::Profile { action } => cli::handle_profile(action, &profile)?,
    }

    Ok(())
}
