pub mod agent;
pub mod cli;
pub mod config;
pub mod database;
pub mod extract;
pub mod models;
pub mod profile;
pub mod session;
pub mod utils;

pub use agent::Agent;
pub use config::Config;
pub use database::Database;
pub use models::{DailyLog, Goal, GoalStatus, Task, TaskStatus};
pub use profile::ProfileStore;
pub use utils::RunMode;
