pub mod calendar;
pub mod capture;
pub mod commands;
pub mod config;
pub mod database;
pub mod model;
pub mod parser;
pub mod query;
pub mod services;
pub mod session;
pub mod stats;

pub use calendar::{build_month_grid, CalendarDay, CalendarError, MonthGrid};
pub use capture::{InputError, TaskInput, TaskPatch};
pub use commands::delete_tasks;
pub use config::AppConfig;
pub use database::Database;
pub use model::*;
pub use query::query;
pub use services::{CalendarSnapshot, ListSnapshot, StatsSnapshot, TasksService};
pub use session::Session;
pub use stats::TaskStats;
