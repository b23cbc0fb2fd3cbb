pub mod tasks;

pub use tasks::{CalendarSnapshot, ListSnapshot, StatsSnapshot, TasksService};
