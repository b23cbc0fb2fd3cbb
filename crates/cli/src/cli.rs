use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand};

use crate::capture::{TaskInput, TaskPatch};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "hwt",
    version,
    about = "Track homework tasks and see them on a monthly calendar.",
    after_help = "Examples:\n  hwt register ana\n  hwt --user ana add Essay draft due:fri p:high #english\n  hwt --user ana list --sort priority --order desc --filter active\n  hwt --user ana calendar --next 1\n  hwt --user ana done 01HQ3K"
)]
pub struct Cli {
    /// Override the data directory. Falls back to HWT_DATA_DIR, then
    /// `tmp/dev-hwt` in the workspace for debug builds, then the
    /// platform-specific app dir
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Act as this user (must be registered first)
    #[arg(long, env = "HWT_USER", value_name = "NAME", global = true)]
    pub user: Option<String>,

    /// Tracing filter directive written to stderr (e.g. "info", "hwt_core=debug")
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Create a user account
    Register(RegisterArgs),
    /// Add a task
    Add(AddArgs),
    /// Change fields of an existing task
    Edit(EditArgs),
    /// Mark tasks as completed
    Done(IdsArgs),
    /// Mark completed tasks as active again
    Reopen(IdsArgs),
    /// Set the progress percentage of a task
    Progress(ProgressArgs),
    /// Move a task to another due date
    Move(MoveArgs),
    /// Delete one or more tasks by id
    Delete(IdsArgs),
    /// Print every field of a task
    Show(ShowArgs),
    /// Search, filter and sort tasks
    List(ListArgs),
    /// Print the month calendar with the tasks due on each day
    Calendar(CalendarArgs),
    /// Print completion statistics
    Stats(StatsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    #[arg(value_name = "NAME")]
    pub username: String,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task name with optional inline tokens (#tag, due:, p:)
    #[arg(value_name = "TEXT", required = true)]
    pub text: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Due date (ISO e.g. 2024-03-10, today, tomorrow, +3d, mon)
    #[arg(long = "due", value_name = "DATE")]
    pub due_date: Option<String>,

    /// Priority (low, medium, high); defaults to medium
    #[arg(long, value_name = "LEVEL")]
    pub priority: Option<String>,

    #[arg(long, value_parser = value_parser!(u8).range(0..=100))]
    pub progress: Option<u8>,

    /// Add tags (comma-separated or repeated flag; '#' prefix optional)
    #[arg(long, value_delimiter = ',', action = ArgAction::Append)]
    pub tag: Vec<String>,

    /// Record the task as already completed
    #[arg(long)]
    pub done: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Task id or a unique prefix of it
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    /// New description; pass an empty string to clear it
    #[arg(long)]
    pub description: Option<String>,

    #[arg(long = "due", value_name = "DATE")]
    pub due_date: Option<String>,

    #[arg(long, value_name = "LEVEL")]
    pub priority: Option<String>,

    /// Replace the tags (comma-separated or repeated flag)
    #[arg(long, value_delimiter = ',', action = ArgAction::Append)]
    pub tag: Vec<String>,

    /// Remove every tag
    #[arg(long, conflicts_with = "tag")]
    pub clear_tags: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IdsArgs {
    /// One or more task ids (full or unique prefix)
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ProgressArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(value_name = "PERCENT", value_parser = value_parser!(u8).range(0..=100))]
    pub percent: u8,
}

#[derive(Args, Debug, Clone)]
pub struct MoveArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// New due date (ISO or relative)
    #[arg(value_name = "DATE")]
    pub date: String,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// dueDate, priority, progress or name (unknown values sort by due date)
    #[arg(long, value_name = "FIELD")]
    pub sort: Option<String>,

    /// asc or desc (unknown values sort ascending)
    #[arg(long, value_name = "ORDER")]
    pub order: Option<String>,

    /// all, completed, active, high, medium or low (unknown values show all)
    #[arg(long, value_name = "FILTER")]
    pub filter: Option<String>,

    /// Case-insensitive text matched against name, description and tags
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Evaluate the query inside SQLite instead of in memory
    #[arg(long)]
    pub storage: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CalendarArgs {
    #[arg(long, requires = "month")]
    pub year: Option<i32>,

    #[arg(long)]
    pub month: Option<u32>,

    /// Show the month N months before the selected one
    #[arg(long, value_name = "MONTHS", conflicts_with = "next")]
    pub prev: Option<u32>,

    /// Show the month N months after the selected one
    #[arg(long, value_name = "MONTHS")]
    pub next: Option<u32>,

    #[arg(long)]
    pub json: bool,
}

impl CalendarArgs {
    pub fn month_offset(&self) -> i32 {
        match (self.prev, self.next) {
            (Some(prev), _) => -(prev as i32),
            (None, Some(next)) => next as i32,
            (None, None) => 0,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[arg(long)]
    pub json: bool,
}

impl From<AddArgs> for TaskInput {
    fn from(args: AddArgs) -> Self {
        TaskInput {
            text: args.text,
            description: args.description,
            due_date: args.due_date,
            priority: args.priority,
            progress: args.progress,
            tags: args.tag,
            completed: args.done,
        }
    }
}

impl From<&EditArgs> for TaskPatch {
    fn from(args: &EditArgs) -> Self {
        let tags = if args.clear_tags {
            Some(Vec::new())
        } else if args.tag.is_empty() {
            None
        } else {
            Some(args.tag.clone())
        };
        TaskPatch {
            name: args.name.clone(),
            description: args.description.clone(),
            due_date: args.due_date.clone(),
            priority: args.priority.clone(),
            tags,
        }
    }
}
