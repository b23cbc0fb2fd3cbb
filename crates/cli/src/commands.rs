use std::fmt;
use std::io::Write;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::cli::{
    AddArgs, CalendarArgs, CliCommand, EditArgs, IdsArgs, ListArgs, MoveArgs, ProgressArgs,
    ShowArgs, StatsArgs,
};
use crate::capture::TaskPatch;
use crate::config::AppConfig;
use crate::core::calendar;
use crate::core::parser;
use crate::core::{Session, TasksService};
use crate::model::{DeleteResult, StatusUpdate, TaskQuery};
use crate::render;

pub fn execute<W: Write>(
    config: &AppConfig,
    user: Option<&str>,
    command: CliCommand,
    writer: W,
) -> Result<()> {
    execute_on(config, user, command, Local::now().date_naive(), writer)
}

/// Run `command` with `today` as the reference day for relative dates,
/// the default calendar month and the overdue counters.
pub fn execute_on<W: Write>(
    config: &AppConfig,
    user: Option<&str>,
    command: CliCommand,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    let service = TasksService::new(config.clone())?;

    if let CliCommand::Register(args) = &command {
        let session = service.register(&args.username)?;
        writeln!(
            writer,
            "Registered user '{}' (id {})",
            session.username, session.user_id
        )?;
        return Ok(());
    }

    let username = user.ok_or_else(|| anyhow!("No user selected: pass --user or set HWT_USER"))?;
    let session = service.open_session(username)?;
    debug!(user = session.username.as_str(), "opened session");

    match command {
        CliCommand::Register(_) => Ok(()),
        CliCommand::Add(args) => handle_add(&service, &session, args, today, &mut writer),
        CliCommand::Edit(args) => handle_edit(&service, &session, &args, today, &mut writer),
        CliCommand::Done(args) => handle_status(&service, &session, &args, true, &mut writer),
        CliCommand::Reopen(args) => handle_status(&service, &session, &args, false, &mut writer),
        CliCommand::Progress(args) => handle_progress(&service, &session, &args, &mut writer),
        CliCommand::Move(args) => handle_move(&service, &session, &args, today, &mut writer),
        CliCommand::Delete(args) => handle_delete(&service, &session, &args, &mut writer),
        CliCommand::Show(args) => handle_show(&service, &session, &args, &mut writer),
        CliCommand::List(args) => handle_list(&service, &session, &args, &mut writer),
        CliCommand::Calendar(args) => {
            handle_calendar(&service, &session, &args, today, &mut writer)
        }
        CliCommand::Stats(args) => handle_stats(&service, &session, &args, today, &mut writer),
    }
}

fn handle_add<W: Write>(
    service: &TasksService,
    session: &Session,
    args: AddArgs,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    let outcome = service.add(session, args.into(), today)?;
    writeln!(
        writer,
        "Added {}  {} (due {}, {} priority)",
        render::short_id(&outcome.id),
        outcome.name,
        outcome.due_date.format("%Y-%m-%d"),
        outcome.priority
    )?;
    Ok(())
}

fn handle_edit<W: Write>(
    service: &TasksService,
    session: &Session,
    args: &EditArgs,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    let id = service.resolve_id(session, &args.id)?;
    let patch = TaskPatch::from(args);
    let task = service
        .edit(session, &id, &patch, today)?
        .ok_or_else(|| anyhow!("No task matches id '{}'", id))?;
    writeln!(writer, "Updated")?;
    render::write_task_line(&mut writer, &task)
}

fn handle_status<W: Write>(
    service: &TasksService,
    session: &Session,
    args: &IdsArgs,
    completed: bool,
    mut writer: W,
) -> Result<()> {
    let ids = resolve_ids(service, session, &args.ids)?;
    let updates = if completed {
        service.complete(session, &ids)?
    } else {
        service.reopen(session, &ids)?
    };
    let verb = if completed { "Completed" } else { "Reopened" };
    StatusSummary::from_updates(&updates).write_to(verb, &mut writer)
}

fn handle_progress<W: Write>(
    service: &TasksService,
    session: &Session,
    args: &ProgressArgs,
    mut writer: W,
) -> Result<()> {
    let id = service.resolve_id(session, &args.id)?;
    let task = service
        .set_progress(session, &id, args.percent)?
        .ok_or_else(|| anyhow!("No task matches id '{}'", id))?;
    writeln!(
        writer,
        "Progress of {} set to {}%",
        render::short_id(&task.id),
        task.progress
    )?;
    Ok(())
}

fn handle_move<W: Write>(
    service: &TasksService,
    session: &Session,
    args: &MoveArgs,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    let id = service.resolve_id(session, &args.id)?;
    let due_date = parser::parse_date_spec(&args.date, today)?;
    let task = service
        .reschedule(session, &id, due_date)?
        .ok_or_else(|| anyhow!("No task matches id '{}'", id))?;
    writeln!(
        writer,
        "Moved {} to {}",
        render::short_id(&task.id),
        task.due_date.format("%Y-%m-%d")
    )?;
    Ok(())
}

fn handle_delete<W: Write>(
    service: &TasksService,
    session: &Session,
    args: &IdsArgs,
    mut writer: W,
) -> Result<()> {
    let ids = resolve_ids(service, session, &args.ids)?;
    let results = service.delete(session, &ids)?;
    let summary = DeleteSummary::from_results(&results);
    summary.write_to(&mut writer)?;
    Ok(())
}

fn handle_show<W: Write>(
    service: &TasksService,
    session: &Session,
    args: &ShowArgs,
    mut writer: W,
) -> Result<()> {
    let id = service.resolve_id(session, &args.id)?;
    let task = service
        .fetch_task(session, &id)?
        .ok_or_else(|| anyhow!("No task matches id '{}'", id))?;
    if args.json {
        return write_json(&mut writer, &task);
    }
    render::write_task_detail(&mut writer, &task)
}

fn handle_list<W: Write>(
    service: &TasksService,
    session: &Session,
    args: &ListArgs,
    mut writer: W,
) -> Result<()> {
    let params = TaskQuery::from_params(
        args.sort.as_deref(),
        args.order.as_deref(),
        args.filter.as_deref(),
        args.search.as_deref(),
    );
    let snapshot = if args.storage {
        service.list_in_storage(session, &params)?
    } else {
        service.list(session, &params)?
    };
    if args.json {
        return write_json(&mut writer, &snapshot);
    }
    render::write_task_list(&mut writer, &snapshot)
}

fn handle_calendar<W: Write>(
    service: &TasksService,
    session: &Session,
    args: &CalendarArgs,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    let (current_year, current_month) = calendar::current_year_month(today);
    let year = args.year.unwrap_or(current_year);
    let month = args.month.unwrap_or(current_month);
    let (year, month) = calendar::shift_month(year, month, args.month_offset())?;

    let snapshot = service.calendar(session, year, month, today)?;
    if args.json {
        return write_json(&mut writer, &snapshot);
    }
    render::write_calendar(&mut writer, &snapshot)
}

fn handle_stats<W: Write>(
    service: &TasksService,
    session: &Session,
    args: &StatsArgs,
    today: NaiveDate,
    mut writer: W,
) -> Result<()> {
    let snapshot = service.stats(session, today)?;
    if args.json {
        return write_json(&mut writer, &snapshot);
    }
    render::write_stats(&mut writer, &snapshot)
}

/// Expand id prefixes. Ids matching nothing are passed through so the summary
/// can report them as not found; ambiguous or too-short ids abort the command.
fn resolve_ids(
    service: &TasksService,
    session: &Session,
    ids: &[String],
) -> Result<Vec<String>> {
    ids.iter()
        .map(|raw| {
            let resolved = service.lookup_id(session, raw)?;
            if resolved.is_none() {
                debug!(id = raw.as_str(), "no task matches id");
            }
            Ok(resolved.unwrap_or_else(|| raw.clone()))
        })
        .collect()
}

fn write_json<W: Write, T: serde::Serialize>(mut writer: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value).context("Failed to encode JSON output")?;
    writeln!(writer)?;
    Ok(())
}

struct StatusSummary {
    changed: usize,
    unchanged: Vec<String>,
}

impl StatusSummary {
    fn from_updates(updates: &[StatusUpdate]) -> Self {
        let mut changed = 0usize;
        let mut unchanged = Vec::new();
        for update in updates {
            if update.changed {
                changed += 1;
            } else {
                unchanged.push(update.id.clone());
            }
        }
        Self { changed, unchanged }
    }

    fn write_to<W: Write>(&self, verb: &'static str, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::new(verb, self.changed))?;
        if !self.unchanged.is_empty() {
            writeln!(writer, "Unchanged: {}", self.unchanged.join(", "))?;
        }
        Ok(())
    }
}

struct DeleteSummary {
    deleted: usize,
    missing: Vec<String>,
}

impl DeleteSummary {
    fn from_results(results: &[DeleteResult]) -> Self {
        let mut deleted = 0usize;
        let mut missing = Vec::new();
        for result in results {
            if result.deleted {
                deleted += 1;
            } else {
                missing.push(result.id.clone());
            }
        }
        Self { deleted, missing }
    }

    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::new("Deleted", self.deleted))?;
        if !self.missing.is_empty() {
            writeln!(writer, "Not found: {}", self.missing.join(", "))?;
        }
        Ok(())
    }
}

enum SummaryLine {
    Changed(&'static str, usize),
    NoneChanged(&'static str),
}

impl SummaryLine {
    fn new(verb: &'static str, count: usize) -> Self {
        if count > 0 {
            SummaryLine::Changed(verb, count)
        } else {
            SummaryLine::NoneChanged(verb)
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLine::Changed(verb, count) => {
                write!(
                    f,
                    "{} {} task{}",
                    verb,
                    count,
                    if *count == 1 { "" } else { "s" }
                )
            }
            SummaryLine::NoneChanged(verb) => {
                write!(f, "No tasks {}", verb.to_lowercase())
            }
        }
    }
}
