use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::calendar::{self, MonthGrid};
use crate::capture::{TaskInput, TaskPatch};
use crate::config::AppConfig;
use crate::database::Database;
use crate::model::{AddOutcome, DeleteResult, StatusUpdate, Task, TaskQuery};
use crate::parser;
use crate::query;
use crate::session::Session;
use crate::stats::{self, TaskStats};

/// Shortest id prefix accepted by [`TasksService::resolve_id`].
pub const MIN_ID_PREFIX: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct ListSnapshot {
    pub query: TaskQuery,
    pub tasks: Vec<Task>,
}

impl ListSnapshot {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSnapshot {
    pub grid: MonthGrid,
    pub today: NaiveDate,
}

impl CalendarSnapshot {
    pub fn is_today(&self, date: NaiveDate) -> bool {
        self.today == date
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub stats: TaskStats,
    pub completion_rate: u8,
    pub categories: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct TasksService {
    config: AppConfig,
}

impl TasksService {
    pub fn new(config: AppConfig) -> Result<Self> {
        Database::initialize(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn register(&self, username: &str) -> Result<Session> {
        let db = self.open_database()?;
        db.register_user(username).map(Session::from)
    }

    /// Resolve an existing user into a [`Session`].
    pub fn open_session(&self, username: &str) -> Result<Session> {
        let db = self.open_database()?;
        let user = db.find_user(username.trim())?.ok_or_else(|| {
            anyhow!(
                "Unknown user '{}': register it first with `hwt register {}`",
                username.trim(),
                username.trim()
            )
        })?;
        Ok(Session::from(user))
    }

    /// Add a task; relative due dates resolve against `today`.
    pub fn add(
        &self,
        session: &Session,
        input: TaskInput,
        today: NaiveDate,
    ) -> Result<AddOutcome> {
        let db = self.open_database()?;
        db.handle_add(session.user_id, &input, today)
    }

    pub fn edit(
        &self,
        session: &Session,
        id: &str,
        patch: &TaskPatch,
        today: NaiveDate,
    ) -> Result<Option<Task>> {
        let db = self.open_database()?;
        let Some(task) = db.fetch_task(session.user_id, id)? else {
            return Ok(None);
        };
        let updated = parser::apply_patch(&task, patch, today)?;
        db.update_task(session.user_id, id, &updated)
    }

    pub fn complete(&self, session: &Session, ids: &[String]) -> Result<Vec<StatusUpdate>> {
        let db = self.open_database()?;
        db.set_completed(session.user_id, ids, true)
    }

    pub fn reopen(&self, session: &Session, ids: &[String]) -> Result<Vec<StatusUpdate>> {
        let db = self.open_database()?;
        db.set_completed(session.user_id, ids, false)
    }

    pub fn set_progress(&self, session: &Session, id: &str, progress: u8) -> Result<Option<Task>> {
        let db = self.open_database()?;
        db.set_progress(session.user_id, id, progress)
    }

    pub fn reschedule(
        &self,
        session: &Session,
        id: &str,
        due_date: NaiveDate,
    ) -> Result<Option<Task>> {
        let db = self.open_database()?;
        db.reschedule(session.user_id, id, due_date)
    }

    pub fn delete(&self, session: &Session, ids: &[String]) -> Result<Vec<DeleteResult>> {
        crate::commands::delete_tasks(&self.config, session, ids)
    }

    pub fn fetch_task(&self, session: &Session, id: &str) -> Result<Option<Task>> {
        let db = self.open_database()?;
        db.fetch_task(session.user_id, id)
    }

    /// Expand a full id or a unique prefix of one into the stored id.
    pub fn resolve_id(&self, session: &Session, needle: &str) -> Result<String> {
        self.lookup_id(session, needle)?
            .ok_or_else(|| anyhow!("No task matches id '{}'", needle.trim()))
    }

    /// Like [`TasksService::resolve_id`], but an id matching nothing is
    /// `Ok(None)`. Too-short and ambiguous ids are still errors.
    pub fn lookup_id(&self, session: &Session, needle: &str) -> Result<Option<String>> {
        let needle = needle.trim().to_ascii_uppercase();
        if needle.len() < MIN_ID_PREFIX {
            return Err(anyhow!(
                "Task id '{}' is too short: use at least {} characters",
                needle,
                MIN_ID_PREFIX
            ));
        }

        let tasks = self.snapshot(session)?;
        if let Some(task) = tasks.iter().find(|task| task.id == needle) {
            return Ok(Some(task.id.clone()));
        }

        let mut matches = tasks.iter().filter(|task| task.id.starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(Some(task.id.clone())),
            (Some(_), Some(_)) => Err(anyhow!("Task id '{}' is ambiguous", needle)),
            (None, _) => Ok(None),
        }
    }

    /// All of the session owner's tasks in insertion order.
    pub fn snapshot(&self, session: &Session) -> Result<Vec<Task>> {
        let db = self.open_database()?;
        db.fetch_all(session.user_id)
    }

    pub fn list(&self, session: &Session, params: &TaskQuery) -> Result<ListSnapshot> {
        let tasks = self.snapshot(session)?;
        Ok(ListSnapshot {
            query: params.clone(),
            tasks: query::query(&tasks, params),
        })
    }

    /// Same result as [`TasksService::list`], evaluated by SQLite.
    pub fn list_in_storage(&self, session: &Session, params: &TaskQuery) -> Result<ListSnapshot> {
        let db = self.open_database()?;
        Ok(ListSnapshot {
            query: params.clone(),
            tasks: db.query_tasks(session.user_id, params)?,
        })
    }

    pub fn calendar(
        &self,
        session: &Session,
        year: i32,
        month: u32,
        today: NaiveDate,
    ) -> Result<CalendarSnapshot> {
        let days = calendar::days_in_month(year, month)?;
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .with_context(|| format!("Invalid month {year}-{month:02}"))?;
        let end = NaiveDate::from_ymd_opt(year, month, days)
            .with_context(|| format!("Invalid month {year}-{month:02}"))?;

        let db = self.open_database()?;
        let tasks = db.fetch_due_between(session.user_id, start, end)?;
        debug!(year, month, tasks = tasks.len(), "loaded calendar month");
        let grid = calendar::build_month_grid(year, month, &tasks)?;
        Ok(CalendarSnapshot { grid, today })
    }

    pub fn stats(&self, session: &Session, today: NaiveDate) -> Result<StatsSnapshot> {
        let tasks = self.snapshot(session)?;
        let counters = TaskStats::compute(&tasks, today);
        Ok(StatsSnapshot {
            stats: counters,
            completion_rate: counters.completion_rate(),
            categories: stats::category_distribution(&tasks),
        })
    }

    fn open_database(&self) -> Result<Database> {
        Database::initialize(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilterOption, Priority, SortField, SortOrder};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn service_with_temp_dir() -> (TasksService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::from_data_dir(temp_dir.path().to_path_buf()).unwrap();
        let service = TasksService::new(config).unwrap();
        (service, temp_dir)
    }

    fn add_simple(service: &TasksService, session: &Session, text: &str, due: &str) -> String {
        let input = TaskInput {
            text: text.split_whitespace().map(|s| s.to_string()).collect(),
            due_date: Some(due.into()),
            ..TaskInput::default()
        };
        service.add(session, input, date(2024, 2, 14)).unwrap().id
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sessions_require_registration() {
        let (service, _guard) = service_with_temp_dir();
        assert!(service.open_session("ana").is_err());

        let registered = service.register("ana").unwrap();
        let opened = service.open_session(" ana ").unwrap();
        assert_eq!(registered, opened);
        assert!(service.register("ana").is_err());
    }

    #[test]
    fn list_and_storage_list_agree() {
        let (service, _guard) = service_with_temp_dir();
        let session = service.register("ana").unwrap();
        add_simple(&service, &session, "Essay p:high #english", "2024-03-10");
        add_simple(&service, &session, "Lab report p:low", "2024-03-02");
        add_simple(&service, &session, "Reading #english", "2024-03-05");

        let params = TaskQuery {
            sort_by: SortField::Priority,
            order: SortOrder::Desc,
            filter_by: FilterOption::All,
            search_text: String::new(),
        };
        let memory = service.list(&session, &params).unwrap();
        let storage = service.list_in_storage(&session, &params).unwrap();
        assert_eq!(memory.tasks, storage.tasks);
        let priorities: Vec<Priority> = memory.tasks.iter().map(|t| t.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::Low, Priority::Medium, Priority::High]
        );
    }

    #[test]
    fn users_never_see_each_others_tasks() {
        let (service, _guard) = service_with_temp_dir();
        let ana = service.register("ana").unwrap();
        let ben = service.register("ben").unwrap();
        let id = add_simple(&service, &ana, "Essay", "2024-03-10");

        assert!(service.fetch_task(&ben, &id).unwrap().is_none());
        assert!(service.list(&ben, &TaskQuery::default()).unwrap().is_empty());
        let deleted = service.delete(&ben, &[id.clone()]).unwrap();
        assert!(!deleted[0].deleted);
        assert!(service.fetch_task(&ana, &id).unwrap().is_some());
    }

    #[test]
    fn completes_and_reopens_tasks() {
        let (service, _guard) = service_with_temp_dir();
        let session = service.register("ana").unwrap();
        let id = add_simple(&service, &session, "Essay", "2024-03-10");

        let updates = service.complete(&session, &[id.clone()]).unwrap();
        assert!(updates[0].changed);
        let again = service.complete(&session, &[id.clone()]).unwrap();
        assert!(!again[0].changed);
        assert!(service.fetch_task(&session, &id).unwrap().unwrap().completed);

        service.reopen(&session, &[id.clone()]).unwrap();
        assert!(!service.fetch_task(&session, &id).unwrap().unwrap().completed);
    }

    #[test]
    fn edit_applies_patch() {
        let (service, _guard) = service_with_temp_dir();
        let session = service.register("ana").unwrap();
        let id = add_simple(&service, &session, "Essay", "2024-03-10");

        let patch = TaskPatch {
            name: Some("Final essay".into()),
            due_date: Some("2024-03-12".into()),
            ..TaskPatch::default()
        };
        let task = service.edit(&session, &id, &patch, date(2024, 2, 14)).unwrap().unwrap();
        assert_eq!(task.name, "Final essay");
        assert_eq!(task.due_date, date(2024, 3, 12));
        assert_eq!(task.priority, Priority::Medium);

        assert!(service
            .edit(&session, "missing", &patch, date(2024, 2, 14))
            .unwrap()
            .is_none());
    }

    #[test]
    fn relative_dates_resolve_against_the_given_day() {
        let (service, _guard) = service_with_temp_dir();
        let session = service.register("ana").unwrap();
        let today = date(2024, 2, 14);

        let input = TaskInput {
            text: vec!["Essay".into(), "due:tomorrow".into()],
            ..TaskInput::default()
        };
        let outcome = service.add(&session, input, today).unwrap();
        assert_eq!(outcome.due_date, date(2024, 2, 15));

        let patch = TaskPatch {
            due_date: Some("+1w".into()),
            ..TaskPatch::default()
        };
        let task = service
            .edit(&session, &outcome.id, &patch, today)
            .unwrap()
            .unwrap();
        assert_eq!(task.due_date, date(2024, 2, 21));
    }

    #[test]
    fn calendar_only_includes_the_requested_month() {
        let (service, _guard) = service_with_temp_dir();
        let session = service.register("ana").unwrap();
        add_simple(&service, &session, "Essay", "2024-02-29");
        add_simple(&service, &session, "Quiz", "2024-02-01");
        add_simple(&service, &session, "Lab", "2024-03-01");

        let snapshot = service
            .calendar(&session, 2024, 2, date(2024, 2, 14))
            .unwrap();
        assert_eq!(snapshot.grid.task_count(), 2);
        let leap_day = snapshot.grid.day(date(2024, 2, 29)).unwrap();
        assert_eq!(leap_day.tasks[0].name, "Essay");
        assert!(snapshot.is_today(date(2024, 2, 14)));

        assert!(service.calendar(&session, 2024, 13, date(2024, 2, 14)).is_err());
    }

    #[test]
    fn resolves_unique_prefixes() {
        let (service, _guard) = service_with_temp_dir();
        let session = service.register("ana").unwrap();
        let id = add_simple(&service, &session, "Essay", "2024-03-10");

        assert_eq!(service.resolve_id(&session, &id).unwrap(), id);
        let prefix = id[..MIN_ID_PREFIX + 16].to_ascii_lowercase();
        assert_eq!(service.resolve_id(&session, &prefix).unwrap(), id);
        assert!(service.resolve_id(&session, "ab").is_err());
        assert!(service.resolve_id(&session, "ZZZZZZ").is_err());
        assert_eq!(service.lookup_id(&session, "ZZZZZZ").unwrap(), None);
        assert!(service.lookup_id(&session, "ab").is_err());
    }

    #[test]
    fn stats_summarize_tasks() {
        let (service, _guard) = service_with_temp_dir();
        let session = service.register("ana").unwrap();
        let done = add_simple(&service, &session, "Essay #english", "2024-03-01");
        add_simple(&service, &session, "Quiz #math", "2024-03-03");
        add_simple(&service, &session, "Lab #math", "2024-04-20");
        service.complete(&session, &[done]).unwrap();

        let snapshot = service.stats(&session, date(2024, 3, 5)).unwrap();
        assert_eq!(snapshot.stats.total, 3);
        assert_eq!(snapshot.stats.completed, 1);
        assert_eq!(snapshot.completion_rate, 33);
        assert_eq!(snapshot.categories.get("math"), Some(&2));
    }
}
