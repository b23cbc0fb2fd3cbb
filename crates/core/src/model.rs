use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::Serialize;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Severity rank used for ordering: high sorts before medium before low.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(anyhow!(
                "Unknown priority '{}': expected low|medium|high",
                other
            )),
        }
    }
}

impl ValueEnum for Priority {
    fn value_variants<'a>() -> &'a [Self] {
        const VARIANTS: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];
        &VARIANTS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    DueDate,
    Priority,
    Progress,
    Name,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::DueDate => "dueDate",
            SortField::Priority => "priority",
            SortField::Progress => "progress",
            SortField::Name => "name",
        }
    }

    /// Lenient parse for values arriving from the outside world; anything
    /// unrecognized becomes [`SortField::DueDate`].
    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl FromStr for SortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duedate" | "due_date" | "due-date" | "due" => Ok(SortField::DueDate),
            "priority" | "urgency" => Ok(SortField::Priority),
            "progress" => Ok(SortField::Progress),
            "name" | "title" => Ok(SortField::Name),
            other => Err(anyhow!(
                "Unknown sort field '{}': expected dueDate|priority|progress|name",
                other
            )),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    pub fn is_reversed(&self) -> bool {
        matches!(self, SortOrder::Desc)
    }
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(anyhow!("Unknown sort order '{}': expected asc|desc", other)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOption {
    #[default]
    All,
    Completed,
    Active,
    High,
    Medium,
    Low,
}

impl FilterOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOption::All => "all",
            FilterOption::Completed => "completed",
            FilterOption::Active => "active",
            FilterOption::High => "high",
            FilterOption::Medium => "medium",
            FilterOption::Low => "low",
        }
    }

    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            FilterOption::All => true,
            FilterOption::Completed => task.completed,
            FilterOption::Active => !task.completed,
            FilterOption::High => task.priority == Priority::High,
            FilterOption::Medium => task.priority == Priority::Medium,
            FilterOption::Low => task.priority == Priority::Low,
        }
    }
}

impl FromStr for FilterOption {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterOption::All),
            "completed" | "done" => Ok(FilterOption::Completed),
            "active" | "open" => Ok(FilterOption::Active),
            "high" => Ok(FilterOption::High),
            "medium" | "med" => Ok(FilterOption::Medium),
            "low" => Ok(FilterOption::Low),
            other => Err(anyhow!(
                "Unknown filter '{}': expected all|completed|active|high|medium|low",
                other
            )),
        }
    }
}

impl fmt::Display for FilterOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sort, filter and search settings for a task list view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub sort_by: SortField,
    pub order: SortOrder,
    pub filter_by: FilterOption,
    pub search_text: String,
}

impl TaskQuery {
    /// Build a query from raw, untrusted parameters. Unknown or missing values
    /// fall back to the defaults instead of failing.
    pub fn from_params(
        sort_by: Option<&str>,
        order: Option<&str>,
        filter_by: Option<&str>,
        search_text: Option<&str>,
    ) -> Self {
        Self {
            sort_by: sort_by.map(SortField::parse_or_default).unwrap_or_default(),
            order: order.map(SortOrder::parse_or_default).unwrap_or_default(),
            filter_by: filter_by
                .map(FilterOption::parse_or_default)
                .unwrap_or_default(),
            search_text: search_text.unwrap_or_default().to_string(),
        }
    }

    pub fn sorted_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_by = field;
        self.order = order;
        self
    }

    pub fn filtered_by(mut self, filter: FilterOption) -> Self {
        self.filter_by = filter;
        self
    }

    pub fn searching(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub owner_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub priority: Priority,
    pub completed: bool,
    pub tags: Vec<String>,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub priority: Priority,
    pub completed: bool,
    pub tags: Vec<String>,
    pub progress: u8,
}

impl NewTask {
    pub fn into_insertable(self) -> InsertableTask {
        InsertableTask {
            id: Ulid::new().to_string(),
            data: self,
        }
    }
}

impl From<&Task> for NewTask {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            priority: task.priority,
            completed: task.completed,
            tags: task.tags.clone(),
            progress: task.progress,
        }
    }
}

pub struct InsertableTask {
    pub id: String,
    pub data: NewTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub id: String,
    pub name: String,
    pub due_date: NaiveDate,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub id: String,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub id: String,
    pub deleted: bool,
}
