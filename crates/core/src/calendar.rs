//! Month grid construction for calendar views.
//!
//! Weeks start on Monday. Every week row holds exactly seven cells; cells
//! outside the requested month are `None`.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::model::Task;

pub const DAYS_PER_WEEK: usize = 7;

pub const WEEKDAY_LABELS: [&str; DAYS_PER_WEEK] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_current_month: bool,
    pub tasks: Vec<Task>,
}

impl CalendarDay {
    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn day_number(&self) -> u32 {
        self.date.day()
    }
}

pub type Week = [Option<CalendarDay>; DAYS_PER_WEEK];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<Week>,
}

impl MonthGrid {
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Iterate over the populated cells in calendar order.
    pub fn days(&self) -> impl Iterator<Item = &CalendarDay> {
        self.weeks.iter().flat_map(|week| week.iter().flatten())
    }

    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        self.days().find(|day| day.date == date)
    }

    pub fn task_count(&self) -> usize {
        self.days().map(|day| day.tasks.len()).sum()
    }

    pub fn busy_days(&self) -> usize {
        self.days().filter(|day| day.has_tasks()).count()
    }
}

/// Build the Monday-first grid for `month` of `year`, attaching every task due
/// on each day in the order the tasks were supplied.
pub fn build_month_grid(year: i32, month: u32, tasks: &[Task]) -> Result<MonthGrid, CalendarError> {
    let first = first_of_month(year, month)?;
    let leading = first_weekday_offset(year, month)?;
    let total_days = days_in_month(year, month)?;

    let mut cells: Vec<Option<CalendarDay>> = Vec::with_capacity(42);
    cells.extend((0..leading).map(|_| None));

    for offset in 0..total_days {
        let date = first + chrono::Days::new(u64::from(offset));
        let due: Vec<Task> = tasks
            .iter()
            .filter(|task| task.due_date == date)
            .cloned()
            .collect();
        cells.push(Some(CalendarDay {
            date,
            in_current_month: true,
            tasks: due,
        }));
    }

    while cells.len() % DAYS_PER_WEEK != 0 {
        cells.push(None);
    }

    let weeks: Vec<Week> = cells
        .chunks(DAYS_PER_WEEK)
        .map(|chunk| std::array::from_fn(|idx| chunk[idx].clone()))
        .collect();

    let grid = MonthGrid { year, month, weeks };
    debug!(
        year,
        month,
        weeks = grid.weeks.len(),
        tasks = grid.task_count(),
        "built month grid"
    );
    Ok(grid)
}

/// Number of empty cells before day 1 when weeks start on Monday.
pub fn first_weekday_offset(year: i32, month: u32) -> Result<usize, CalendarError> {
    let first = first_of_month(year, month)?;
    Ok(first.weekday().num_days_from_monday() as usize)
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32, CalendarError> {
    let first = first_of_month(year, month)?;
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| CalendarError::InvalidArgument(format!("year {year} is out of range")))?;
    Ok((next - first).num_days() as u32)
}

/// The `(year, month)` pair containing `today`.
pub fn current_year_month(today: NaiveDate) -> (i32, u32) {
    (today.year(), today.month())
}

/// Move `delta` months forward (or backward when negative) from the given month.
pub fn shift_month(year: i32, month: u32, delta: i32) -> Result<(i32, u32), CalendarError> {
    let first = first_of_month(year, month)?;
    let months = Months::new(delta.unsigned_abs());
    let shifted = if delta >= 0 {
        first.checked_add_months(months)
    } else {
        first.checked_sub_months(months)
    }
    .ok_or_else(|| {
        CalendarError::InvalidArgument(format!("cannot shift {year}-{month:02} by {delta} months"))
    })?;
    Ok((shifted.year(), shifted.month()))
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, CalendarError> {
    if !(1..=12).contains(&month) {
        return Err(CalendarError::InvalidArgument(format!(
            "month must be between 1 and 12, got {month}"
        )));
    }
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CalendarError::InvalidArgument(format!("year {year} is out of range")))
}
