//! Plain-text rendering of task lists, month grids and statistics.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;

use crate::core::calendar::{CalendarDay, WEEKDAY_LABELS};
use crate::model::{Priority, Task};
use crate::services::{CalendarSnapshot, ListSnapshot, StatsSnapshot};

const CELL_WIDTH: usize = 5;
const SHORT_ID_LEN: usize = 10;

pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

pub fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "!!!",
        Priority::Medium => "!!",
        Priority::Low => "!",
    }
}

fn check_box(task: &Task) -> &'static str {
    if task.completed {
        "[x]"
    } else {
        "[ ]"
    }
}

fn tag_suffix(task: &Task) -> String {
    task.tags
        .iter()
        .map(|tag| format!(" #{}", tag))
        .collect::<String>()
}

pub fn write_task_line<W: Write>(mut writer: W, task: &Task) -> Result<()> {
    writeln!(
        writer,
        "{:<width$}  {} {}  {:<6} {:>3}%  {}{}",
        short_id(&task.id),
        check_box(task),
        task.due_date.format("%Y-%m-%d"),
        task.priority.as_str(),
        task.progress,
        task.name,
        tag_suffix(task),
        width = SHORT_ID_LEN,
    )?;
    Ok(())
}

pub fn write_task_list<W: Write>(mut writer: W, snapshot: &ListSnapshot) -> Result<()> {
    let query = &snapshot.query;
    write!(
        writer,
        "sort: {} {} | filter: {}",
        query.sort_by.as_str(),
        query.order.as_str(),
        query.filter_by.as_str()
    )?;
    if !query.search_text.is_empty() {
        write!(writer, " | search: \"{}\"", query.search_text)?;
    }
    writeln!(writer)?;

    if snapshot.is_empty() {
        writeln!(writer, "No tasks match")?;
        return Ok(());
    }
    for task in &snapshot.tasks {
        write_task_line(&mut writer, task)?;
    }
    Ok(())
}

pub fn write_task_detail<W: Write>(mut writer: W, task: &Task) -> Result<()> {
    writeln!(writer, "Id:          {}", task.id)?;
    writeln!(writer, "Name:        {}", task.name)?;
    if let Some(description) = &task.description {
        writeln!(writer, "Description: {}", description)?;
    }
    writeln!(writer, "Due:         {}", task.due_date.format("%Y-%m-%d (%a)"))?;
    writeln!(writer, "Priority:    {}", task.priority)?;
    writeln!(writer, "Progress:    {}%", task.progress)?;
    writeln!(
        writer,
        "Status:      {}",
        if task.completed { "completed" } else { "active" }
    )?;
    if !task.tags.is_empty() {
        writeln!(writer, "Tags:        {}", task.tags.join(", "))?;
    }
    writeln!(writer, "Updated:     {}", task.updated_at.format("%Y-%m-%d %H:%M"))?;
    Ok(())
}

fn day_cell(day: &CalendarDay, today: NaiveDate) -> String {
    let number = day.day_number();
    let label = if day.date == today {
        format!("[{}]", number)
    } else {
        number.to_string()
    };
    let marker = if day.has_tasks() { "*" } else { "" };
    format!("{:>width$}", format!("{}{}", label, marker), width = CELL_WIDTH)
}

/// Render the month as a seven-column grid followed by the tasks of each busy day.
pub fn write_calendar<W: Write>(mut writer: W, snapshot: &CalendarSnapshot) -> Result<()> {
    let grid = &snapshot.grid;
    let title = grid
        .first_day()
        .map(|date| date.format("%B %Y").to_string())
        .unwrap_or_else(|| format!("{}-{:02}", grid.year, grid.month));
    writeln!(writer, "{:^width$}", title, width = CELL_WIDTH * WEEKDAY_LABELS.len())?;

    let header: String = WEEKDAY_LABELS
        .iter()
        .map(|label| format!("{:>width$}", label, width = CELL_WIDTH))
        .collect();
    writeln!(writer, "{}", header.trim_end())?;

    for week in &grid.weeks {
        let row: String = week
            .iter()
            .map(|cell| match cell {
                Some(day) => day_cell(day, snapshot.today),
                None => " ".repeat(CELL_WIDTH),
            })
            .collect();
        writeln!(writer, "{}", row.trim_end())?;
    }

    let busy: Vec<&CalendarDay> = grid.days().filter(|day| day.has_tasks()).collect();
    if busy.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "No tasks due this month")?;
        return Ok(());
    }

    for day in busy {
        writeln!(writer)?;
        writeln!(writer, "{}", day.date.format("%a %b %-d"))?;
        for task in &day.tasks {
            writeln!(
                writer,
                "  {:<3} {} {}  {}",
                priority_marker(task.priority),
                check_box(task),
                short_id(&task.id),
                task.name
            )?;
            if let Some(description) = &task.description {
                writeln!(writer, "        {}", description)?;
            }
        }
    }
    Ok(())
}

pub fn write_stats<W: Write>(mut writer: W, snapshot: &StatsSnapshot) -> Result<()> {
    let stats = &snapshot.stats;
    writeln!(writer, "Total:     {}", stats.total)?;
    writeln!(
        writer,
        "Completed: {} ({}%)",
        stats.completed, snapshot.completion_rate
    )?;
    writeln!(writer, "Pending:   {}", stats.pending)?;
    writeln!(writer, "Overdue:   {}", stats.overdue)?;
    writeln!(writer, "Upcoming:  {}", stats.upcoming)?;

    if !snapshot.categories.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Tags:")?;
        for (tag, count) in &snapshot.categories {
            writeln!(writer, "  #{:<16} {}", tag, count)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::build_month_grid;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn task(id: &str, name: &str, due: NaiveDate, priority: Priority) -> Task {
        let now = Utc::now();
        Task {
            id: id.into(),
            owner_id: 1,
            name: name.into(),
            description: None,
            due_date: due,
            priority,
            completed: false,
            tags: vec!["math".into()],
            progress: 40,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn calendar_renders_grid_and_busy_days() {
        let mut essay = task(
            "01HQAAAAAAAAAAAAAAAAAAAAAA",
            "Essay",
            date(2024, 2, 29),
            Priority::High,
        );
        essay.description = Some("Compare two sonnets".into());
        let tasks = vec![essay];
        let snapshot = CalendarSnapshot {
            grid: build_month_grid(2024, 2, &tasks).unwrap(),
            today: date(2024, 2, 14),
        };
        let mut output = Vec::new();
        write_calendar(&mut output, &snapshot).unwrap();
        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0].trim(), "February 2024");
        assert_eq!(lines[1], "  Mon  Tue  Wed  Thu  Fri  Sat  Sun");
        assert_eq!(lines[2], "                   1    2    3    4");
        assert!(lines[4].contains("[14]"));
        assert!(lines[6].contains("29*"));
        assert!(output.contains("Thu Feb 29"));
        assert!(output.contains("  !!! [ ] 01HQAAAAAA  Essay\n        Compare two sonnets\n"));
    }

    #[test]
    fn empty_month_says_so() {
        let snapshot = CalendarSnapshot {
            grid: build_month_grid(2024, 4, &[]).unwrap(),
            today: date(2024, 2, 14),
        };
        let mut output = Vec::new();
        write_calendar(&mut output, &snapshot).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.ends_with("No tasks due this month\n"));
    }

    #[test]
    fn task_line_shows_key_fields() {
        let mut output = Vec::new();
        let task = task("01HQBBBBBBBBBBBBBBBBBBBBBB", "Lab report", date(2024, 3, 2), Priority::Low);
        write_task_line(&mut output, &task).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "01HQBBBBBB  [ ] 2024-03-02  low     40%  Lab report #math\n"
        );
    }
}
