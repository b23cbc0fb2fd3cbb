use std::collections::HashSet;

use anyhow::Result;
use chrono::{prelude::*, Days, Months};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::capture::{InputError, TaskInput, TaskPatch};
use crate::model::{AddOutcome, InsertableTask, NewTask, Priority, Task};

pub const MAX_PROGRESS: u8 = 100;

/// Due dates are stored as `YYYY-MM-DD` text, which only sorts correctly for
/// four-digit years.
pub const MIN_DUE_YEAR: i32 = 0;
pub const MAX_DUE_YEAR: i32 = 9999;

/// Result of inline token parsing from the task text.
#[derive(Debug, Default)]
struct InlineTokens {
    name_words: Vec<String>,
    tags: Vec<String>,
    due_date: Option<NaiveDate>,
    priority: Option<Priority>,
}

/// Validate `input` with `today` as the reference day for relative dates and
/// assign the new task its id.
pub fn prepare_new_task(
    input: &TaskInput,
    today: NaiveDate,
) -> Result<(InsertableTask, AddOutcome)> {
    let task = parse_task_input(input, today)?;
    let insertable = task.into_insertable();
    let outcome = AddOutcome {
        id: insertable.id.clone(),
        name: insertable.data.name.clone(),
        due_date: insertable.data.due_date,
        priority: insertable.data.priority,
    };
    Ok((insertable, outcome))
}

/// Validate raw input into a [`NewTask`]. Explicit fields win over inline tokens.
pub fn parse_task_input(input: &TaskInput, today: NaiveDate) -> Result<NewTask> {
    input.require_text()?;
    let raw_text = input.text.join(" ");
    let inline = parse_inline_tokens(&raw_text, today)?;

    let name = inline.name_words.join(" ").trim().to_string();
    if name.is_empty() {
        return Err(InputError::EmptyName.into());
    }

    let due_date = match &input.due_date {
        Some(spec) => parse_date_spec(spec, today)?,
        None => inline.due_date.ok_or(InputError::MissingDueDate)?,
    };

    let priority = match &input.priority {
        Some(label) => parse_priority(label)?,
        None => inline.priority.unwrap_or_default(),
    };

    let progress = input.progress.unwrap_or(0);
    if progress > MAX_PROGRESS {
        return Err(InputError::ProgressOutOfRange(progress).into());
    }

    let description = input
        .description
        .as_ref()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(NewTask {
        name,
        description,
        due_date,
        priority,
        completed: input.completed,
        tags: merge_lists(inline.tags, normalize_tags(&input.tags)),
        progress,
    })
}

/// Apply a patch on top of an existing task, validating each provided field.
pub fn apply_patch(existing: &Task, patch: &TaskPatch, today: NaiveDate) -> Result<NewTask> {
    if patch.is_empty() {
        return Err(InputError::EmptyPatch.into());
    }

    let mut updated = NewTask::from(existing);

    if let Some(name) = &patch.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(InputError::EmptyName.into());
        }
        updated.name = name.to_string();
    }

    if let Some(description) = &patch.description {
        let description = description.trim();
        updated.description = if description.is_empty() {
            None
        } else {
            Some(description.to_string())
        };
    }

    if let Some(spec) = &patch.due_date {
        updated.due_date = parse_date_spec(spec, today)?;
    }

    if let Some(label) = &patch.priority {
        updated.priority = parse_priority(label)?;
    }

    if let Some(tags) = &patch.tags {
        updated.tags = normalize_tags(tags);
    }

    Ok(updated)
}

pub fn parse_priority(label: &str) -> Result<Priority, InputError> {
    label
        .parse::<Priority>()
        .map_err(|_| InputError::InvalidPriority(label.trim().to_string()))
}

fn parse_inline_tokens(text: &str, today: NaiveDate) -> Result<InlineTokens> {
    let mut result = InlineTokens::default();

    for raw_piece in text.split_whitespace() {
        let (piece, trailing) = strip_trailing_punctuation(raw_piece);
        if piece.starts_with('#') && piece.len() > 1 {
            result.tags.push(normalize_tag(&piece));
        } else if let Some(spec) = piece.strip_prefix("due:") {
            result.due_date = Some(parse_date_spec(spec, today)?);
        } else if let Some(spec) = piece.strip_prefix("p:") {
            result.priority = Some(parse_priority(spec)?);
        } else {
            result.name_words.push(raw_piece.to_string());
            continue;
        }

        if let Some(rest) = trailing {
            push_trailing(&mut result.name_words, rest);
        }
    }

    Ok(result)
}

/// Split a comma-separated tag string into normalized tags.
pub fn split_tags(raw: &str) -> Vec<String> {
    let pieces: Vec<String> = raw.split(',').map(|s| s.to_string()).collect();
    normalize_tags(&pieces)
}

pub fn normalize_tags(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| normalize_tag(v))
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

fn normalize_tag(value: &str) -> String {
    value.trim().trim_start_matches('#').trim().to_lowercase()
}

fn merge_lists(primary: Vec<String>, secondary: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    primary
        .into_iter()
        .chain(secondary)
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

fn strip_trailing_punctuation(input: &str) -> (String, Option<String>) {
    static PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[[:punct:]]+$").expect("valid regex"));
    if let Some(mat) = PUNCT_RE.find(input) {
        let token = input[..mat.start()].to_string();
        let trailing = input[mat.start()..].to_string();
        (token, Some(trailing))
    } else {
        (input.to_string(), None)
    }
}

fn push_trailing(words: &mut Vec<String>, trailing: String) {
    if let Some(last) = words.last_mut() {
        last.push_str(&trailing);
    }
}

/// Resolve a date expression relative to `today`.
pub fn parse_date_spec(spec: &str, today: NaiveDate) -> Result<NaiveDate, InputError> {
    resolve_date_spec(spec, today).and_then(ensure_due_date_in_range)
}

pub fn ensure_due_date_in_range(date: NaiveDate) -> Result<NaiveDate, InputError> {
    if (MIN_DUE_YEAR..=MAX_DUE_YEAR).contains(&date.year()) {
        Ok(date)
    } else {
        Err(InputError::DateOutOfRange(date.to_string()))
    }
}

fn resolve_date_spec(spec: &str, today: NaiveDate) -> Result<NaiveDate, InputError> {
    let trimmed = spec.trim();
    let invalid = || InputError::InvalidDate(trimmed.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return today.checked_add_days(Days::new(1)).ok_or_else(invalid),
        "yesterday" => return today.checked_sub_days(Days::new(1)).ok_or_else(invalid),
        _ => {}
    }

    if let Some(rest) = lower.strip_prefix('+') {
        return parse_relative_spec(rest, today).ok_or_else(invalid);
    }

    if let Some(weekday) = parse_weekday(&lower) {
        let mut days_ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        if days_ahead == 0 {
            days_ahead = 7;
        }
        return today
            .checked_add_days(Days::new(days_ahead as u64))
            .ok_or_else(invalid);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.date_naive());
    }

    Err(invalid())
}

fn parse_relative_spec(spec: &str, today: NaiveDate) -> Option<NaiveDate> {
    if spec.len() < 2 {
        return None;
    }
    let (number_part, unit) = spec.split_at(spec.len() - 1);
    let value: u32 = number_part.parse().ok()?;
    match unit {
        "d" => today.checked_add_days(Days::new(value.into())),
        "w" => today.checked_add_days(Days::new(u64::from(value) * 7)),
        "m" => today.checked_add_months(Months::new(value)),
        _ => None,
    }
}

fn parse_weekday(label: &str) -> Option<Weekday> {
    match label {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
