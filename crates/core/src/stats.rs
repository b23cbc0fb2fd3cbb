use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::Task;

/// Dashboard counters relative to a reference day.
///
/// `pending` and `upcoming` overlap: a task due later than `today` counts in
/// both, while a task due exactly `today` is pending but not upcoming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    pub upcoming: usize,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], today: NaiveDate) -> Self {
        let mut stats = TaskStats {
            total: tasks.len(),
            ..TaskStats::default()
        };

        for task in tasks {
            if task.completed {
                stats.completed += 1;
                continue;
            }
            if task.due_date >= today {
                stats.pending += 1;
            } else {
                stats.overdue += 1;
            }
            if task.due_date > today {
                stats.upcoming += 1;
            }
        }

        stats
    }

    /// Share of completed tasks as a whole percentage.
    pub fn completion_rate(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) / self.total) as u8
    }
}

/// Number of tasks carrying each tag.
pub fn category_distribution(tasks: &[Task]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for task in tasks {
        for tag in &task.tags {
            *counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn task(due: &str, completed: bool, tags: &[&str]) -> Task {
        let now = Utc::now();
        Task {
            id: due.into(),
            owner_id: 1,
            name: "Task".into(),
            description: None,
            due_date: due.parse().unwrap(),
            priority: Priority::Medium,
            completed,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            progress: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn counts_relative_to_today() {
        let today: NaiveDate = "2024-01-19".parse().unwrap();
        let tasks = vec![
            task("2024-01-18", false, &[]),
            task("2024-01-19", false, &[]),
            task("2024-01-25", false, &[]),
            task("2024-01-10", true, &[]),
        ];

        let stats = TaskStats::compute(&tasks, today);
        assert_eq!(
            stats,
            TaskStats {
                total: 4,
                completed: 1,
                pending: 2,
                overdue: 1,
                upcoming: 1,
            }
        );
        assert_eq!(stats.completion_rate(), 25);
    }

    #[test]
    fn empty_snapshot_has_zero_rate() {
        let stats = TaskStats::compute(&[], "2024-01-01".parse().unwrap());
        assert_eq!(stats.completion_rate(), 0);
    }

    #[test]
    fn distribution_counts_each_tag() {
        let tasks = vec![
            task("2024-01-18", false, &["math", "homework"]),
            task("2024-01-19", false, &["physics", "homework"]),
        ];
        let counts = category_distribution(&tasks);
        assert_eq!(counts.get("homework"), Some(&2));
        assert_eq!(counts.get("math"), Some(&1));
        assert_eq!(counts.keys().collect::<Vec<_>>(), vec!["homework", "math", "physics"]);
    }
}
