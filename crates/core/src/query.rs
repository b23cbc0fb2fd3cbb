use std::cmp::Ordering;

use tracing::debug;

use crate::model::{FilterOption, SortField, Task, TaskQuery};

/// Apply search, category filter and sort, in that order, to a task snapshot.
///
/// The sort is stable in both directions: tasks comparing equal keep their
/// relative input order even when the order is descending.
pub fn query(tasks: &[Task], params: &TaskQuery) -> Vec<Task> {
    let needle = params.search_text.to_lowercase();

    let mut selected: Vec<Task> = tasks
        .iter()
        .filter(|task| matches_search(task, &needle))
        .filter(|task| params.filter_by.matches(task))
        .cloned()
        .collect();

    selected.sort_by(|a, b| {
        let ordering = compare(a, b, params.sort_by);
        if params.order.is_reversed() {
            ordering.reverse()
        } else {
            ordering
        }
    });

    debug!(
        input = tasks.len(),
        output = selected.len(),
        sort = params.sort_by.as_str(),
        order = params.order.as_str(),
        filter = params.filter_by.as_str(),
        "queried tasks"
    );
    selected
}

/// Case-insensitive substring match on name, description or any tag. An empty
/// needle matches everything.
pub fn matches_search(task: &Task, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    task.name.to_lowercase().contains(needle)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || task.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

/// Natural ordering for a sort field. Progress is naturally descending.
pub fn compare(a: &Task, b: &Task, field: SortField) -> Ordering {
    match field {
        SortField::DueDate => a.due_date.cmp(&b.due_date),
        SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortField::Progress => b.progress.cmp(&a.progress),
        SortField::Name => compare_names(&a.name, &b.name),
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// SQL predicate equivalent to the search and category stages. Returns the
/// clause (starting with ` AND`) and the value to bind to `:needle`, if any.
pub fn where_clause(params: &TaskQuery) -> (String, Option<String>) {
    let mut sql = String::new();
    let mut needle = None;

    let text = params.search_text.to_lowercase();
    if !text.is_empty() {
        sql.push_str(
            " AND (instr(unicode_lower(name), :needle) > 0 \
             OR instr(unicode_lower(COALESCE(description, '')), :needle) > 0 \
             OR EXISTS (SELECT 1 FROM json_each(tasks.tags) \
                        WHERE instr(unicode_lower(json_each.value), :needle) > 0))",
        );
        needle = Some(text);
    }

    match params.filter_by {
        FilterOption::All => {}
        FilterOption::Completed => sql.push_str(" AND completed = 1"),
        FilterOption::Active => sql.push_str(" AND completed = 0"),
        FilterOption::High => sql.push_str(" AND priority = 'high'"),
        FilterOption::Medium => sql.push_str(" AND priority = 'medium'"),
        FilterOption::Low => sql.push_str(" AND priority = 'low'"),
    }

    (sql, needle)
}

/// SQL ordering equivalent to [`query`]'s sort stage. Insertion sequence is
/// the final key so ties come back in the same order as an unsorted fetch.
pub fn order_by_clause(params: &TaskQuery) -> String {
    let natural_desc = matches!(params.sort_by, SortField::Progress);
    let dir = if natural_desc != params.order.is_reversed() {
        "DESC"
    } else {
        "ASC"
    };

    let keys = match params.sort_by {
        SortField::DueDate => format!("due_date {dir}"),
        SortField::Priority => format!(
            "CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 WHEN 'low' THEN 2 ELSE 3 END {dir}"
        ),
        SortField::Progress => format!("progress {dir}"),
        SortField::Name => format!("unicode_lower(name) {dir}, name {dir}"),
    };

    format!(" ORDER BY {keys}, seq ASC")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, SortOrder};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn task(name: &str, due: &str, priority: Priority) -> Task {
        let now = Utc::now();
        Task {
            id: name.to_lowercase(),
            owner_id: 1,
            name: name.into(),
            description: None,
            due_date: due.parse().unwrap(),
            priority,
            completed: false,
            tags: vec![],
            progress: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn names(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn due_date_ascending_puts_earlier_first() {
        let tasks = vec![
            task("A", "2024-01-20", Priority::High),
            task("B", "2024-01-18", Priority::Medium),
        ];
        let params = TaskQuery::default().sorted_by(SortField::DueDate, SortOrder::Asc);
        assert_eq!(names(&query(&tasks, &params)), vec!["B", "A"]);
    }

    #[test]
    fn priority_sort_is_categorical() {
        let tasks = vec![
            task("L", "2024-01-01", Priority::Low),
            task("H", "2024-01-01", Priority::High),
            task("M", "2024-01-01", Priority::Medium),
        ];
        let asc = TaskQuery::default().sorted_by(SortField::Priority, SortOrder::Asc);
        assert_eq!(names(&query(&tasks, &asc)), vec!["H", "M", "L"]);

        let desc = TaskQuery::default().sorted_by(SortField::Priority, SortOrder::Desc);
        assert_eq!(names(&query(&tasks, &desc)), vec!["L", "M", "H"]);
    }

    #[rstest]
    #[case(SortOrder::Asc)]
    #[case(SortOrder::Desc)]
    fn equal_due_dates_keep_input_order(#[case] order: SortOrder) {
        let tasks = vec![
            task("first", "2024-05-01", Priority::Low),
            task("second", "2024-05-01", Priority::High),
            task("third", "2024-05-01", Priority::Medium),
        ];
        let params = TaskQuery::default().sorted_by(SortField::DueDate, order);
        assert_eq!(
            names(&query(&tasks, &params)),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn progress_defaults_to_most_complete_first() {
        let mut low = task("low", "2024-01-01", Priority::Low);
        low.progress = 10;
        let mut high = task("high", "2024-01-01", Priority::Low);
        high.progress = 90;
        let mut mid = task("mid", "2024-01-01", Priority::Low);
        mid.progress = 50;
        let tasks = vec![low, high, mid];

        let natural = TaskQuery::default().sorted_by(SortField::Progress, SortOrder::Asc);
        assert_eq!(names(&query(&tasks, &natural)), vec!["high", "mid", "low"]);

        let flipped = TaskQuery::default().sorted_by(SortField::Progress, SortOrder::Desc);
        assert_eq!(names(&query(&tasks, &flipped)), vec!["low", "mid", "high"]);
    }

    #[test]
    fn name_sort_ignores_case() {
        let tasks = vec![
            task("banana", "2024-01-01", Priority::Low),
            task("Apple", "2024-01-01", Priority::Low),
            task("cherry", "2024-01-01", Priority::Low),
        ];
        let params = TaskQuery::default().sorted_by(SortField::Name, SortOrder::Asc);
        assert_eq!(
            names(&query(&tasks, &params)),
            vec!["Apple", "banana", "cherry"]
        );
    }

    #[test]
    fn completed_filter_keeps_only_finished_tasks() {
        let mut done = task("done", "2024-01-01", Priority::Low);
        done.completed = true;
        let open = task("open", "2024-01-01", Priority::Low);
        let tasks = vec![done, open];

        let completed = TaskQuery::default().filtered_by(FilterOption::Completed);
        assert_eq!(names(&query(&tasks, &completed)), vec!["done"]);

        let active = TaskQuery::default().filtered_by(FilterOption::Active);
        assert_eq!(names(&query(&tasks, &active)), vec!["open"]);
    }

    #[test]
    fn priority_filters_match_exactly() {
        let tasks = vec![
            task("L", "2024-01-01", Priority::Low),
            task("H", "2024-01-01", Priority::High),
            task("M", "2024-01-01", Priority::Medium),
        ];
        let high = TaskQuery::default().filtered_by(FilterOption::High);
        assert_eq!(names(&query(&tasks, &high)), vec!["H"]);
        let medium = TaskQuery::default().filtered_by(FilterOption::Medium);
        assert_eq!(names(&query(&tasks, &medium)), vec!["M"]);
    }

    #[test]
    fn search_covers_name_description_and_tags() {
        let mut essay = task("English Essay", "2024-01-25", Priority::Low);
        essay.tags = vec!["writing".into()];
        let mut lab = task("Physics Lab Report", "2024-01-18", Priority::Medium);
        lab.description = Some("Pendulum experiment write-up".into());
        let math = task("Math Assignment", "2024-01-20", Priority::High);
        let tasks = vec![essay, lab, math];

        let by_name = TaskQuery::default().searching("ESSAY");
        assert_eq!(names(&query(&tasks, &by_name)), vec!["English Essay"]);

        let by_description = TaskQuery::default().searching("pendulum");
        assert_eq!(
            names(&query(&tasks, &by_description)),
            vec!["Physics Lab Report"]
        );

        let by_tag = TaskQuery::default().searching("writ");
        assert_eq!(
            names(&query(&tasks, &by_tag)),
            vec!["Physics Lab Report", "English Essay"]
        );
    }

    #[test]
    fn search_keeps_surrounding_whitespace() {
        let tasks = vec![
            task("Lab report", "2024-01-18", Priority::Medium),
            task("Physics lab", "2024-01-19", Priority::Medium),
        ];
        let leading = TaskQuery::default().searching(" lab");
        assert_eq!(names(&query(&tasks, &leading)), vec!["Physics lab"]);

        let blank = TaskQuery::default().searching("  ");
        assert!(query(&tasks, &blank).is_empty());

        let (_, needle) = where_clause(&blank);
        assert_eq!(needle.as_deref(), Some("  "));
    }

    #[test]
    fn search_runs_before_filter_and_sort() {
        let mut done = task("Essay draft", "2024-01-02", Priority::High);
        done.completed = true;
        let open = task("Essay final", "2024-01-01", Priority::Low);
        let other = task("Lab", "2024-01-01", Priority::Low);
        let tasks = vec![done, open, other];

        let params = TaskQuery::default()
            .searching("essay")
            .filtered_by(FilterOption::Active)
            .sorted_by(SortField::Priority, SortOrder::Asc);
        assert_eq!(names(&query(&tasks, &params)), vec!["Essay final"]);
    }

    #[test]
    fn query_is_deterministic() {
        let tasks = vec![
            task("A", "2024-01-20", Priority::High),
            task("B", "2024-01-18", Priority::Medium),
            task("C", "2024-01-18", Priority::Low),
        ];
        let params = TaskQuery::default().sorted_by(SortField::DueDate, SortOrder::Desc);
        assert_eq!(query(&tasks, &params), query(&tasks, &params));
    }

    #[test]
    fn order_clause_encodes_priority_case_and_tiebreak() {
        let params = TaskQuery::default().sorted_by(SortField::Priority, SortOrder::Asc);
        let clause = order_by_clause(&params);
        assert!(clause.contains("CASE priority WHEN 'high' THEN 0"));
        assert!(clause.ends_with("ASC, seq ASC"));
    }

    #[test]
    fn order_clause_flips_progress_natural_direction() {
        let natural = TaskQuery::default().sorted_by(SortField::Progress, SortOrder::Asc);
        assert_eq!(order_by_clause(&natural), " ORDER BY progress DESC, seq ASC");
        let flipped = TaskQuery::default().sorted_by(SortField::Progress, SortOrder::Desc);
        assert_eq!(order_by_clause(&flipped), " ORDER BY progress ASC, seq ASC");
    }

    #[test]
    fn order_clause_for_names_uses_both_keys() {
        let params = TaskQuery::default().sorted_by(SortField::Name, SortOrder::Desc);
        assert_eq!(
            order_by_clause(&params),
            " ORDER BY unicode_lower(name) DESC, name DESC, seq ASC"
        );
    }

    #[test]
    fn where_clause_binds_lowercased_needle() {
        let params = TaskQuery::default()
            .searching("Essay")
            .filtered_by(FilterOption::High);
        let (sql, needle) = where_clause(&params);
        assert!(sql.contains("json_each"));
        assert!(sql.ends_with(" AND priority = 'high'"));
        assert_eq!(needle.as_deref(), Some("essay"));
    }
}
