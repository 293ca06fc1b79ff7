//! Derived views over a task collection.
//!
//! The store exposes one predicate per read operation; combining them is the
//! caller's policy. A [`TaskQuery`] intersects every active predicate, so the
//! order in which they are applied does not matter.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::Serialize;

use crate::task::{StatusFilter, Task};

/// Status, category and search filters applied together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub status: StatusFilter,
    pub category: Option<String>,
    /// An empty search is not a filter; whitespace is matched literally.
    pub search: Option<String>,
}

impl TaskQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    fn active_search(&self) -> Option<&str> {
        self.search
            .as_deref()
            .filter(|query| !query.is_empty())
    }

    pub fn matches(&self, task: &Task) -> bool {
        task.matches_status(self.status)
            && self
                .category
                .as_deref()
                .map_or(true, |category| task.matches_category(category))
            && self
                .active_search()
                .map_or(true, |query| task.matches_search(query))
    }

    /// Matching tasks, in collection order.
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|task| self.matches(task)).collect()
    }
}

/// Number of tasks per completion status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub all: usize,
    pub active: usize,
    pub completed: usize,
}

pub fn status_counts(tasks: &[Task]) -> StatusCounts {
    let completed = tasks.iter().filter(|task| task.completed).count();
    StatusCounts {
        all: tasks.len(),
        active: tasks.len() - completed,
        completed,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Per-category totals, ascending by category.
///
/// With a non-empty `search`, only matching tasks are counted; categories
/// whose tasks all miss the search are still listed with a zero count.
pub fn category_counts(tasks: &[Task], search: Option<&str>) -> Vec<CategoryCount> {
    let search = search.filter(|query| !query.is_empty());
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for task in tasks {
        let entry = counts.entry(task.category.as_str()).or_insert(0);
        if search.map_or(true, |query| task.matches_search(query)) {
            *entry += 1;
        }
    }
    counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect()
}

/// Parse a stored due date: `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|timestamp| timestamp.date_naive())
        })
}

/// An active task whose due date is strictly before `today`.
///
/// Unparsable due dates are never overdue.
pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    task.is_active()
        && task
            .due_date
            .as_deref()
            .and_then(parse_due_date)
            .map_or(false, |due| due < today)
}
