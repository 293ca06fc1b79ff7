//! Task store.
//!
//! The store owns the authoritative, newest-first collection of tasks and
//! writes a full snapshot through its [`Persistence`] adapter after every
//! mutation. Derived views (status, search, category) are recomputed from the
//! in-memory collection on each call.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::persist::Persistence;

/// A single trackable item.
///
/// Field names on disk are camelCase and stable:
/// `id`, `title`, `description`, `category`, `dueDate`, `completed`, `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(
        default,
        serialize_with = "absent_as_empty",
        deserialize_with = "empty_as_absent"
    )]
    pub description: Option<String>,
    pub category: String,
    #[serde(
        default,
        serialize_with = "absent_as_empty",
        deserialize_with = "empty_as_absent"
    )]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_active(&self) -> bool {
        !self.completed
    }

    pub fn matches_status(&self, filter: StatusFilter) -> bool {
        match filter {
            StatusFilter::All => true,
            StatusFilter::Active => !self.completed,
            StatusFilter::Completed => self.completed,
        }
    }

    /// Case-insensitive substring match on title or description.
    ///
    /// An empty query matches every task.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self
                .description
                .as_deref()
                .map(|description| description.to_lowercase().contains(&query))
                .unwrap_or(false)
    }

    /// Exact, case-sensitive category match.
    pub fn matches_category(&self, category: &str) -> bool {
        self.category == category
    }
}

// Snapshots store "" for "no description" / "no due date".
fn absent_as_empty<S>(value: &Option<String>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

// Only "" and null mean absent; other text is kept verbatim.
fn empty_as_absent<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.is_empty()))
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Completion-status filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Completed => "completed",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" | "done" => Ok(StatusFilter::Completed),
            _ => Err(Error::InvalidArgument(format!(
                "invalid status '{}': must be all, active, or completed",
                s
            ))),
        }
    }
}

/// Fields supplied to [`TaskStore::create`]; the store assigns `id` and `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub due_date: Option<String>,
    pub completed: bool,
}

impl NewTask {
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            category: category.into(),
            due_date: None,
            completed: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }
}

/// Partial replacement for an existing task.
///
/// Only `Some` fields are applied. For the optional record fields the inner
/// `Option` is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub due_date: Option<Option<String>>,
    pub completed: Option<bool>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn due_date(mut self, due_date: Option<String>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
    }

    fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = normalize_optional(description);
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = normalize_optional(due_date);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

/// A committed mutation, delivered to observers after the snapshot is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "task", rename_all = "snake_case")]
pub enum Change {
    Created(Task),
    Updated(Task),
    Toggled(Task),
    Deleted(Task),
}

impl Change {
    pub fn task(&self) -> &Task {
        match self {
            Change::Created(task)
            | Change::Updated(task)
            | Change::Toggled(task)
            | Change::Deleted(task) => task,
        }
    }
}

type Listener = Box<dyn FnMut(&Change)>;

/// The authoritative task collection plus its persistence adapter.
///
/// Mutations return `Ok(Some(task))` when applied, `Ok(None)` when the id is
/// unknown (nothing changes, nothing is written), and `Err` when the snapshot
/// write fails, in which case the in-memory collection is rolled back.
pub struct TaskStore<P: Persistence> {
    tasks: Vec<Task>,
    persistence: P,
    listeners: Vec<Listener>,
}

impl<P: Persistence> fmt::Debug for TaskStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.tasks.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<P: Persistence> TaskStore<P> {
    /// Load the collection once from `persistence`.
    pub fn open(mut persistence: P) -> Result<Self> {
        let tasks = persistence.load()?;
        debug!(tasks = tasks.len(), "task store opened");
        Ok(Self {
            tasks,
            persistence,
            listeners: Vec::new(),
        })
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Register an observer for committed changes.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&Change) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// All tasks, newest first.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn create(&mut self, new_task: NewTask) -> Result<Task> {
        let task = Task {
            id: self.generate_id(),
            title: new_task.title,
            description: normalize_optional(new_task.description),
            category: new_task.category,
            due_date: normalize_optional(new_task.due_date),
            completed: new_task.completed,
            created_at: Utc::now(),
        };

        let previous = self.tasks.clone();
        self.tasks.insert(0, task.clone());
        self.commit(previous, Change::Created(task.clone()))?;
        debug!(id = %task.id, "task created");
        Ok(task)
    }

    pub fn update(&mut self, id: &str, update: TaskUpdate) -> Result<Option<Task>> {
        let Some(index) = self.position(id) else {
            debug!(id, "update: task not found");
            return Ok(None);
        };

        let previous = self.tasks.clone();
        update.apply(&mut self.tasks[index]);
        let task = self.tasks[index].clone();
        self.commit(previous, Change::Updated(task.clone()))?;
        debug!(id, "task updated");
        Ok(Some(task))
    }

    pub fn delete(&mut self, id: &str) -> Result<Option<Task>> {
        let Some(index) = self.position(id) else {
            debug!(id, "delete: task not found");
            return Ok(None);
        };

        let previous = self.tasks.clone();
        let task = self.tasks.remove(index);
        self.commit(previous, Change::Deleted(task.clone()))?;
        debug!(id, "task deleted");
        Ok(Some(task))
    }

    pub fn toggle_complete(&mut self, id: &str) -> Result<Option<Task>> {
        let Some(index) = self.position(id) else {
            debug!(id, "toggle: task not found");
            return Ok(None);
        };

        let previous = self.tasks.clone();
        self.tasks[index].completed = !self.tasks[index].completed;
        let task = self.tasks[index].clone();
        self.commit(previous, Change::Toggled(task.clone()))?;
        debug!(id, completed = task.completed, "task toggled");
        Ok(Some(task))
    }

    pub fn list_by_status(&self, filter: StatusFilter) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.matches_status(filter))
            .collect()
    }

    pub fn search(&self, query: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.matches_search(query))
            .collect()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.matches_category(category))
            .collect()
    }

    /// Distinct categories in ascending order.
    pub fn list_categories(&self) -> Vec<String> {
        self.tasks
            .iter()
            .map(|task| task.category.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Resolve a full id or a unique, case-insensitive id prefix.
    pub fn resolve_id(&self, input: &str) -> Result<String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }

        if let Some(task) = self.get(trimmed) {
            return Ok(task.id.clone());
        }

        let needle = trimmed.to_lowercase();
        let mut exact: Vec<String> = Vec::new();
        let mut matches: Vec<String> = Vec::new();
        for task in &self.tasks {
            let id_norm = task.id.to_lowercase();
            if id_norm == needle {
                exact.push(task.id.clone());
            } else if id_norm.starts_with(&needle) {
                matches.push(task.id.clone());
            }
        }

        if exact.len() == 1 {
            return Ok(exact.remove(0));
        }
        if exact.len() > 1 {
            exact.sort();
            return Err(Error::AmbiguousTaskId {
                input: trimmed.to_string(),
                candidates: exact,
            });
        }

        matches.sort();
        match matches.len() {
            0 => Err(Error::TaskNotFound(trimmed.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(Error::AmbiguousTaskId {
                input: trimmed.to_string(),
                candidates: matches,
            }),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    fn generate_id(&self) -> String {
        loop {
            let id = Ulid::new().to_string().to_lowercase();
            if self.position(&id).is_none() {
                return id;
            }
        }
    }

    fn commit(&mut self, previous: Vec<Task>, change: Change) -> Result<()> {
        if let Err(err) = self.persistence.save(&self.tasks) {
            warn!(error = %err, "snapshot write failed; rolling back");
            self.tasks = previous;
            return Err(err);
        }
        for listener in &mut self.listeners {
            listener(&change);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingPersistence {
        initial: Vec<Task>,
        saves: Rc<RefCell<Vec<Vec<Task>>>>,
        fail: Rc<Cell<bool>>,
    }

    impl Persistence for RecordingPersistence {
        fn load(&mut self) -> Result<Vec<Task>> {
            Ok(self.initial.clone())
        }

        fn save(&mut self, tasks: &[Task]) -> Result<()> {
            if self.fail.get() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "quota exceeded",
                )));
            }
            self.saves.borrow_mut().push(tasks.to_vec());
            Ok(())
        }
    }

    fn empty_store() -> TaskStore<RecordingPersistence> {
        TaskStore::open(RecordingPersistence::default()).unwrap()
    }

    fn task_with_id(id: &str, category: &str) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            description: None,
            category: category.to_string(),
            due_date: None,
            completed: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_prepends_and_assigns_identity() {
        let mut store = empty_store();
        let first = store.create(NewTask::new("First", "work")).unwrap();
        let second = store.create(NewTask::new("Second", "home")).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.tasks()[0].id, second.id);
        assert_eq!(store.tasks()[1].id, first.id);
        assert_ne!(first.id, second.id);
        assert!(!first.completed);
        assert!(second.created_at >= first.created_at);
    }

    #[test]
    fn create_never_reuses_ids() {
        let mut store = empty_store();
        for idx in 0..500 {
            store.create(NewTask::new(format!("t{idx}"), "bulk")).unwrap();
        }
        let ids: HashSet<&str> = store.tasks().iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn every_mutation_saves_the_full_collection() {
        let persistence = RecordingPersistence::default();
        let saves = Rc::clone(&persistence.saves);
        let mut store = TaskStore::open(persistence).unwrap();

        let task = store.create(NewTask::new("Buy milk", "shopping")).unwrap();
        store.toggle_complete(&task.id).unwrap();
        store
            .update(&task.id, TaskUpdate::new().title("Buy oat milk"))
            .unwrap();
        store.delete(&task.id).unwrap();

        let saves = saves.borrow();
        assert_eq!(saves.len(), 4);
        assert_eq!(saves[0].len(), 1);
        assert!(saves[1][0].completed);
        assert_eq!(saves[2][0].title, "Buy oat milk");
        assert!(saves[3].is_empty());
        assert!(store.is_empty());
        assert!(store.list_categories().is_empty());
    }

    #[test]
    fn update_replaces_only_given_fields() {
        let mut store = empty_store();
        let task = store
            .create(
                NewTask::new("Write report", "work")
                    .with_description("quarterly numbers")
                    .with_due_date("2026-11-01"),
            )
            .unwrap();

        let updated = store
            .update(&task.id, TaskUpdate::new().category("finance"))
            .unwrap()
            .expect("task exists");

        assert_eq!(updated.id, task.id);
        assert_eq!(updated.created_at, task.created_at);
        assert_eq!(updated.title, "Write report");
        assert_eq!(updated.description.as_deref(), Some("quarterly numbers"));
        assert_eq!(updated.due_date.as_deref(), Some("2026-11-01"));
        assert_eq!(updated.category, "finance");

        let cleared = store
            .update(&task.id, TaskUpdate::new().description(None).due_date(None))
            .unwrap()
            .expect("task exists");
        assert!(cleared.description.is_none());
        assert!(cleared.due_date.is_none());
    }

    #[test]
    fn unknown_ids_report_not_found_without_writing() {
        let persistence = RecordingPersistence::default();
        let saves = Rc::clone(&persistence.saves);
        let mut store = TaskStore::open(persistence).unwrap();

        assert!(store
            .update("missing", TaskUpdate::new().title("x"))
            .unwrap()
            .is_none());
        assert!(store.delete("missing").unwrap().is_none());
        assert!(store.toggle_complete("missing").unwrap().is_none());
        assert!(saves.borrow().is_empty());
    }

    #[test]
    fn failed_save_rolls_back_memory() {
        let persistence = RecordingPersistence::default();
        let fail = Rc::clone(&persistence.fail);
        let mut store = TaskStore::open(persistence).unwrap();
        let task = store.create(NewTask::new("Keep me", "work")).unwrap();

        fail.set(true);
        assert!(store.create(NewTask::new("Lost", "work")).is_err());
        assert!(store.toggle_complete(&task.id).is_err());
        assert!(store.delete(&task.id).is_err());
        assert!(store
            .update(&task.id, TaskUpdate::new().title("Renamed"))
            .is_err());

        assert_eq!(store.tasks(), &[task]);
    }

    #[test]
    fn observers_see_committed_changes_only() {
        let persistence = RecordingPersistence::default();
        let fail = Rc::clone(&persistence.fail);
        let mut store = TaskStore::open(persistence).unwrap();
        let seen: Rc<RefCell<Vec<Change>>> = Rc::default();
        let sink = Rc::clone(&seen);
        store.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        let task = store.create(NewTask::new("Observe", "work")).unwrap();
        store.toggle_complete(&task.id).unwrap();
        store.toggle_complete("missing").unwrap();
        fail.set(true);
        let _ = store.delete(&task.id);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0], Change::Created(t) if t.id == task.id));
        assert!(matches!(&seen[1], Change::Toggled(t) if t.completed));
    }

    #[test]
    fn status_filters_partition_the_collection() {
        let mut store = empty_store();
        let a = store.create(NewTask::new("a", "x")).unwrap();
        store.create(NewTask::new("b", "x")).unwrap();
        store.create(NewTask::new("c", "x").completed(true)).unwrap();
        store.toggle_complete(&a.id).unwrap();

        let active = store.list_by_status(StatusFilter::Active);
        let completed = store.list_by_status(StatusFilter::Completed);
        let all = store.list_by_status(StatusFilter::All);
        assert_eq!(active.len(), 1);
        assert_eq!(completed.len(), 2);
        assert_eq!(all.len(), 3);
        assert!(active.iter().all(|task| !task.completed));
        assert!(completed.iter().all(|task| task.completed));
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let mut store = empty_store();
        store.create(NewTask::new("Buy MILK", "shopping")).unwrap();
        store
            .create(NewTask::new("Groceries", "shopping").with_description("milk and eggs"))
            .unwrap();
        store.create(NewTask::new("Call mom", "personal")).unwrap();

        assert_eq!(store.search("milk").len(), 2);
        assert_eq!(store.search("EGGS").len(), 1);
        assert_eq!(store.search("").len(), 3);
        assert!(store.search("bread").is_empty());
    }

    #[test]
    fn category_lookup_is_exact_and_listing_is_sorted() {
        let mut store = empty_store();
        store.create(NewTask::new("a", "work")).unwrap();
        store.create(NewTask::new("b", "personal")).unwrap();
        store.create(NewTask::new("c", "Work")).unwrap();
        store.create(NewTask::new("d", "work")).unwrap();

        assert_eq!(store.list_by_category("work").len(), 2);
        assert_eq!(store.list_by_category("Work").len(), 1);
        assert_eq!(
            store.list_categories(),
            vec!["Work".to_string(), "personal".to_string(), "work".to_string()]
        );
    }

    #[test]
    fn blank_optionals_are_stored_as_absent() {
        let mut store = empty_store();
        let task = store
            .create(
                NewTask::new("Tidy", "home")
                    .with_description("   ")
                    .with_due_date(""),
            )
            .unwrap();
        assert!(task.description.is_none());
        assert!(task.due_date.is_none());
    }

    #[test]
    fn resolve_id_accepts_full_and_unique_prefix() {
        let persistence = RecordingPersistence {
            initial: vec![
                task_with_id("01abc", "x"),
                task_with_id("01abd", "x"),
                task_with_id("1712345678901", "x"),
            ],
            ..Default::default()
        };
        let store = TaskStore::open(persistence).unwrap();

        assert_eq!(store.resolve_id("01abc").unwrap(), "01abc");
        assert_eq!(store.resolve_id("01ABD").unwrap(), "01abd");
        assert_eq!(store.resolve_id("1712").unwrap(), "1712345678901");
        assert!(matches!(
            store.resolve_id("01ab"),
            Err(Error::AmbiguousTaskId { candidates, .. }) if candidates.len() == 2
        ));
        assert!(matches!(store.resolve_id("zz"), Err(Error::TaskNotFound(_))));
        assert!(matches!(store.resolve_id("  "), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn status_filter_parses_names() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!("Active".parse::<StatusFilter>().unwrap(), StatusFilter::Active);
        assert_eq!(
            "completed".parse::<StatusFilter>().unwrap(),
            StatusFilter::Completed
        );
        assert!("open".parse::<StatusFilter>().is_err());
        assert_eq!(StatusFilter::Completed.to_string(), "completed");
    }

    #[test]
    fn task_serializes_with_stable_field_names() {
        let mut task = task_with_id("abc", "work");
        task.due_date = Some("2026-01-02".to_string());
        let value = serde_json::to_value(&task).unwrap();
        let object = value.as_object().unwrap();
        for key in ["id", "title", "category", "dueDate", "completed", "createdAt"] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object["description"], "");
        assert_eq!(object["dueDate"], "2026-01-02");
    }
}
