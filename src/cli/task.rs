//! todos command implementations.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::Utc;
use directories::ProjectDirs;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Event, EventDestination};
use crate::form::{EditForm, TaskForm};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::persist::SnapshotPersistence;
use crate::storage::FileStorage;
use crate::task::{StatusFilter, Task, TaskStore};
use crate::view::{self, CategoryCount, StatusCounts, TaskQuery};

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub dir: Option<PathBuf>,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

pub struct AddOptions {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub due: Option<String>,
    pub global: GlobalOptions,
}

pub struct ListOptions {
    pub status: String,
    pub category: Option<String>,
    pub search: Option<String>,
    pub global: GlobalOptions,
}

pub struct SearchOptions {
    pub query: String,
    pub global: GlobalOptions,
}

pub struct ShowOptions {
    pub id: String,
    pub global: GlobalOptions,
}

pub struct EditOptions {
    pub id: String,
    pub form: EditForm,
    pub global: GlobalOptions,
}

pub struct ToggleOptions {
    pub id: String,
    pub global: GlobalOptions,
}

pub struct RemoveOptions {
    pub id: String,
    pub global: GlobalOptions,
}

pub struct CategoriesOptions {
    pub search: Option<String>,
    pub global: GlobalOptions,
}

pub struct StatsOptions {
    pub global: GlobalOptions,
}

type FileTaskStore = TaskStore<SnapshotPersistence<FileStorage>>;

struct TaskContext {
    store: FileTaskStore,
    config: Config,
    warnings: Vec<String>,
    event_warnings: Rc<RefCell<Vec<String>>>,
    events_to_stdout: bool,
}

impl TaskContext {
    /// Load-time warnings plus any event-output failures so far
    fn drain_warnings(&mut self) -> Vec<String> {
        let mut warnings = std::mem::take(&mut self.warnings);
        warnings.append(&mut self.event_warnings.borrow_mut());
        warnings
    }

    fn output_options(&self, global: &GlobalOptions) -> OutputOptions {
        OutputOptions {
            json: global.json && !self.events_to_stdout,
            quiet: global.quiet || self.events_to_stdout,
        }
    }
}

#[derive(Serialize)]
struct TaskOutput {
    task: Task,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    status: StatusFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    counts: StatusCounts,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct SearchOutput {
    query: String,
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct CategoriesOutput {
    categories: Vec<String>,
    counts: Vec<CategoryCount>,
}

#[derive(Serialize)]
struct StatsOutput {
    counts: StatusCounts,
    overdue: usize,
    categories: Vec<CategoryCount>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let mut ctx = load_context(&options.global)?;
    let new_task = TaskForm {
        title: options.title,
        description: options.description,
        category: options.category,
        due_date: options.due,
    }
    .validate(&ctx.config.form)?;

    let task = ctx.store.create(new_task)?;

    let mut human = HumanOutput::new("Task created");
    push_task_summary(&mut human, &task);
    for warning in ctx.drain_warnings() {
        human.push_warning(warning);
    }
    human.push_next_step(format!("todos toggle {}", task.id));

    emit_success(
        ctx.output_options(&options.global),
        "add",
        &TaskOutput { task },
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let mut ctx = load_context(&options.global)?;
    let status: StatusFilter = options.status.parse()?;

    let mut query = TaskQuery::new().status(status);
    if let Some(category) = options.category.clone() {
        query = query.category(category);
    }
    if let Some(search) = options.search.clone() {
        query = query.search(search);
    }

    let tasks: Vec<Task> = query.apply(ctx.store.tasks()).into_iter().cloned().collect();
    let counts = view::status_counts(ctx.store.tasks());
    let today = Utc::now().date_naive();

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    human.push_summary("Status", status.to_string());
    if let Some(category) = &options.category {
        human.push_summary("Category", category.clone());
    }
    if let Some(search) = &options.search {
        human.push_summary("Search", search.clone());
    }
    human.push_summary(
        "Counts",
        format!(
            "all={}, active={}, completed={}",
            counts.all, counts.active, counts.completed
        ),
    );
    for task in &tasks {
        human.push_detail(format_task_line(task, view::is_overdue(task, today)));
    }
    for warning in ctx.drain_warnings() {
        human.push_warning(warning);
    }
    if ctx.store.is_empty() {
        human.push_next_step("todos add <title>");
    }

    let output = TaskListOutput {
        total: tasks.len(),
        status,
        category: options.category,
        search: options.search,
        counts,
        tasks,
    };

    emit_success(
        ctx.output_options(&options.global),
        "list",
        &output,
        Some(&human),
    )
}

pub fn run_search(options: SearchOptions) -> Result<()> {
    let mut ctx = load_context(&options.global)?;
    let tasks: Vec<Task> = ctx
        .store
        .search(&options.query)
        .into_iter()
        .cloned()
        .collect();
    let today = Utc::now().date_naive();

    let mut human = HumanOutput::new(format!("Search: {}", options.query));
    human.push_summary("Matches", tasks.len().to_string());
    for task in &tasks {
        human.push_detail(format_task_line(task, view::is_overdue(task, today)));
    }
    for warning in ctx.drain_warnings() {
        human.push_warning(warning);
    }

    let output = SearchOutput {
        query: options.query,
        total: tasks.len(),
        tasks,
    };

    emit_success(
        ctx.output_options(&options.global),
        "search",
        &output,
        Some(&human),
    )
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let mut ctx = load_context(&options.global)?;
    let id = ctx.store.resolve_id(&options.id)?;
    let task = ctx
        .store
        .get(&id)
        .cloned()
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;
    let today = Utc::now().date_naive();

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    push_task_summary(&mut human, &task);
    if view::is_overdue(&task, today) {
        human.push_summary("Overdue", "yes");
    }
    human.push_summary("Created", task.created_at.to_rfc3339());
    for warning in ctx.drain_warnings() {
        human.push_warning(warning);
    }

    emit_success(
        ctx.output_options(&options.global),
        "show",
        &TaskOutput { task },
        Some(&human),
    )
}

pub fn run_edit(options: EditOptions) -> Result<()> {
    let mut ctx = load_context(&options.global)?;
    let update = options.form.validate(&ctx.config.form)?;
    let id = ctx.store.resolve_id(&options.id)?;
    let task = ctx
        .store
        .update(&id, update)?
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;

    let mut human = HumanOutput::new("Task updated");
    push_task_summary(&mut human, &task);
    for warning in ctx.drain_warnings() {
        human.push_warning(warning);
    }

    emit_success(
        ctx.output_options(&options.global),
        "edit",
        &TaskOutput { task },
        Some(&human),
    )
}

pub fn run_toggle(options: ToggleOptions) -> Result<()> {
    let mut ctx = load_context(&options.global)?;
    let id = ctx.store.resolve_id(&options.id)?;
    let task = ctx
        .store
        .toggle_complete(&id)?
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;

    let header = if task.completed {
        "Task completed"
    } else {
        "Task reopened"
    };
    let mut human = HumanOutput::new(header);
    push_task_summary(&mut human, &task);
    for warning in ctx.drain_warnings() {
        human.push_warning(warning);
    }

    emit_success(
        ctx.output_options(&options.global),
        "toggle",
        &TaskOutput { task },
        Some(&human),
    )
}

pub fn run_remove(options: RemoveOptions) -> Result<()> {
    let mut ctx = load_context(&options.global)?;
    let id = ctx.store.resolve_id(&options.id)?;
    let task = ctx
        .store
        .delete(&id)?
        .ok_or_else(|| Error::TaskNotFound(id.clone()))?;

    let mut human = HumanOutput::new("Task deleted");
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Remaining", ctx.store.len().to_string());
    for warning in ctx.drain_warnings() {
        human.push_warning(warning);
    }

    emit_success(
        ctx.output_options(&options.global),
        "rm",
        &TaskOutput { task },
        Some(&human),
    )
}

pub fn run_categories(options: CategoriesOptions) -> Result<()> {
    let mut ctx = load_context(&options.global)?;
    let categories = ctx.store.list_categories();
    let counts = view::category_counts(ctx.store.tasks(), options.search.as_deref());

    let mut human = HumanOutput::new("Categories");
    human.push_summary("Total", categories.len().to_string());
    if let Some(search) = &options.search {
        human.push_summary("Search", search.clone());
    }
    for entry in &counts {
        human.push_detail(format!("{} ({})", entry.category, entry.count));
    }
    for warning in ctx.drain_warnings() {
        human.push_warning(warning);
    }

    emit_success(
        ctx.output_options(&options.global),
        "categories",
        &CategoriesOutput { categories, counts },
        Some(&human),
    )
}

pub fn run_stats(options: StatsOptions) -> Result<()> {
    let mut ctx = load_context(&options.global)?;
    let tasks = ctx.store.tasks();
    let today = Utc::now().date_naive();

    let output = StatsOutput {
        counts: view::status_counts(tasks),
        overdue: tasks
            .iter()
            .filter(|task| view::is_overdue(task, today))
            .count(),
        categories: view::category_counts(tasks, None),
    };

    let mut human = HumanOutput::new("Task stats");
    human.push_summary("All", output.counts.all.to_string());
    human.push_summary("Active", output.counts.active.to_string());
    human.push_summary("Completed", output.counts.completed.to_string());
    human.push_summary("Overdue", output.overdue.to_string());
    if !output.categories.is_empty() {
        human.push_summary("Categories", format_category_counts(&output.categories));
    }
    for warning in ctx.drain_warnings() {
        human.push_warning(warning);
    }

    emit_success(
        ctx.output_options(&options.global),
        "stats",
        &output,
        Some(&human),
    )
}

fn load_context(global: &GlobalOptions) -> Result<TaskContext> {
    let data_dir = resolve_data_dir(global.dir.clone())?;
    debug!(dir = %data_dir.display(), "using data directory");
    let config = Config::load_from_dir(&data_dir);

    let storage = FileStorage::new(data_dir).with_lock_timeout(config.lock_timeout_ms);
    let persistence = SnapshotPersistence::new(storage, config.storage_key.clone())?;
    let mut store = TaskStore::open(persistence)?;
    debug!(key = store.persistence().key(), tasks = store.len(), "tasks loaded");

    let mut warnings = Vec::new();
    if let Some(recovery) = store.persistence().recovery() {
        let mut message = format!("stored tasks were unreadable ({})", recovery.reason);
        match &recovery.backup_key {
            Some(backup) => message.push_str(&format!("; previous data kept as '{backup}'")),
            None => message.push_str("; previous data could not be backed up"),
        }
        warnings.push(message);
    }

    let destination = EventDestination::parse(global.events.as_deref());
    let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));
    let event_warnings: Rc<RefCell<Vec<String>>> = Rc::default();
    if let Some(destination) = destination {
        let mut sink = destination.open()?;
        let failures = Rc::clone(&event_warnings);
        store.subscribe(move |change| {
            if let Err(err) = sink.emit(&Event::from_change(change)) {
                warn!(error = %err, "event output failed");
                failures
                    .borrow_mut()
                    .push(format!("event output failed: {err}"));
            }
        });
    }

    Ok(TaskContext {
        store,
        config,
        warnings,
        event_warnings,
        events_to_stdout,
    })
}

fn resolve_data_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = dir {
        return Ok(dir);
    }
    ProjectDirs::from("", "", "todos")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(Error::DataDirUnavailable)
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Category", task.category.clone());
    human.push_summary(
        "Status",
        if task.completed { "completed" } else { "active" },
    );
    if let Some(description) = &task.description {
        human.push_summary("Description", description.clone());
    }
    if let Some(due_date) = &task.due_date {
        human.push_summary("Due", due_date.clone());
    }
}

fn format_task_line(task: &Task, overdue: bool) -> String {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    let mut line = format!(
        "{} {} {} ({})",
        mark,
        task.id,
        task.title,
        task.category
    );
    if let Some(due_date) = &task.due_date {
        line.push_str(&format!(" due {due_date}"));
        if overdue {
            line.push_str(" OVERDUE");
        }
    }
    line
}

fn format_category_counts(counts: &[CategoryCount]) -> String {
    counts
        .iter()
        .map(|entry| format!("{}={}", entry.category, entry.count))
        .collect::<Vec<_>>()
        .join(", ")
}
