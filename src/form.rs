//! Input validation for task entry.
//!
//! The store accepts any strings; these checks run at the edge, before
//! `create` or `update`, the way an entry form would.

use chrono::NaiveDate;

use crate::config::FormConfig;
use crate::error::{Error, Result};
use crate::task::{NewTask, TaskUpdate};

/// Raw user input for a new task.
#[derive(Debug, Clone, Default)]
pub struct TaskForm {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<String>,
}

impl TaskForm {
    pub fn validate(self, config: &FormConfig) -> Result<NewTask> {
        let title = validate_title(&self.title, config)?;
        let category = match self.category {
            Some(category) => validate_category(&category, config)?,
            None => config.default_category.clone(),
        };

        let mut new_task = NewTask::new(title, category);
        if let Some(description) = self.description {
            new_task = new_task.with_description(validate_description(description, config)?);
        }
        if let Some(due_date) = self.due_date {
            new_task = new_task.with_due_date(validate_due_date(&due_date)?);
        }
        Ok(new_task)
    }
}

/// Raw user input for editing a task. `clear_*` flags remove optional fields.
#[derive(Debug, Clone, Default)]
pub struct EditForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub clear_description: bool,
    pub category: Option<String>,
    pub due_date: Option<String>,
    pub clear_due_date: bool,
    pub completed: Option<bool>,
}

impl EditForm {
    pub fn validate(self, config: &FormConfig) -> Result<TaskUpdate> {
        if self.description.is_some() && self.clear_description {
            return Err(Error::InvalidArgument(
                "--description and --clear-description are mutually exclusive".to_string(),
            ));
        }
        if self.due_date.is_some() && self.clear_due_date {
            return Err(Error::InvalidArgument(
                "--due and --clear-due are mutually exclusive".to_string(),
            ));
        }

        let mut update = TaskUpdate::new();
        if let Some(title) = self.title {
            update = update.title(validate_title(&title, config)?);
        }
        if let Some(description) = self.description {
            update = update.description(Some(validate_description(description, config)?));
        } else if self.clear_description {
            update = update.description(None);
        }
        if let Some(category) = self.category {
            update = update.category(validate_category(&category, config)?);
        }
        if let Some(due_date) = self.due_date {
            update = update.due_date(Some(validate_due_date(&due_date)?));
        } else if self.clear_due_date {
            update = update.due_date(None);
        }
        if let Some(completed) = self.completed {
            update = update.completed(completed);
        }

        if update.is_empty() {
            return Err(Error::InvalidArgument(
                "edit requires at least one field to change".to_string(),
            ));
        }
        Ok(update)
    }
}

fn validate_title(title: &str, config: &FormConfig) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }
    if trimmed.chars().count() > config.max_title_len {
        return Err(Error::InvalidArgument(format!(
            "title must be at most {} characters",
            config.max_title_len
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_description(description: String, config: &FormConfig) -> Result<String> {
    if description.chars().count() > config.max_description_len {
        return Err(Error::InvalidArgument(format!(
            "description must be at most {} characters",
            config.max_description_len
        )));
    }
    Ok(description)
}

fn validate_category(category: &str, config: &FormConfig) -> Result<String> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("category cannot be empty".to_string()));
    }
    if config.strict_categories && !config.categories.iter().any(|entry| entry == trimmed) {
        return Err(Error::InvalidArgument(format!(
            "unknown category '{}': must be one of {}",
            trimmed,
            config.categories.join(", ")
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_due_date(due_date: &str) -> Result<String> {
    let trimmed = due_date.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| {
            Error::InvalidArgument(format!(
                "invalid due date '{trimmed}': expected YYYY-MM-DD"
            ))
        })
}
