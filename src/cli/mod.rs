//! Command-line interface for todos
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in [`task`].

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::form::EditForm;

mod task;

/// todos - a local task list
///
/// Tracks tasks with a category, optional description and due date, and a
/// completion flag. Every change is saved immediately.
#[derive(Parser, Debug)]
#[command(name = "todos")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding the task snapshot and todos.toml
    #[arg(long, global = true, env = "TODOS_DIR")]
    pub dir: Option<std::path::PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit change events as JSON lines to a file, or `-` for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Category (defaults to the configured default category)
        #[arg(short, long)]
        category: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// List tasks
    List {
        /// Status filter: all, active, completed
        #[arg(long, default_value = "all")]
        status: String,

        /// Only tasks in this category (exact match)
        #[arg(short, long)]
        category: Option<String>,

        /// Only tasks whose title or description contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Search titles and descriptions (case-insensitive)
    Search {
        /// Text to look for
        query: String,
    },

    /// Show one task
    Show {
        /// Task id or unique id prefix
        id: String,
    },

    /// Change fields of a task
    Edit {
        /// Task id or unique id prefix
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// Remove the description
        #[arg(long)]
        clear_description: bool,

        /// New category
        #[arg(short, long)]
        category: Option<String>,

        /// New due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// Set the completion flag
        #[arg(long)]
        completed: Option<bool>,
    },

    /// Flip a task between active and completed
    Toggle {
        /// Task id or unique id prefix
        id: String,
    },

    /// Delete a task
    #[command(alias = "delete")]
    Rm {
        /// Task id or unique id prefix
        id: String,
    },

    /// List distinct categories with task counts
    Categories {
        /// Count only tasks matching this search
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show task counts by status and category
    Stats,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = task::GlobalOptions {
            dir: self.dir,
            events: self.events,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Add {
                title,
                description,
                category,
                due,
            } => task::run_add(task::AddOptions {
                title,
                description,
                category,
                due,
                global,
            }),
            Commands::List {
                status,
                category,
                search,
            } => task::run_list(task::ListOptions {
                status,
                category,
                search,
                global,
            }),
            Commands::Search { query } => task::run_search(task::SearchOptions { query, global }),
            Commands::Show { id } => task::run_show(task::ShowOptions { id, global }),
            Commands::Edit {
                id,
                title,
                description,
                clear_description,
                category,
                due,
                clear_due,
                completed,
            } => task::run_edit(task::EditOptions {
                id,
                form: EditForm {
                    title,
                    description,
                    clear_description,
                    category,
                    due_date: due,
                    clear_due_date: clear_due,
                    completed,
                },
                global,
            }),
            Commands::Toggle { id } => task::run_toggle(task::ToggleOptions { id, global }),
            Commands::Rm { id } => task::run_remove(task::RemoveOptions { id, global }),
            Commands::Categories { search } => {
                task::run_categories(task::CategoriesOptions { search, global })
            }
            Commands::Stats => task::run_stats(task::StatsOptions { global }),
        }
    }
}
