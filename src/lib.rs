//! todos - Local Task List Library
//!
//! This library provides the task store behind the todos CLI: an ordered
//! collection of tasks that is written through to a key-value slot as a
//! single JSON snapshot after every change.
//!
//! # Core Concepts
//!
//! - **Task Store**: the authoritative newest-first collection, with
//!   create/update/delete/toggle and derived views by status, search and category
//! - **Persistence**: whole-collection snapshots under one key, loaded once
//! - **Views**: caller-owned composition of filters, counts and overdue checks
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `todos.toml`
//! - `error`: Error types and result aliases
//! - `events`: JSONL change events for integrations
//! - `form`: Input validation before tasks reach the store
//! - `lock`: File locking and atomic writes
//! - `output`: Human and JSON command output
//! - `persist`: Snapshot persistence adapter
//! - `storage`: Key-value slot backends (file, memory)
//! - `task`: Task model and store
//! - `view`: Filter composition, counts and overdue detection

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod form;
pub mod lock;
pub mod output;
pub mod persist;
pub mod storage;
pub mod task;
pub mod view;

pub use error::{Error, Result};
