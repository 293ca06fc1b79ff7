#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// An isolated data directory for driving the `todos` binary.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.path().join("todos.json")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file("todos.toml", contents)
    }

    pub fn read_snapshot(&self) -> Result<Value, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(self.snapshot_path())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// A `todos` command pointed at this directory via `--dir`.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("todos").expect("binary");
        cmd.env_remove("TODOS_DIR")
            .env_remove("RUST_LOG")
            .arg("--dir")
            .arg(self.path());
        cmd
    }

    /// Run a command with `--json` and return the `data` payload.
    pub fn json(&self, args: &[&str]) -> Result<Value, Box<dyn std::error::Error>> {
        let output = self.cmd().arg("--json").args(args).output()?;
        if !output.status.success() {
            return Err(format!(
                "todos {:?} failed: {}",
                args,
                String::from_utf8_lossy(&output.stdout)
            )
            .into());
        }
        let value: Value = serde_json::from_slice(&output.stdout)?;
        Ok(value["data"].clone())
    }

    /// Add a task and return its id.
    pub fn add(&self, args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        let data = self.json(&full)?;
        data["task"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "missing task id".into())
    }
}
