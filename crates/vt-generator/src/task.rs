//! Task and test-set files.
//!
//! All are JSON objects keyed by task id. Field names from the MBPP-style
//! datasets (`SourceCode`, `EntryName`, `TestCase`, `CodePath`) are accepted
//! as aliases.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Task-file I/O failures.
#[derive(Debug, thiserror::Error)]
pub enum TaskFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TaskRecord {
    #[serde(alias = "SourceCode")]
    source_code: String,
    #[serde(alias = "EntryName")]
    entry_name: String,
}

/// One source program to translate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub task_id: String,
    /// Python source of the function under translation.
    pub source_code: String,
    /// Name of the function the tests call.
    pub entry_name: String,
}

/// Load tasks, ordered by id.
pub async fn load_tasks(path: &Path) -> Result<Vec<Task>, TaskFileError> {
    let records: BTreeMap<String, TaskRecord> = read_json(path).await?;
    Ok(records
        .into_iter()
        .map(|(task_id, record)| Task {
            task_id,
            source_code: record.source_code,
            entry_name: record.entry_name,
        })
        .collect())
}

/// Assertion text for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Python `assert` statements; empty when none could be produced.
    #[serde(alias = "TestCase")]
    pub assertions: String,
}

/// Test cases keyed by task id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestSet {
    cases: BTreeMap<String, TestCase>,
}

impl TestSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(path: &Path) -> Result<Self, TaskFileError> {
        read_json(path).await
    }

    pub async fn save(&self, path: &Path) -> Result<(), TaskFileError> {
        write_json(path, self).await
    }

    /// Assertions for `task_id`, `None` when missing or empty.
    pub fn assertions(&self, task_id: &str) -> Option<&str> {
        self.cases
            .get(task_id)
            .map(|case| case.assertions.as_str())
            .filter(|text| !text.trim().is_empty())
    }

    pub fn insert(&mut self, task_id: impl Into<String>, assertions: impl Into<String>) {
        self.cases.insert(
            task_id.into(),
            TestCase {
                assertions: assertions.into(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Number of tasks with non-empty assertions.
    pub fn populated(&self) -> usize {
        self.cases
            .values()
            .filter(|case| !case.assertions.trim().is_empty())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CodePathRecord {
    #[serde(alias = "CodePath")]
    code_path: PathBuf,
}

/// Candidate file locations keyed by task id.
///
/// Tasks listed here are read from (and written to) their own path instead
/// of `<output_dir>/<task_id>.dfy`. Relative paths resolve against the
/// working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodePaths {
    paths: BTreeMap<String, CodePathRecord>,
}

impl CodePaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(path: &Path) -> Result<Self, TaskFileError> {
        read_json(path).await
    }

    pub fn get(&self, task_id: &str) -> Option<&Path> {
        self.paths.get(task_id).map(|record| record.code_path.as_path())
    }

    pub fn insert(&mut self, task_id: impl Into<String>, path: impl Into<PathBuf>) {
        self.paths.insert(
            task_id.into(),
            CodePathRecord {
                code_path: path.into(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub(crate) async fn read_json<T: for<'de> Deserialize<'de>>(
    path: &Path,
) -> Result<T, TaskFileError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| TaskFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&text).map_err(|source| TaskFileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), TaskFileError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| TaskFileError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let write_err = |source| TaskFileError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, text).await.map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_tasks_accepts_dataset_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"{
                "task_2": {"SourceCode": "def g(): pass", "EntryName": "g"},
                "task_1": {"source_code": "def f(x): return x", "entry_name": "f"}
            }"#,
        )
        .unwrap();

        let tasks = load_tasks(&path).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_id, "task_1");
        assert_eq!(tasks[0].entry_name, "f");
        assert_eq!(tasks[1].source_code, "def g(): pass");
    }

    #[tokio::test]
    async fn test_test_set_roundtrip_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/tests.json");

        let mut tests = TestSet::new();
        tests.insert("a", "assert f(1) == 1\n");
        tests.insert("b", "");
        tests.save(&path).await.unwrap();

        let loaded = TestSet::load(&path).await.unwrap();
        assert_eq!(loaded, tests);
        assert_eq!(loaded.assertions("a"), Some("assert f(1) == 1\n"));
        assert_eq!(loaded.assertions("b"), None);
        assert_eq!(loaded.assertions("c"), None);
        assert_eq!(loaded.populated(), 1);
    }

    #[tokio::test]
    async fn test_code_paths_accept_dataset_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paths.json");
        std::fs::write(
            &path,
            r#"{
                "task_1": {"CodePath": "gen/task_1.dfy"},
                "task_2": {"code_path": "/abs/two.dfy"}
            }"#,
        )
        .unwrap();

        let paths = CodePaths::load(&path).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths.get("task_1"), Some(Path::new("gen/task_1.dfy")));
        assert_eq!(paths.get("task_2"), Some(Path::new("/abs/two.dfy")));
        assert_eq!(paths.get("task_3"), None);
    }

    #[tokio::test]
    async fn test_invalid_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_tasks(&path).await,
            Err(TaskFileError::Json { .. })
        ));
    }
}
