//! Concurrent task runner and the persisted task log.
//!
//! Every task gets its own worker and its own execution surface
//! (`<output_dir>/<task_id>.dfy` unless a [`CodePaths`] entry says otherwise),
//! so surfaces never need a cross-task lock. The shared log is the one
//! process-wide aggregate. Test synthesis runs inside each worker; whatever
//! a task's assertions do, the other tasks still finish and get logged.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

use vt_evaluators::{AttemptState, Classification, DiagnosticRecord, ExecutionSurface};
use vt_translate::{synthesize_source, TestProcedure};

use crate::generator::{CodeGenerator, RepairOutcome, RepairResult};
use crate::task::{write_json, CodePaths, Task, TaskFileError, TestSet};

/// Final record for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskLogEntry {
    pub status: AttemptState,
    pub error_messages: Vec<DiagnosticRecord>,
    pub attempts: u32,
    /// Why the task stopped early, when it did not simply run out of attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TaskLogEntry {
    fn from_repair(result: &RepairResult) -> Self {
        let note = match &result.outcome {
            RepairOutcome::Passed | RepairOutcome::RetryBudgetExhausted => None,
            RepairOutcome::CollaboratorExhausted(reason) => {
                Some(format!("collaborator exhausted: {}", reason))
            }
            RepairOutcome::Aborted(reason) => Some(format!("aborted: {}", reason)),
        };
        Self {
            status: result.state,
            error_messages: result.diagnostics.clone(),
            attempts: result.attempts,
            note,
        }
    }

    fn from_classification(classification: Classification) -> Self {
        Self {
            status: classification.state,
            error_messages: classification.diagnostics,
            attempts: 0,
            note: None,
        }
    }

    /// Entry for a task whose worker never produced a result.
    fn unfinished(note: String) -> Self {
        Self {
            status: AttemptState::Translate,
            error_messages: Vec::new(),
            attempts: 0,
            note: Some(note),
        }
    }
}

/// Task id to final record, written once after all tasks finish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TaskLog {
    entries: BTreeMap<String, TaskLogEntry>,
}

impl TaskLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, task_id: impl Into<String>, entry: TaskLogEntry) {
        self.entries.insert(task_id.into(), entry);
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskLogEntry> {
        self.entries.get(task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn save(&self, path: &Path) -> Result<(), TaskFileError> {
        write_json(path, self).await
    }

    pub fn summary(&self) -> LogSummary {
        let mut summary = LogSummary {
            total: self.entries.len(),
            ..Default::default()
        };
        for entry in self.entries.values() {
            if entry.status.syntax_passed() {
                summary.syntax_passed += 1;
            }
            match entry.status {
                AttemptState::Passed => summary.passed += 1,
                AttemptState::Timeout => summary.timeout += 1,
                AttemptState::SemanticError => summary.semantic_failed += 1,
                AttemptState::Translate | AttemptState::SyntaxError => {}
            }
        }
        summary
    }
}

/// Pass-rate counts over a task log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub total: usize,
    pub syntax_passed: usize,
    pub timeout: usize,
    pub semantic_failed: usize,
    pub passed: usize,
}

impl fmt::Display for LogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |n: usize| {
            if self.total == 0 {
                0.0
            } else {
                n as f64 * 100.0 / self.total as f64
            }
        };
        let rows = [
            (self.syntax_passed, "passed syntax test"),
            (self.timeout, "timed out"),
            (self.semantic_failed, "failed semantic test"),
            (self.passed, "passed semantic test"),
        ];
        for (n, label) in rows {
            writeln!(f, "{}/{} ({:.2}%) tasks {}", n, self.total, pct(n), label)?;
        }
        Ok(())
    }
}

/// Runs every task concurrently through a shared [`CodeGenerator`].
pub struct TaskRunner {
    generator: Arc<CodeGenerator>,
    output_dir: PathBuf,
    paths: CodePaths,
    log: Arc<Mutex<TaskLog>>,
}

impl TaskRunner {
    pub fn new(generator: CodeGenerator, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            generator: Arc::new(generator),
            output_dir: output_dir.into(),
            paths: CodePaths::new(),
            log: Arc::new(Mutex::new(TaskLog::new())),
        }
    }

    /// Use explicit candidate locations for the tasks `paths` lists.
    pub fn with_paths(mut self, paths: CodePaths) -> Self {
        self.paths = paths;
        self
    }

    /// Execution surface owned by `task_id`.
    pub fn surface_for(&self, task_id: &str) -> ExecutionSurface {
        match self.paths.get(task_id) {
            Some(path) => ExecutionSurface::new(path),
            None => ExecutionSurface::new(self.output_dir.join(format!("{}.dfy", task_id))),
        }
    }

    /// Repair every task, one worker each. Admission limits inside the
    /// generator bound verifier and collaborator concurrency.
    pub async fn repair_all(&self, tasks: Vec<Task>, tests: &TestSet) -> TaskLog {
        let mut workers = JoinSet::new();
        let mut pending = BTreeSet::new();

        for task in tasks {
            let assertions = tests.assertions(&task.task_id).map(str::to_owned);
            let surface = self.surface_for(&task.task_id);
            let generator = Arc::clone(&self.generator);
            let log = Arc::clone(&self.log);
            pending.insert(task.task_id.clone());

            workers.spawn(async move {
                let procedure = test_procedure(&task.task_id, assertions.as_deref());
                let result = generator
                    .repair(&task.task_id, &task.source_code, &surface, procedure.as_ref())
                    .await;
                log.lock()
                    .await
                    .record(task.task_id, TaskLogEntry::from_repair(&result));
            });
        }

        self.finish(workers, pending).await
    }

    /// Verify existing candidates once against their tests, without
    /// regenerating anything.
    pub async fn evaluate_all(&self, tasks: Vec<Task>, tests: &TestSet) -> TaskLog {
        let mut workers = JoinSet::new();
        let mut pending = BTreeSet::new();

        for task in tasks {
            let assertions = tests.assertions(&task.task_id).map(str::to_owned);
            let surface = self.surface_for(&task.task_id);
            let generator = Arc::clone(&self.generator);
            let log = Arc::clone(&self.log);
            pending.insert(task.task_id.clone());

            workers.spawn(async move {
                let procedure = test_procedure(&task.task_id, assertions.as_deref());
                let entry = match generator.evaluate(&surface, procedure.as_ref()).await {
                    Ok(classification) => TaskLogEntry::from_classification(classification),
                    Err(e) => {
                        warn!(task_id = %task.task_id, error = %e, "evaluation aborted");
                        TaskLogEntry::unfinished(format!("aborted: {}", e))
                    }
                };
                info!(task_id = %task.task_id, state = %entry.status, "task evaluated");
                log.lock().await.record(task.task_id, entry);
            });
        }

        self.finish(workers, pending).await
    }

    /// Join every worker, then fill in any task whose worker died.
    async fn finish(&self, mut workers: JoinSet<()>, pending: BTreeSet<String>) -> TaskLog {
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "task worker failed");
            }
        }

        let mut log = self.log.lock().await;
        for task_id in pending {
            if log.get(&task_id).is_none() {
                log.record(task_id, TaskLogEntry::unfinished("worker failed".to_string()));
            }
        }
        std::mem::take(&mut *log)
    }
}

/// Synthesized test for `task_id`; an untranslatable test counts as none.
fn test_procedure(task_id: &str, assertions: Option<&str>) -> Option<TestProcedure> {
    let assertions = assertions?;
    match synthesize_source(assertions) {
        Ok(procedure) => Some(procedure),
        Err(e) => {
            warn!(task_id, error = %e, "test case not translatable, running without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use vt_evaluators::{Verifier, VerifierError, VerifierExit, VerifierOutcome};

    use super::*;
    use crate::client::{ClientError, Generator};
    use crate::generator::tests::{ScriptedGenerator, ScriptedVerifier};
    use crate::generator::RepairConfig;

    /// Tracks how many calls are in flight and the highest count seen.
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    /// Sleeps through every run, then replays canned exits (default pass).
    struct SlowVerifier {
        gauge: Arc<Gauge>,
        exits: std::sync::Mutex<VecDeque<VerifierExit>>,
        delay: Duration,
    }

    impl SlowVerifier {
        fn new(gauge: Arc<Gauge>, exits: Vec<VerifierExit>) -> Self {
            Self {
                gauge,
                exits: std::sync::Mutex::new(exits.into()),
                delay: Duration::from_millis(20),
            }
        }
    }

    #[async_trait]
    impl Verifier for SlowVerifier {
        async fn verify(&self, _path: &Path) -> Result<VerifierOutcome, VerifierError> {
            self.gauge.enter();
            tokio::time::sleep(self.delay).await;
            self.gauge.exit();
            let exit = self
                .exits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(VerifierExit::Code(0));
            if exit == VerifierExit::TimedOut {
                return Ok(VerifierOutcome::timed_out(self.delay));
            }
            Ok(VerifierOutcome {
                exit,
                stdout: String::new(),
                duration: self.delay,
            })
        }
    }

    /// Sleeps through every call, then returns the same candidate. Panics on
    /// any prompt that mentions `explode`.
    struct SlowGenerator {
        gauge: Arc<Gauge>,
    }

    #[async_trait]
    impl Generator for SlowGenerator {
        async fn complete(&self, prompt: &str) -> Result<String, ClientError> {
            assert!(!prompt.contains("explode"), "collaborator blew up");
            self.gauge.enter();
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.gauge.exit();
            Ok("```dafny\nmethod M() {}\n```".to_string())
        }
    }

    fn slotted_runner(
        dir: &Path,
        generator: SlowGenerator,
        verifier: SlowVerifier,
        verifier_slots: usize,
        generator_slots: usize,
    ) -> TaskRunner {
        let generator = CodeGenerator::new(
            Arc::new(generator),
            Arc::new(verifier),
            RepairConfig {
                max_attempts: 3,
                max_collaborator_retries: 1,
                verifier_slots,
                generator_slots,
            },
        );
        TaskRunner::new(generator, dir)
    }

    fn tasks(ids: &[&str]) -> Vec<Task> {
        ids.iter().map(|id| task(id)).collect()
    }

    fn task(id: &str) -> Task {
        Task {
            task_id: id.to_string(),
            source_code: "def f(x):\n    return x + 1".to_string(),
            entry_name: "f".to_string(),
        }
    }

    fn runner(dir: &Path, gen: ScriptedGenerator, ver: ScriptedVerifier) -> TaskRunner {
        let generator = CodeGenerator::new(
            Arc::new(gen),
            Arc::new(ver),
            RepairConfig {
                max_attempts: 3,
                ..RepairConfig::quick()
            },
        );
        TaskRunner::new(generator, dir)
    }

    #[tokio::test]
    async fn test_repair_all_logs_every_task() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(
            dir.path(),
            ScriptedGenerator::blocks(3),
            ScriptedVerifier::codes(&[0, 0, 0]),
        );
        let mut tests = TestSet::new();
        tests.insert("a", "assert f(1) == 2\n");
        tests.insert("b", "if True:\n    pass\n");

        let log = runner
            .repair_all(vec![task("a"), task("b"), task("c")], &tests)
            .await;

        assert_eq!(log.len(), 3);
        for id in ["a", "b", "c"] {
            assert_eq!(log.get(id).unwrap().status, AttemptState::Passed);
            assert!(dir.path().join(format!("{}.dfy", id)).exists());
        }
        assert_eq!(log.summary().passed, 3);
    }

    #[tokio::test]
    async fn test_failed_task_keeps_last_state() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(
            dir.path(),
            ScriptedGenerator::blocks(3),
            ScriptedVerifier::codes(&[2, 2, 2]),
        );

        let log = runner.repair_all(vec![task("a")], &TestSet::new()).await;

        let entry = log.get("a").unwrap();
        assert_eq!(entry.status, AttemptState::SyntaxError);
        assert_eq!(entry.attempts, 3);
        assert_eq!(entry.error_messages.len(), 1);
        assert_eq!(entry.note, None);
    }

    #[tokio::test]
    async fn test_evaluate_all_verifies_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(
            dir.path(),
            ScriptedGenerator::new(vec![]),
            ScriptedVerifier::codes(&[3]),
        );
        runner
            .surface_for("a")
            .write("method f(x: int) returns (r: int) { r := x; }")
            .await
            .unwrap();
        let mut tests = TestSet::new();
        tests.insert("a", "assert f(1) == 2\n");

        let log = runner.evaluate_all(vec![task("a"), task("missing")], &tests).await;

        assert_eq!(log.get("a").unwrap().status, AttemptState::SemanticError);
        let missing = log.get("missing").unwrap();
        assert_eq!(missing.status, AttemptState::Translate);
        assert!(missing.note.as_deref().unwrap().starts_with("aborted"));
    }

    #[tokio::test]
    async fn test_verifier_runs_never_exceed_slots() {
        let dir = tempfile::tempdir().unwrap();
        let verifier_gauge = Arc::new(Gauge::default());
        let generator_gauge = Arc::new(Gauge::default());
        let runner = slotted_runner(
            dir.path(),
            SlowGenerator {
                gauge: Arc::clone(&generator_gauge),
            },
            SlowVerifier::new(Arc::clone(&verifier_gauge), vec![]),
            1,
            3,
        );

        let log = runner
            .repair_all(tasks(&["a", "b", "c", "d", "e"]), &TestSet::new())
            .await;

        assert_eq!(log.summary().passed, 5);
        assert_eq!(verifier_gauge.peak(), 1);
        // The collaborator pool is not throttled by the single verifier slot.
        assert!(generator_gauge.peak() > 1);
        assert!(generator_gauge.peak() <= 3);
    }

    #[tokio::test]
    async fn test_collaborator_calls_never_exceed_slots() {
        let dir = tempfile::tempdir().unwrap();
        let verifier_gauge = Arc::new(Gauge::default());
        let generator_gauge = Arc::new(Gauge::default());
        let runner = slotted_runner(
            dir.path(),
            SlowGenerator {
                gauge: Arc::clone(&generator_gauge),
            },
            SlowVerifier::new(Arc::clone(&verifier_gauge), vec![]),
            4,
            1,
        );

        let log = runner
            .repair_all(tasks(&["a", "b", "c", "d"]), &TestSet::new())
            .await;

        assert_eq!(log.summary().passed, 4);
        assert_eq!(generator_gauge.peak(), 1);
        assert!(verifier_gauge.peak() <= 4);
    }

    #[tokio::test]
    async fn test_timed_out_run_releases_its_slot() {
        let dir = tempfile::tempdir().unwrap();
        let gauge = Arc::new(Gauge::default());
        let runner = slotted_runner(
            dir.path(),
            SlowGenerator {
                gauge: Arc::new(Gauge::default()),
            },
            SlowVerifier::new(Arc::clone(&gauge), vec![VerifierExit::TimedOut]),
            1,
            2,
        );

        let log = tokio::time::timeout(
            Duration::from_secs(10),
            runner.repair_all(tasks(&["a", "b"]), &TestSet::new()),
        )
        .await
        .expect("a timed-out run must not hold its slot");

        assert_eq!(log.len(), 2);
        assert_eq!(log.summary().passed, 2);
        let attempts: u32 = ["a", "b"].iter().map(|id| log.get(id).unwrap().attempts).sum();
        assert_eq!(attempts, 3);
        assert_eq!(gauge.peak(), 1);
    }

    #[tokio::test]
    async fn test_oversized_test_case_does_not_stop_other_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(
            dir.path(),
            ScriptedGenerator::blocks(2),
            ScriptedVerifier::codes(&[0, 0]),
        );
        let mut tests = TestSet::new();
        tests.insert("a", "assert f(1) == 2\n");
        tests.insert("b", "xs = [0] * 10 ** 18\nassert f(xs) == 1\n");

        let log = runner.repair_all(vec![task("a"), task("b")], &tests).await;

        assert_eq!(log.len(), 2);
        assert_eq!(log.get("a").unwrap().status, AttemptState::Passed);
        // Untranslatable assertions leave the task running without a test.
        assert_eq!(log.get("b").unwrap().status, AttemptState::Passed);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_logged_and_others_finish() {
        let dir = tempfile::tempdir().unwrap();
        let runner = slotted_runner(
            dir.path(),
            SlowGenerator {
                gauge: Arc::new(Gauge::default()),
            },
            SlowVerifier::new(Arc::new(Gauge::default()), vec![]),
            2,
            2,
        );
        let mut doomed = task("b");
        doomed.source_code = "def explode():\n    pass".to_string();

        let log = runner
            .repair_all(vec![task("a"), doomed, task("c")], &TestSet::new())
            .await;

        assert_eq!(log.len(), 3);
        assert_eq!(log.get("a").unwrap().status, AttemptState::Passed);
        assert_eq!(log.get("c").unwrap().status, AttemptState::Passed);
        let failed = log.get("b").unwrap();
        assert_eq!(failed.status, AttemptState::Translate);
        assert_eq!(failed.note.as_deref(), Some("worker failed"));
    }

    #[tokio::test]
    async fn test_code_paths_override_output_location() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = dir.path().join("kept/one.dfy");
        let mut paths = CodePaths::new();
        paths.insert("a", &elsewhere);
        let runner = runner(
            &dir.path().join("out"),
            ScriptedGenerator::new(vec![]),
            ScriptedVerifier::codes(&[0]),
        )
        .with_paths(paths);

        assert_eq!(runner.surface_for("a").path(), elsewhere.as_path());
        assert_eq!(
            runner.surface_for("b").path(),
            dir.path().join("out/b.dfy").as_path()
        );

        runner
            .surface_for("a")
            .write("method f(x: int) returns (r: int) { r := x + 1; }")
            .await
            .unwrap();
        let mut tests = TestSet::new();
        tests.insert("a", "assert f(1) == 2\n");

        let log = runner.evaluate_all(vec![task("a")], &tests).await;

        assert_eq!(log.get("a").unwrap().status, AttemptState::Passed);
        assert!(!dir.path().join("out/a.dfy").exists());
    }

    #[test]
    fn test_summary_counts_and_display() {
        let mut log = TaskLog::new();
        for (id, status) in [
            ("a", AttemptState::Passed),
            ("b", AttemptState::SemanticError),
            ("c", AttemptState::Timeout),
            ("d", AttemptState::SyntaxError),
        ] {
            log.record(
                id,
                TaskLogEntry {
                    status,
                    error_messages: Vec::new(),
                    attempts: 1,
                    note: None,
                },
            );
        }

        let summary = log.summary();
        assert_eq!(summary.syntax_passed, 3);
        assert_eq!(summary.passed, 1);
        assert!(summary
            .to_string()
            .contains("3/4 (75.00%) tasks passed syntax test"));
    }

    #[test]
    fn test_log_serializes_status_names() {
        let mut log = TaskLog::new();
        log.record(
            "t",
            TaskLogEntry {
                status: AttemptState::SyntaxError,
                error_messages: Vec::new(),
                attempts: 2,
                note: None,
            },
        );
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["t"]["status"], "syntax_error");
        assert!(json["t"].get("note").is_none());
    }
}
