//! Test-case generation.
//!
//! The collaborator proposes argument tuples; a Python interpreter runs the
//! task's own source on them to get expected results. The resulting
//! `assert entry(args) == result` lines are kept only if they synthesize.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use vt_translate::{synthesize_source, TranslateError};

use crate::client::{ClientError, Generator};
use crate::prompt::{extract_code_block, PromptBuilder};
use crate::task::{Task, TestSet};

/// Runs the task source and the proposed inputs, prints the assert lines as
/// a JSON list. Non-tuple inputs are treated as a single argument.
const EXPECTED_OUTPUT_SCRIPT: &str = r#"
import json, sys
job = json.load(sys.stdin)
ns = {}
exec(job["source"], ns)
exec(job["inputs"], ns)
entry = ns[job["entry"]]
lines = []
for i in range(1, job["count"] + 1):
    args = ns["input%d" % i]
    if not isinstance(args, tuple):
        args = (args,)
    call = "%s(%s)" % (job["entry"], ", ".join(repr(a) for a in args))
    lines.append("assert %s == %r" % (call, entry(*args)))
print(json.dumps(lines))
"#;

/// Test-generation settings.
#[derive(Debug, Clone)]
pub struct TestGenConfig {
    /// Input tuples requested per task.
    pub inputs_per_task: usize,
    /// Generation rounds per task before giving up.
    pub max_attempts: u32,
    pub python: String,
    /// Wall-clock limit for one interpreter run.
    pub timeout: Duration,
}

impl Default for TestGenConfig {
    fn default() -> Self {
        Self {
            inputs_per_task: 10,
            max_attempts: 10,
            python: "python3".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Why one generation round failed.
#[derive(Debug, thiserror::Error)]
pub enum TestGenError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("response contained no ```python block")]
    NoInputs,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interpreter exited with {code:?}: {stderr}")]
    Interpreter { code: Option<i32>, stderr: String },

    #[error("interpreter timed out after {0:?}")]
    Timeout(Duration),

    #[error("unreadable interpreter output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("generated assertions do not translate: {0}")]
    Untranslatable(#[from] TranslateError),

    #[error("admission limit closed")]
    SlotsClosed(#[from] AcquireError),

    #[error("no usable test case after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: String },
}

#[derive(Serialize)]
struct ExpectedOutputJob<'a> {
    source: &'a str,
    inputs: &'a str,
    entry: &'a str,
    count: usize,
}

/// Produces Python assertion blocks for tasks.
#[derive(Clone)]
pub struct TestCaseGenerator {
    generator: Arc<dyn Generator>,
    slots: Arc<Semaphore>,
    config: TestGenConfig,
}

impl TestCaseGenerator {
    /// `slots` bounds concurrent collaborator calls; share it with the
    /// repair loop when both run in one process.
    pub fn new(generator: Arc<dyn Generator>, slots: Arc<Semaphore>, config: TestGenConfig) -> Self {
        Self {
            generator,
            slots,
            config,
        }
    }

    /// Assertion text for one task, retrying failed rounds.
    pub async fn generate(&self, task: &Task) -> Result<String, TestGenError> {
        let mut last = String::from("no attempts made");
        for attempt in 1..=self.config.max_attempts {
            match self.generate_once(task).await {
                Ok(assertions) => {
                    info!(task_id = %task.task_id, attempt, "test case generated");
                    return Ok(assertions);
                }
                Err(e @ TestGenError::SlotsClosed(_)) => return Err(e),
                Err(e) => {
                    debug!(task_id = %task.task_id, attempt, error = %e, "test generation round failed");
                    last = e.to_string();
                }
            }
        }
        Err(TestGenError::Exhausted {
            attempts: self.config.max_attempts,
            last,
        })
    }

    async fn generate_once(&self, task: &Task) -> Result<String, TestGenError> {
        let prompt =
            PromptBuilder::build_test_inputs_prompt(&task.source_code, self.config.inputs_per_task);
        let response = {
            let _permit = self.slots.acquire().await?;
            self.generator.complete(&prompt).await?
        };
        let inputs = extract_code_block(&response, "python").ok_or(TestGenError::NoInputs)?;

        let lines = self.expected_outputs(task, &inputs).await?;
        let mut assertions = lines.join("\n");
        assertions.push('\n');

        synthesize_source(&assertions)?;
        Ok(assertions)
    }

    /// Run the interpreter over the proposed inputs.
    async fn expected_outputs(&self, task: &Task, inputs: &str) -> Result<Vec<String>, TestGenError> {
        let job = serde_json::to_vec(&ExpectedOutputJob {
            source: &task.source_code,
            inputs,
            entry: &task.entry_name,
            count: self.config.inputs_per_task,
        })?;

        let spawn_err = |source| TestGenError::Spawn {
            program: self.config.python.clone(),
            source,
        };
        let mut child = Command::new(&self.config.python)
            .arg("-c")
            .arg(EXPECTED_OUTPUT_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&job).await.map_err(spawn_err)?;
        }

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(spawn_err)?,
            Err(_) => return Err(TestGenError::Timeout(self.config.timeout)),
        };

        if !output.status.success() {
            return Err(TestGenError::Interpreter {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Generate for every task concurrently. Tasks that never produce a
    /// usable block get an empty entry.
    pub async fn generate_all(&self, tasks: Vec<Task>) -> TestSet {
        let mut workers = JoinSet::new();
        let mut tests = TestSet::new();

        for task in tasks {
            tests.insert(task.task_id.clone(), "");
            let this = self.clone();
            workers.spawn(async move {
                let result = this.generate(&task).await;
                (task.task_id, result)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((task_id, Ok(assertions))) => tests.insert(task_id, assertions),
                Ok((task_id, Err(e))) => {
                    warn!(task_id = %task_id, error = %e, "no test case generated");
                }
                Err(e) => warn!(error = %e, "test generation worker failed"),
            }
        }

        info!(
            populated = tests.populated(),
            total = tests.len(),
            "test generation finished"
        );
        tests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::tests::ScriptedGenerator;

    fn task() -> Task {
        Task {
            task_id: "t".to_string(),
            source_code: "def add(a, b):\n    return a + b".to_string(),
            entry_name: "add".to_string(),
        }
    }

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn generator(responses: Vec<Result<String, ClientError>>, count: usize) -> TestCaseGenerator {
        TestCaseGenerator::new(
            Arc::new(ScriptedGenerator::new(responses)),
            Arc::new(Semaphore::new(1)),
            TestGenConfig {
                inputs_per_task: count,
                max_attempts: 3,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_missing_python_block_is_retried_then_exhausted() {
        let gen = generator(
            vec![
                Ok("no code".to_string()),
                Ok("```text\ninput1 = (1, 2)\n```".to_string()),
                Err(ClientError::EmptyResponse),
            ],
            1,
        );
        match gen.generate(&task()).await {
            Err(TestGenError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.contains("no choices"));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expected_outputs_come_from_interpreter() {
        if !python_available() {
            return;
        }
        let gen = generator(
            vec![Ok("```python\ninput1 = (1, 2)\ninput2 = (-3, 3)\n```".to_string())],
            2,
        );
        let assertions = gen.generate(&task()).await.unwrap();
        assert_eq!(assertions, "assert add(1, 2) == 3\nassert add(-3, 3) == 0\n");
    }

    #[tokio::test]
    async fn test_single_argument_inputs_are_wrapped() {
        if !python_available() {
            return;
        }
        let task = Task {
            task_id: "sq".to_string(),
            source_code: "def sq(x):\n    return x * x".to_string(),
            entry_name: "sq".to_string(),
        };
        let gen = generator(vec![Ok("```python\ninput1 = 4\n```".to_string())], 1);
        assert_eq!(gen.generate(&task).await.unwrap(), "assert sq(4) == 16\n");
    }

    #[tokio::test]
    async fn test_generate_all_keeps_failed_tasks_empty() {
        if !python_available() {
            return;
        }
        let gen = generator(
            vec![Ok("```python\ninput1 = (1, 2)\n```".to_string())],
            1,
        );
        let mut other = task();
        other.task_id = "u".to_string();

        let tests = gen.generate_all(vec![task(), other]).await;
        assert_eq!(tests.len(), 2);
        assert_eq!(tests.populated(), 1);
    }
}
