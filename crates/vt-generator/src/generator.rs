//! Repair loop: generate, verify, classify, regenerate.
//!
//! Each task runs this loop sequentially. The two admission limits bound
//! concurrent verifier runs and collaborator calls across all tasks; permits
//! are scoped guards, so they are released on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{AcquireError, Semaphore};
use tracing::{debug, info, warn};

use vt_evaluators::{
    evaluate_candidate, AttemptState, Classification, DiagnosticRecord, EvaluateError,
    ExecutionSurface, Verifier,
};
use vt_translate::{library_preamble, TestProcedure};

use crate::client::{ClientError, Generator};
use crate::postprocess::{comment_out_annotations, strip_imports};
use crate::prompt::{extract_code_block, PromptBuilder};

/// Repair-loop configuration.
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Generation attempts per task.
    pub max_attempts: u32,
    /// Collaborator calls per attempt before the task is abandoned.
    pub max_collaborator_retries: u32,
    /// Concurrent verifier runs across all tasks.
    pub verifier_slots: usize,
    /// Concurrent collaborator calls across all tasks.
    pub generator_slots: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_collaborator_retries: 5,
            verifier_slots: num_cpus::get().max(1),
            generator_slots: 5,
        }
    }
}

impl RepairConfig {
    /// Fewer attempts, for trying a dataset out.
    pub fn quick() -> Self {
        Self {
            max_attempts: 2,
            max_collaborator_retries: 2,
            ..Default::default()
        }
    }

    /// More attempts and retries for full runs.
    pub fn thorough() -> Self {
        Self {
            max_attempts: 10,
            max_collaborator_retries: 10,
            ..Default::default()
        }
    }
}

/// Repair-loop failures that end a task early.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("collaborator failed {attempts} times, last error: {last}")]
    CollaboratorExhausted { attempts: u32, last: String },

    #[error("response contained no ```{0} block")]
    NoCodeInResponse(&'static str),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Evaluate(#[from] EvaluateError),

    #[error("execution surface: {0}")]
    Surface(#[from] vt_evaluators::SurfaceError),

    #[error("admission limit closed")]
    SlotsClosed(#[from] AcquireError),
}

/// How a task's repair loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum RepairOutcome {
    Passed,
    RetryBudgetExhausted,
    /// The collaborator never produced a usable candidate.
    CollaboratorExhausted(String),
    /// Surface or verifier infrastructure failed.
    Aborted(String),
}

/// Record of a single attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    /// Attempt number (1-indexed).
    pub attempt: u32,
    /// State the prompt was built for.
    pub prompt_state: AttemptState,
    /// State the verifier outcome classified as.
    pub outcome_state: AttemptState,
    pub diagnostics: Vec<DiagnosticRecord>,
    /// Whether the previous diagnostics were kept for the next attempt.
    pub rolled_back: bool,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Result of repairing one task.
#[derive(Debug, Clone)]
pub struct RepairResult {
    pub task_id: String,
    pub outcome: RepairOutcome,
    /// Last classified state.
    pub state: AttemptState,
    /// Diagnostics that belong to `state`.
    pub diagnostics: Vec<DiagnosticRecord>,
    pub attempts: u32,
    pub duration: Duration,
    pub attempt_history: Vec<AttemptRecord>,
}

impl RepairResult {
    pub fn passed(&self) -> bool {
        self.outcome == RepairOutcome::Passed
    }

    /// Format as a summary string.
    pub fn format_summary(&self) -> String {
        let status = if self.passed() { "PASSED" } else { "FAILED" };
        let mut summary = format!(
            "[{}] {} after {} attempt(s) in {:.2}s\n",
            status,
            self.task_id,
            self.attempts,
            self.duration.as_secs_f64(),
        );
        for record in &self.attempt_history {
            summary.push_str(&format!(
                "  #{}: {} -> {}{}\n",
                record.attempt,
                record.prompt_state,
                record.outcome_state,
                if record.rolled_back { " (rolled back)" } else { "" },
            ));
        }
        if !self.passed() {
            summary.push_str(&format!("  final state: {}\n", self.state));
            for d in &self.diagnostics {
                summary.push_str(&format!("  line {}: {}\n", d.line, d.message));
            }
        }
        summary
    }
}

/// Drives candidates for one task at a time through the repair loop.
pub struct CodeGenerator {
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    config: RepairConfig,
    verifier_slots: Arc<Semaphore>,
    generator_slots: Arc<Semaphore>,
}

/// Loop state carried between attempts.
struct LoopState {
    state: AttemptState,
    code: String,
    diagnostics: Vec<DiagnosticRecord>,
}

impl CodeGenerator {
    pub fn new(
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn Verifier>,
        config: RepairConfig,
    ) -> Self {
        let verifier_slots = Arc::new(Semaphore::new(config.verifier_slots.max(1)));
        let generator_slots = Arc::new(Semaphore::new(config.generator_slots.max(1)));
        Self {
            generator,
            verifier,
            config,
            verifier_slots,
            generator_slots,
        }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// Admission limit for collaborator calls, shared with test generation.
    pub fn generator_slots(&self) -> Arc<Semaphore> {
        Arc::clone(&self.generator_slots)
    }

    pub fn generator(&self) -> Arc<dyn Generator> {
        Arc::clone(&self.generator)
    }

    /// Repair one task until its candidate passes or the budget runs out.
    ///
    /// Without a test procedure only syntax, timeout and pass outcomes are
    /// possible. Never returns an error: infrastructure failures end the
    /// task with [`RepairOutcome::Aborted`] and its last known state.
    pub async fn repair(
        &self,
        task_id: &str,
        source_code: &str,
        surface: &ExecutionSurface,
        test: Option<&TestProcedure>,
    ) -> RepairResult {
        let start = Instant::now();
        let preamble = test.map(TestProcedure::preamble).unwrap_or_else(library_preamble);
        let test_method = test.map(|t| t.method.as_str());

        let mut current = LoopState {
            state: AttemptState::Translate,
            code: source_code.to_string(),
            diagnostics: Vec::new(),
        };
        let mut history = Vec::new();
        let mut attempts = 0;

        info!(task_id, has_test = test.is_some(), "repair started");

        let outcome = loop {
            if attempts >= self.config.max_attempts {
                break RepairOutcome::RetryBudgetExhausted;
            }
            attempts += 1;
            let attempt_start = Instant::now();

            let classification = match self
                .attempt(&current, surface, &preamble, test_method)
                .await
            {
                Ok(c) => c,
                Err(GeneratorError::CollaboratorExhausted { last, .. }) => {
                    warn!(task_id, attempt = attempts, error = %last, "collaborator exhausted");
                    break RepairOutcome::CollaboratorExhausted(last);
                }
                Err(e) => {
                    warn!(task_id, attempt = attempts, error = %e, "attempt aborted");
                    break RepairOutcome::Aborted(e.to_string());
                }
            };

            let prompt_state = current.state;
            let Classification { state, diagnostics } = classification;
            let rolled_back = state == AttemptState::SyntaxError
                && prompt_state == AttemptState::SyntaxError;

            info!(
                task_id,
                attempt = attempts,
                from = %prompt_state,
                state = %state,
                diagnostics = diagnostics.len(),
                rolled_back,
                "attempt classified"
            );

            history.push(AttemptRecord {
                attempt: attempts,
                prompt_state,
                outcome_state: state,
                diagnostics: diagnostics.clone(),
                rolled_back,
                duration: attempt_start.elapsed(),
            });

            if state == AttemptState::Passed {
                current.state = state;
                current.diagnostics = Vec::new();
                break RepairOutcome::Passed;
            }

            if rolled_back {
                continue;
            }

            let written = match surface.read().await {
                Ok(text) => text,
                Err(e) => break RepairOutcome::Aborted(e.to_string()),
            };
            current = LoopState {
                state,
                code: strip_imports(&written),
                diagnostics,
            };
        };

        let result = RepairResult {
            task_id: task_id.to_string(),
            outcome,
            state: current.state,
            diagnostics: current.diagnostics,
            attempts,
            duration: start.elapsed(),
            attempt_history: history,
        };
        info!(
            task_id,
            outcome = ?result.outcome,
            state = %result.state,
            attempts = result.attempts,
            "repair finished"
        );
        result
    }

    /// One generate/write/verify/classify round.
    async fn attempt(
        &self,
        current: &LoopState,
        surface: &ExecutionSurface,
        preamble: &str,
        test_method: Option<&str>,
    ) -> Result<Classification, GeneratorError> {
        let prompt = PromptBuilder::build(current.state, &current.code, &current.diagnostics);
        let candidate = self.request_candidate(&prompt).await?;
        let candidate = comment_out_annotations(&candidate);

        surface.write(&format!("{}\n{}", preamble, candidate)).await?;
        self.verify_slotted(surface, test_method).await
    }

    /// Verify whatever is already on `surface`, once, without regenerating.
    pub async fn evaluate(
        &self,
        surface: &ExecutionSurface,
        test: Option<&TestProcedure>,
    ) -> Result<Classification, GeneratorError> {
        self.verify_slotted(surface, test.map(|t| t.method.as_str()))
            .await
    }

    async fn verify_slotted(
        &self,
        surface: &ExecutionSurface,
        test_method: Option<&str>,
    ) -> Result<Classification, GeneratorError> {
        let _permit = self.verifier_slots.acquire().await?;
        let evaluation = evaluate_candidate(surface, test_method, self.verifier.as_ref()).await?;
        Ok(evaluation.classification)
    }

    /// Ask the collaborator for a fenced `dafny` block, retrying bad responses.
    async fn request_candidate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let mut last = String::from("no attempts made");
        for retry in 1..=self.config.max_collaborator_retries {
            let response = {
                let _permit = self.generator_slots.acquire().await?;
                self.generator.complete(prompt).await
            };
            let error = match response {
                Ok(text) => match extract_code_block(&text, "dafny") {
                    Some(code) => return Ok(code),
                    None => GeneratorError::NoCodeInResponse("dafny"),
                },
                Err(e) => GeneratorError::Client(e),
            };
            debug!(retry, error = %error, "collaborator response rejected");
            last = error.to_string();
        }
        Err(GeneratorError::CollaboratorExhausted {
            attempts: self.config.max_collaborator_retries,
            last,
        })
    }
}
