//! External verifier invocation.
//!
//! The verifier is a separate process. Its exit code is the only outcome
//! signal and its standard output the only diagnostic source; a run that
//! outlives the wall-clock budget is killed and reported as
//! [`VerifierExit::TimedOut`] with no output.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::result::{VerifierExit, VerifierOutcome};

/// Verifier invocation failures (the process never ran).
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("failed to run {program} on {path}: {source}")]
    Spawn {
        program: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that can check a file and report an exit.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, path: &Path) -> Result<VerifierOutcome, VerifierError>;
}

/// Verifier command line and time budget.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the file path.
    pub subcommand: Vec<String>,
    /// Arguments placed after the file path.
    pub flags: Vec<String>,
    /// Wall-clock budget per run.
    pub timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            program: "dafny".to_string(),
            subcommand: vec!["test".to_string()],
            flags: vec!["--no-verify".to_string(), "--standard-libraries".to_string()],
            timeout: Duration::from_secs(180),
        }
    }
}

impl VerifierConfig {
    /// Short budget for smoke runs.
    pub fn quick() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full command line for `path`, for logs.
    pub fn command_line(&self, path: &Path) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.subcommand.iter().cloned());
        parts.push(path.display().to_string());
        parts.extend(self.flags.iter().cloned());
        parts.join(" ")
    }
}

/// Runs the configured verifier as a child process.
#[derive(Debug, Clone, Default)]
pub struct DafnyVerifier {
    config: VerifierConfig,
}

impl DafnyVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }
}

#[async_trait]
impl Verifier for DafnyVerifier {
    async fn verify(&self, path: &Path) -> Result<VerifierOutcome, VerifierError> {
        let start = Instant::now();
        debug!(command = %self.config.command_line(path), "running verifier");

        let result = tokio::time::timeout(
            self.config.timeout,
            Command::new(&self.config.program)
                .args(&self.config.subcommand)
                .arg(path)
                .args(&self.config.flags)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let duration = start.elapsed();

        match result {
            Ok(Ok(output)) => {
                let exit = match output.status.code() {
                    Some(code) => VerifierExit::Code(code),
                    None => VerifierExit::Terminated,
                };
                Ok(VerifierOutcome {
                    exit,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    duration,
                })
            }
            Ok(Err(source)) => Err(VerifierError::Spawn {
                program: self.config.program.clone(),
                path: path.to_path_buf(),
                source,
            }),
            Err(_) => {
                debug!(timeout = ?self.config.timeout, "verifier timed out");
                Ok(VerifierOutcome::timed_out(duration))
            }
        }
    }
}
