//! Outcome types shared by the verifier, classifier and repair loop.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Control state of one repair attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    /// Nothing generated yet; the prompt asks for a fresh translation.
    Translate,
    SyntaxError,
    Timeout,
    SemanticError,
    Passed,
}

impl AttemptState {
    /// Stable lowercase name, as persisted in the task log.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Translate => "translate",
            AttemptState::SyntaxError => "syntax_error",
            AttemptState::Timeout => "timeout",
            AttemptState::SemanticError => "semantic_error",
            AttemptState::Passed => "passed",
        }
    }

    /// Whether the candidate at least got past the resolver.
    pub fn syntax_passed(&self) -> bool {
        matches!(
            self,
            AttemptState::Passed | AttemptState::SemanticError | AttemptState::Timeout
        )
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured message recovered from verifier output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    /// 1-based line in the verified file.
    pub line: usize,
    pub column: usize,
    /// Verifier message, rewritten into guidance when a known pattern matched.
    pub message: String,
    /// Offending source line, or the reconstructed failing expectation.
    pub excerpt: String,
}

/// How the verifier process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierExit {
    /// Exited normally with this code.
    Code(i32),
    /// Killed by a signal, no exit code.
    Terminated,
    /// Exceeded the wall-clock budget and was killed.
    TimedOut,
}

impl fmt::Display for VerifierExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifierExit::Code(code) => write!(f, "exit {}", code),
            VerifierExit::Terminated => f.write_str("terminated"),
            VerifierExit::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Raw result of one verifier run.
#[derive(Debug, Clone)]
pub struct VerifierOutcome {
    pub exit: VerifierExit,
    /// Captured standard output; empty after a timeout.
    pub stdout: String,
    pub duration: Duration,
}

impl VerifierOutcome {
    pub fn timed_out(duration: Duration) -> Self {
        Self {
            exit: VerifierExit::TimedOut,
            stdout: String::new(),
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&AttemptState::SemanticError).unwrap();
        assert_eq!(json, "\"semantic_error\"");
        let back: AttemptState = serde_json::from_str("\"syntax_error\"").unwrap();
        assert_eq!(back, AttemptState::SyntaxError);
    }

    #[test]
    fn test_display_matches_serialized_name() {
        for state in [
            AttemptState::Translate,
            AttemptState::SyntaxError,
            AttemptState::Timeout,
            AttemptState::SemanticError,
            AttemptState::Passed,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json.trim_matches('"'), state.to_string());
        }
    }
}
