//! # vt-evaluators
//!
//! Runs candidate programs through the external verifier and turns what it
//! reports into repair-loop states.
//!
//! | Exit | State | Diagnostics |
//! |------|-------|-------------|
//! | 0 | `Passed` | none |
//! | 2 | `SyntaxError` | every position marker, humanized |
//! | 3 | `SemanticError` | the first failing expectation, reconstructed |
//! | timeout | `Timeout` | none |
//! | other | `SyntaxError` | none |

pub mod classify;
pub mod evaluate;
pub mod result;
pub mod surface;
pub mod verifier;

pub use classify::{classify, humanize, Classification, HUMANIZE_TABLE};
pub use evaluate::{evaluate_candidate, EvaluateError, Evaluation};
pub use result::{AttemptState, DiagnosticRecord, VerifierExit, VerifierOutcome};
pub use surface::{AppendedTest, ExecutionSurface, SurfaceError};
pub use verifier::{DafnyVerifier, Verifier, VerifierConfig, VerifierError};
