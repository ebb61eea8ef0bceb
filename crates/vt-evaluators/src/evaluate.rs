//! One verification round against an execution surface.

use tracing::{debug, warn};

use crate::classify::{classify, Classification};
use crate::result::VerifierOutcome;
use crate::surface::{ExecutionSurface, SurfaceError};
use crate::verifier::{Verifier, VerifierError};

/// Failures that prevent a round from producing a classification.
#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Verifier(#[from] VerifierError),
}

/// Classified result of one round plus the raw verifier outcome.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub classification: Classification,
    pub outcome: VerifierOutcome,
}

/// Append `test` (if any), run the verifier, restore the surface, classify.
///
/// The surface is restored on every path, including verifier failures.
pub async fn evaluate_candidate(
    surface: &ExecutionSurface,
    test: Option<&str>,
    verifier: &dyn Verifier,
) -> Result<Evaluation, EvaluateError> {
    let (outcome, verified) = match test {
        Some(test) => {
            let guard = surface.append_test(test).await?;
            let outcome = verifier.verify(surface.path()).await;
            let verified = guard.combined().to_string();
            if let Err(e) = guard.restore().await {
                warn!(error = %e, "async restore failed, relying on drop fallback");
            }
            (outcome?, verified)
        }
        None => {
            let verified = surface.read().await?;
            (verifier.verify(surface.path()).await?, verified)
        }
    };

    let classification = classify(outcome.exit, &outcome.stdout, &verified);
    debug!(
        path = %surface.path().display(),
        exit = %outcome.exit,
        state = %classification.state,
        diagnostics = classification.diagnostics.len(),
        "candidate evaluated"
    );

    Ok(Evaluation {
        classification,
        outcome,
    })
}
