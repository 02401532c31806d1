//! The four stages of a reasoning run.
//!
//! Model-backed stages (decompose, synthesize, verify) each declare one
//! [`Signature`] and turn any model failure into a fatal
//! [`Error::Generation`] tagged with the stage and its input. The gatherer
//! never fails: a bad retrieval becomes an omission.

pub mod decomposer;
pub mod gatherer;
pub mod synthesizer;
pub mod verifier;

pub use decomposer::Decomposer;
pub use gatherer::{EvidenceGatherer, Gathered, RetrievalOmission};
pub use synthesizer::Synthesizer;
pub use verifier::Verifier;

use std::time::Duration;

use reasonchain_core::error::{Error, GenerationError, Stage};
use reasonchain_core::model::{Inputs, LanguageModel};
use reasonchain_core::signature::{Outputs, Signature};

use crate::guard::with_timeout;

/// Invoke the model under an optional time budget.
pub(crate) async fn call_model(
    model: &dyn LanguageModel,
    signature: &Signature,
    inputs: &Inputs,
    timeout: Option<Duration>,
) -> Result<Outputs, GenerationError> {
    with_timeout(timeout, model.invoke(signature, inputs), |timeout_ms| {
        GenerationError::Timeout { timeout_ms }
    })
    .await
}

/// Attach stage and input context to a generation failure.
pub(crate) fn generation_failed(stage: Stage, input: &str) -> impl FnOnce(GenerationError) -> Error {
    let input = input.to_string();
    move |source| Error::Generation {
        stage,
        input,
        source,
    }
}
