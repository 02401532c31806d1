//! Verifier: scores a draft answer and lists what is still wrong with it.

use std::sync::Arc;
use std::time::Duration;

use reasonchain_core::chain::{Question, Verification};
use reasonchain_core::error::{Result, Stage};
use reasonchain_core::model::{LanguageModel, inputs};
use reasonchain_core::signature::{FieldType, Signature};
use tracing::{debug, warn};

use super::{call_model, generation_failed};

pub struct Verifier {
    model: Arc<dyn LanguageModel>,
    signature: Signature,
    timeout: Option<Duration>,
}

impl Verifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            signature: Self::signature(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `question, answer -> confidence: float, issues?: list[str]`
    ///
    /// A reply with no issue list, or a null one, reads as "no issues".
    pub fn signature() -> Signature {
        Signature::new(
            "Judge whether the answer correctly and completely addresses the question. \
             Give a confidence between 0 and 1 and list any remaining issues.",
        )
        .input("question")
        .input("answer")
        .output("confidence", FieldType::Float)
        .optional_output("issues", FieldType::TextList)
    }

    /// Confidence outside [0, 1] is clamped, not rejected.
    pub async fn verify(&self, question: &Question, answer: &str) -> Result<Verification> {
        let inputs = inputs([
            ("question", question.as_str().to_string()),
            ("answer", answer.to_string()),
        ]);

        let outputs = call_model(self.model.as_ref(), &self.signature, &inputs, self.timeout)
            .await
            .map_err(generation_failed(Stage::Verify, question.as_str()))?;

        let (raw, issues) = outputs
            .float("confidence")
            .and_then(|raw| Ok((raw, outputs.text_list("issues")?)))
            .map_err(generation_failed(Stage::Verify, question.as_str()))?;

        if !(0.0..=1.0).contains(&raw) {
            warn!(raw_confidence = raw, "Verifier confidence out of range, clamping");
        }

        let verification = Verification::new(raw, issues);
        debug!(
            confidence = verification.confidence(),
            issues = verification.issues.len(),
            "Answer verified"
        );
        Ok(verification)
    }
}
