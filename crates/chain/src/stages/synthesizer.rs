//! Synthesizer: evidence and question in, reasoning and draft answer out.

use std::sync::Arc;
use std::time::Duration;

use reasonchain_core::chain::{EvidencePool, Question, Synthesis};
use reasonchain_core::error::{Result, Stage};
use reasonchain_core::model::{LanguageModel, inputs};
use reasonchain_core::signature::{FieldType, Signature};
use tracing::debug;

use super::{call_model, generation_failed};

pub struct Synthesizer {
    model: Arc<dyn LanguageModel>,
    signature: Signature,
    separator: String,
    timeout: Option<Duration>,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            signature: Self::signature(),
            separator: " ".into(),
            timeout: None,
        }
    }

    /// String placed between snippets when building the context.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `context, question -> reasoning, answer`
    pub fn signature() -> Signature {
        Signature::new(
            "Answer the question using the context. First reason step by step about what \
             the context establishes, then give a concise final answer.",
        )
        .input("context")
        .input("question")
        .output("reasoning", FieldType::Text)
        .output("answer", FieldType::Text)
    }

    pub async fn synthesize(&self, question: &Question, evidence: &EvidencePool) -> Result<Synthesis> {
        let context = evidence.context(&self.separator);
        let inputs = inputs([
            ("context", context),
            ("question", question.as_str().to_string()),
        ]);

        let outputs = call_model(self.model.as_ref(), &self.signature, &inputs, self.timeout)
            .await
            .map_err(generation_failed(Stage::Synthesize, question.as_str()))?;

        let synthesis = outputs
            .text("reasoning")
            .and_then(|reasoning| {
                Ok(Synthesis {
                    reasoning,
                    answer: outputs.text("answer")?,
                })
            })
            .map_err(generation_failed(Stage::Synthesize, question.as_str()))?;

        debug!(
            snippets = evidence.len(),
            answer_len = synthesis.answer.len(),
            "Draft answer synthesized"
        );
        Ok(synthesis)
    }
}
