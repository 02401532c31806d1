//! Decomposer: one question in, ordered sub-questions out.

use std::sync::Arc;
use std::time::Duration;

use reasonchain_core::chain::{Question, SubQuestionSet};
use reasonchain_core::error::{Result, Stage};
use reasonchain_core::model::{LanguageModel, inputs};
use reasonchain_core::signature::{FieldType, Signature};
use tracing::debug;

use super::{call_model, generation_failed};

pub struct Decomposer {
    model: Arc<dyn LanguageModel>,
    signature: Signature,
    timeout: Option<Duration>,
}

impl Decomposer {
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

    /// `question -> sub_questions: list[str]`
    pub fn signature() -> Signature {
        Signature::new(
            "Break the question into the smaller, self-contained sub-questions that must be \
             researched to answer it. List them in the order they should be looked up. \
             A simple question may need only one.",
        )
        .input("question")
        .output("sub_questions", FieldType::TextList)
    }

    /// Never returns an empty set: a blank decomposition falls back to the
    /// question itself.
    pub async fn decompose(&self, question: &Question) -> Result<SubQuestionSet> {
        let inputs = inputs([("question", question.as_str().to_string())]);

        let items = call_model(self.model.as_ref(), &self.signature, &inputs, self.timeout)
            .await
            .and_then(|outputs| outputs.text_list("sub_questions"))
            .map_err(generation_failed(Stage::Decompose, question.as_str()))?;

        let proposed = items.len();
        let set = SubQuestionSet::from_model_output(question, items);
        debug!(proposed, kept = set.len(), "Question decomposed");
        Ok(set)
    }
}
