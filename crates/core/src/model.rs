//! LanguageModel trait: typed, signature-driven model calls.
//!
//! Stages talk to a `LanguageModel`, never to a raw [`Provider`](crate::provider::Provider).
//! Implementations produce raw named outputs; the provided [`LanguageModel::invoke`]
//! validates them against the caller's [`Signature`].

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::GenerationError;
use crate::signature::{Outputs, Signature};

/// Named free-text inputs for one model call.
pub type Inputs = BTreeMap<String, String>;

/// Build an [`Inputs`] map from `(name, value)` pairs.
pub fn inputs<'a>(pairs: impl IntoIterator<Item = (&'a str, String)>) -> Inputs {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for logs.
    fn name(&self) -> &str;

    /// Run the task and return the model's raw named outputs.
    async fn generate(
        &self,
        signature: &Signature,
        inputs: &Inputs,
    ) -> Result<Map<String, Value>, GenerationError>;

    /// Run the task and validate the outputs against the signature.
    async fn invoke(
        &self,
        signature: &Signature,
        inputs: &Inputs,
    ) -> Result<Outputs, GenerationError> {
        let raw = self.generate(signature, inputs).await?;
        signature.validate(raw)
    }
}
