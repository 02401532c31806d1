//! Error types for the reasoning chain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external boundary has its own error enum; the top-level [`Error`]
//! carries enough context (stage and input) for a caller to retry a run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One discrete step of a reasoning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decompose,
    Gather,
    Synthesize,
    Verify,
    Fallback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decompose => "decompose",
            Stage::Gather => "gather",
            Stage::Synthesize => "synthesize",
            Stage::Verify => "verify",
            Stage::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The top-level error type for a reasoning run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    /// A language-model stage could not produce a well-typed output.
    #[error("Generation failed in {stage} stage (input: {input:?}): {source}")]
    Generation {
        stage: Stage,
        input: String,
        #[source]
        source: GenerationError,
    },

    #[error("Run cancelled before {before} stage")]
    Cancelled { before: Stage },

    /// The fallback itself failed. Whatever stage the inner failure names,
    /// the outer run had already reached its escalated branch.
    #[error("Fallback '{fallback}' failed: {source}")]
    Fallback {
        fallback: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// The stage the failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Generation { stage, .. } => Some(*stage),
            Error::Cancelled { before } => Some(*before),
            Error::Fallback { .. } => Some(Stage::Fallback),
            _ => None,
        }
    }

    /// Whether an external call exceeded its time budget.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Generation {
                source: GenerationError::Timeout { .. },
                ..
            }
        )
    }

    /// Whether re-running the whole chain may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Generation { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Boundary errors ---

/// GenerationFailure: the language model could not satisfy a signature.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Unparseable model output: {0}")]
    Unparseable(String),

    #[error("Missing output field: {0}")]
    MissingField(String),

    #[error("Output field '{field}' has wrong type: expected {expected}, found {found}")]
    WrongType {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Provider(ProviderError::AuthenticationFailed(_))
            | GenerationError::Provider(ProviderError::NotConfigured(_))
            | GenerationError::Provider(ProviderError::ModelNotFound(_)) => false,
            _ => true,
        }
    }
}

/// RetrievalFailure: one retriever call failed.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retriever backend error: {0}")]
    Backend(String),

    #[error("Retrieval timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Raw LLM backend errors.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}
