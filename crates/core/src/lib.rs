//! # reasonchain Core
//!
//! Domain types, traits, and error definitions for the reasonchain
//! orchestrator. This crate has **no framework dependencies**: it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (language model, retriever, fallback, raw
//! LLM provider) is a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping backends via configuration
//! - Testing every stage with scripted doubles
//! - Clean dependency graph (all crates depend inward on core)

pub mod chain;
pub mod error;
pub mod event;
pub mod fallback;
pub mod message;
pub mod model;
pub mod provider;
pub mod retriever;
pub mod signature;

// Re-export key types at crate root for ergonomics
pub use chain::{
    Answer, ChainResult, Escalation, EvidencePool, EvidencePoolBuilder, Question, SubQuestionSet,
    Synthesis, Verification,
};
pub use error::{Error, GenerationError, ProviderError, Result, RetrievalError, Stage};
pub use event::{DomainEvent, EventBus};
pub use fallback::Fallback;
pub use message::{Message, Role};
pub use model::{Inputs, LanguageModel};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use retriever::Retriever;
pub use signature::{FieldType, OutputField, Outputs, Signature};
