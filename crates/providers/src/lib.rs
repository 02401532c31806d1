//! LLM backends for reasonchain.
//!
//! Raw chat backends implement `reasonchain_core::Provider`; the
//! [`StructuredModel`] turns any provider into a signature-validating
//! `LanguageModel` that the chain stages can call.

pub mod openai_compat;
pub mod router;
pub mod structured;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_provider;
pub use structured::StructuredModel;
