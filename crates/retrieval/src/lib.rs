//! Retriever implementations for reasonchain.
//!
//! All retrievers implement `reasonchain_core::Retriever`. Production
//! deployments plug in their own search backend; the in-memory retriever
//! here serves tests, demos, and small static corpora.

pub mod in_memory;

pub use in_memory::InMemoryRetriever;
