//! The reasoning chain: a linear, single-pass pipeline over one question.
//!
//! A run follows **Decompose → Gather → Synthesize → Verify**:
//!
//! 1. **Decompose** the question into ordered sub-questions
//! 2. **Gather** evidence with one retrieval call per sub-question
//! 3. **Synthesize** a reasoning trace and draft answer from the evidence
//! 4. **Verify** the draft, producing a confidence score and open issues
//!
//! If confidence meets the threshold the run is **Accepted** and returns an
//! answer with its leading sources. Otherwise it is **Escalated** and the
//! configured fallback decides the result.

pub mod fallback;
pub mod guard;
pub mod orchestrator;
pub mod stages;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use fallback::EscalateToCaller;
pub use orchestrator::{ChainRun, ReasoningChain, RetryPolicy, TerminalState};
pub use stages::{
    Decomposer, EvidenceGatherer, Gathered, RetrievalOmission, Synthesizer, Verifier,
};
pub use trace::{ChainState, RunTrace, Transition};
