//! Fallback trait: recovery for runs whose answer failed verification.
//!
//! The chain hands over the original question and the verifier's issue list;
//! whatever the fallback returns becomes the run's result verbatim. A fallback
//! may re-enter a chain, ask a different model, or escalate to a human.

use async_trait::async_trait;

use crate::chain::{ChainResult, Question};
use crate::error::Result;

#[async_trait]
pub trait Fallback: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(&self, question: &Question, issues: &[String]) -> Result<ChainResult>;
}
