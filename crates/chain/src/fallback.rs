//! Reference fallback: hand the rejected question back to the caller.

use async_trait::async_trait;
use reasonchain_core::chain::{ChainResult, Escalation, Question};
use reasonchain_core::error::Result;
use reasonchain_core::fallback::Fallback;
use tracing::info;

/// Escalates every rejected run with the verifier's issues attached.
pub struct EscalateToCaller {
    reason: String,
}

impl EscalateToCaller {
    pub fn new() -> Self {
        Self {
            reason: "Verifier confidence below threshold".into(),
        }
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for EscalateToCaller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fallback for EscalateToCaller {
    fn name(&self) -> &str {
        "escalate_to_caller"
    }

    async fn resolve(&self, question: &Question, issues: &[String]) -> Result<ChainResult> {
        info!(issues = issues.len(), "Escalating question to caller");
        Ok(ChainResult::Escalation(Escalation {
            question: question.as_str().to_string(),
            issues: issues.to_vec(),
            reason: self.reason.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn escalation_carries_question_and_issues() {
        let q = Question::new("Is P equal to NP?").unwrap();
        let issues = vec!["no evidence".to_string(), "speculative".to_string()];

        let result = EscalateToCaller::new().resolve(&q, &issues).await.unwrap();
        let escalation = result.as_escalation().unwrap();
        assert_eq!(escalation.question, "Is P equal to NP?");
        assert_eq!(escalation.issues, issues);
        assert!(escalation.reason.contains("below threshold"));
    }

    #[tokio::test]
    async fn custom_reason() {
        let q = Question::new("q").unwrap();
        let result = EscalateToCaller::with_reason("needs human review")
            .resolve(&q, &[])
            .await
            .unwrap();
        assert_eq!(result.as_escalation().unwrap().reason, "needs human review");
    }
}
