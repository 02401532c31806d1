//! Evidence gatherer: one retrieval per sub-question, pooled in order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reasonchain_core::chain::{EvidencePool, SubQuestionSet};
use reasonchain_core::error::RetrievalError;
use reasonchain_core::retriever::Retriever;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::guard::with_timeout;

/// A sub-question whose retrieval failed and contributed no evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalOmission {
    /// Position of the sub-question in its set
    pub index: usize,
    pub sub_question: String,
    pub error: String,
    pub timed_out: bool,
}

/// The pooled evidence plus any retrievals that were skipped.
#[derive(Debug, Clone)]
pub struct Gathered {
    pub pool: EvidencePool,
    pub omissions: Vec<RetrievalOmission>,
}

pub struct EvidenceGatherer {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    timeout: Option<Duration>,
    parallel: bool,
}

impl EvidenceGatherer {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            retriever,
            top_k: 5,
            timeout: None,
            parallel: false,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Issue all retrievals concurrently. Pool order is unchanged.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Exactly one retrieval call per sub-question. Never fails.
    pub async fn gather(&self, sub_questions: &SubQuestionSet) -> Gathered {
        let results = if self.parallel {
            join_all(sub_questions.iter().map(|q| self.retrieve_one(q))).await
        } else {
            let mut results = Vec::with_capacity(sub_questions.len());
            for q in sub_questions {
                results.push(self.retrieve_one(q).await);
            }
            results
        };

        let mut builder = EvidencePool::builder();
        let mut omissions = Vec::new();

        for (index, (sub_question, result)) in sub_questions.iter().zip(results).enumerate() {
            match result {
                Ok(snippets) => builder.extend(snippets),
                Err(e) => {
                    warn!(
                        retriever = self.retriever.name(),
                        index,
                        sub_question = %sub_question,
                        error = %e,
                        "Retrieval failed, continuing without its evidence"
                    );
                    omissions.push(RetrievalOmission {
                        index,
                        sub_question: sub_question.clone(),
                        timed_out: matches!(e, RetrievalError::Timeout { .. }),
                        error: e.to_string(),
                    });
                }
            }
        }

        let pool = builder.finish();
        debug!(
            sub_questions = sub_questions.len(),
            snippets = pool.len(),
            omitted = omissions.len(),
            parallel = self.parallel,
            "Evidence gathered"
        );

        Gathered { pool, omissions }
    }

    async fn retrieve_one(&self, query: &str) -> Result<Vec<String>, RetrievalError> {
        let mut snippets = with_timeout(
            self.timeout,
            self.retriever.retrieve(query, self.top_k),
            |timeout_ms| RetrievalError::Timeout { timeout_ms },
        )
        .await?;

        if snippets.len() > self.top_k {
            warn!(
                retriever = self.retriever.name(),
                returned = snippets.len(),
                k = self.top_k,
                "Retriever returned more than k snippets, truncating"
            );
            snippets.truncate(self.top_k);
        }

        Ok(snippets)
    }
}
