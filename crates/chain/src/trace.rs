//! Run trace: the record of one pass through the chain.
//!
//! Captures which states a run visited and when, plus the intermediate
//! artifacts a caller needs to audit a result. A trace is:
//!
//! - **Run-scoped**: created when a question is accepted, never shared
//! - **Serializable**: can be exported to JSON for debugging

use chrono::{DateTime, Utc};
use reasonchain_core::chain::Question;
use serde::{Deserialize, Serialize};

use crate::stages::RetrievalOmission;

/// Where a run is in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    Decomposing,
    Gathering,
    Synthesizing,
    Verifying,
    Accepted,
    Escalated,
}

impl ChainState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChainState::Accepted | ChainState::Escalated)
    }
}

/// Entry into one state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub state: ChainState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    pub run_id: String,
    pub question: String,
    pub started_at: DateTime<Utc>,
    pub transitions: Vec<Transition>,
    pub sub_questions: Vec<String>,
    pub evidence_count: usize,
    pub omissions: Vec<RetrievalOmission>,
}

impl RunTrace {
    pub fn new(question: &Question) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            question: question.as_str().to_string(),
            started_at: Utc::now(),
            transitions: Vec::new(),
            sub_questions: Vec::new(),
            evidence_count: 0,
            omissions: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, state: ChainState) {
        self.transitions.push(Transition {
            state,
            at: Utc::now(),
        });
    }

    /// Visited states, in order.
    pub fn states(&self) -> Vec<ChainState> {
        self.transitions.iter().map(|t| t.state).collect()
    }

    pub fn current(&self) -> Option<ChainState> {
        self.transitions.last().map(|t| t.state)
    }

    /// One-line summary for logs.
    pub fn summarize(&self) -> String {
        let mut parts = vec![format!("{} sub-questions", self.sub_questions.len())];
        parts.push(format!("{} snippets", self.evidence_count));
        if !self.omissions.is_empty() {
            parts.push(format!("{} retrievals omitted", self.omissions.len()));
        }
        if let Some(state) = self.current() {
            parts.push(format!("ended {state:?}"));
        }
        parts.join(". ")
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
