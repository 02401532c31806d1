//! Reasoning-chain value objects.
//!
//! Everything here is created and consumed within a single run:
//! Question → SubQuestionSet → EvidencePool → Synthesis → Verification → ChainResult.
//! Only the evidence pool is built incrementally, through [`EvidencePoolBuilder`].

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The user's original query. Non-empty, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question(String);

impl Question {
    pub fn new(text: impl Into<String>) -> Result<Self, Error> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::InvalidQuestion("question must be non-empty".into()));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Question {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered, non-empty sub-questions derived from one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestionSet(Vec<String>);

impl SubQuestionSet {
    /// Build from model output, dropping blank entries. Falls back to the
    /// original question as the sole sub-question when nothing is left.
    pub fn from_model_output(question: &Question, items: Vec<String>) -> Self {
        let items: Vec<String> = items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if items.is_empty() {
            return Self(vec![question.as_str().to_string()]);
        }
        Self(items)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a SubQuestionSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Append-only accumulator for an [`EvidencePool`].
#[derive(Debug, Default)]
pub struct EvidencePoolBuilder {
    snippets: Vec<String>,
}

impl EvidencePoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one retrieval result, preserving its internal order.
    pub fn extend(&mut self, snippets: impl IntoIterator<Item = String>) {
        self.snippets.extend(snippets);
    }

    /// Freeze the pool.
    pub fn finish(self) -> EvidencePool {
        EvidencePool {
            snippets: self.snippets,
        }
    }
}

/// Immutable, ordered evidence gathered for one run.
///
/// Snippets are kept in sub-question order, then retriever order.
/// Duplicates are not removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidencePool {
    snippets: Vec<String>,
}

impl EvidencePool {
    pub fn builder() -> EvidencePoolBuilder {
        EvidencePoolBuilder::new()
    }

    pub fn snippets(&self) -> &[String] {
        &self.snippets
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Join all snippets into one context blob.
    pub fn context(&self, separator: &str) -> String {
        self.snippets.join(separator)
    }

    /// The first `max` snippets, by position (not relevance).
    pub fn sources(&self, max: usize) -> Vec<String> {
        self.snippets.iter().take(max).cloned().collect()
    }
}

/// Output of the synthesizer stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    pub reasoning: String,
    pub answer: String,
}

/// Output of the verifier stage. `confidence` is always within [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawVerification")]
pub struct Verification {
    confidence: f64,
    pub issues: Vec<String>,
}

#[derive(Deserialize)]
struct RawVerification {
    confidence: f64,
    #[serde(default)]
    issues: Vec<String>,
}

impl From<RawVerification> for Verification {
    fn from(raw: RawVerification) -> Self {
        Verification::new(raw.confidence, raw.issues)
    }
}

impl Verification {
    /// Clamp `confidence` into [0, 1]. NaN becomes 0.0.
    pub fn new(confidence: f64, issues: Vec<String>) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { confidence, issues }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// The accept-path result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub reasoning: String,
    pub confidence: f64,
    /// At most `max_sources` evidence snippets, in pool order.
    pub sources: Vec<String>,
}

/// A hand-off to a human or the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub question: String,
    pub issues: Vec<String>,
    pub reason: String,
}

/// The terminal output of a run: exactly one per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainResult {
    Answer(Answer),
    Escalation(Escalation),
}

impl ChainResult {
    pub fn as_answer(&self) -> Option<&Answer> {
        match self {
            ChainResult::Answer(a) => Some(a),
            ChainResult::Escalation(_) => None,
        }
    }

    pub fn as_escalation(&self) -> Option<&Escalation> {
        match self {
            ChainResult::Escalation(e) => Some(e),
            ChainResult::Answer(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_rejects_blank_text() {
        assert!(Question::new("   ").is_err());
        assert!(Question::new("").is_err());
        assert_eq!(Question::new("Why?").unwrap().as_str(), "Why?");
    }

    #[test]
    fn sub_questions_fall_back_to_original() {
        let q = Question::new("What is 2+2?").unwrap();
        let set = SubQuestionSet::from_model_output(&q, vec![]);
        assert_eq!(set.as_slice(), ["What is 2+2?"]);

        let set = SubQuestionSet::from_model_output(&q, vec!["  ".into(), "".into()]);
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }

    #[test]
    fn sub_questions_keep_order_and_trim() {
        let q = Question::new("q").unwrap();
        let set = SubQuestionSet::from_model_output(&q, vec![" b ".into(), "a".into()]);
        assert_eq!(set.as_slice(), ["b", "a"]);
    }

    #[test]
    fn evidence_pool_preserves_order_and_duplicates() {
        let mut builder = EvidencePool::builder();
        builder.extend(vec!["x".to_string(), "y".to_string()]);
        builder.extend(vec!["x".to_string()]);
        let pool = builder.finish();
        assert_eq!(pool.snippets(), ["x", "y", "x"]);
        assert_eq!(pool.context(" "), "x y x");
        assert_eq!(pool.sources(2), vec!["x", "y"]);
        assert_eq!(pool.sources(10).len(), 3);
    }

    #[test]
    fn verification_clamps_confidence() {
        assert_eq!(Verification::new(1.4, vec![]).confidence(), 1.0);
        assert_eq!(Verification::new(-0.2, vec![]).confidence(), 0.0);
        assert_eq!(Verification::new(f64::NAN, vec![]).confidence(), 0.0);
        assert_eq!(Verification::new(0.7, vec![]).confidence(), 0.7);
    }

    #[test]
    fn deserialized_verification_is_clamped() {
        let v: Verification = serde_json::from_str(r#"{"confidence": 3.0}"#).unwrap();
        assert_eq!(v.confidence(), 1.0);
        assert!(v.issues.is_empty());
    }

    #[test]
    fn chain_result_serializes_with_kind_tag() {
        let result = ChainResult::Escalation(Escalation {
            question: "q".into(),
            issues: vec!["unsupported".into()],
            reason: "low confidence".into(),
        });
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"kind\":\"escalation\""));
        assert!(result.as_answer().is_none());
    }
}
