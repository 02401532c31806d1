//! Shared scripted doubles for stage and orchestrator tests.

use async_trait::async_trait;
use reasonchain_core::chain::{ChainResult, Escalation, Question};
use reasonchain_core::error::{Error, GenerationError, ProviderError, RetrievalError, Stage};
use reasonchain_core::fallback::Fallback;
use reasonchain_core::model::{Inputs, LanguageModel};
use reasonchain_core::retriever::Retriever;
use reasonchain_core::signature::Signature;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A language model that answers from a script keyed by the signature's
/// first output field (`sub_questions`, `reasoning`, `confidence`).
///
/// Each key holds a queue of replies; the last reply repeats once the
/// queue is drained. Panics when asked for a key with no script.
pub struct ScriptedModel {
    replies: Mutex<HashMap<String, Vec<Result<Map<String, Value>, GenerationError>>>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<(String, Inputs)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply to `key` with a JSON object.
    pub fn on(self, key: &str, reply: Value) -> Self {
        let map = match reply {
            Value::Object(map) => map,
            other => panic!("ScriptedModel: reply for {key} must be an object, got {other}"),
        };
        self.push(key, Ok(map));
        self
    }

    /// Fail calls for `key`.
    pub fn fail_on(self, key: &str, error: GenerationError) -> Self {
        self.push(key, Err(error));
        self
    }

    /// Sleep before answering `key`.
    pub fn delay_on(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    /// Standard decompose → synthesize → verify script.
    pub fn happy(sub_questions: &[&str], answer: &str, confidence: f64) -> Self {
        Self::new()
            .on("sub_questions", serde_json::json!({ "sub_questions": sub_questions }))
            .on(
                "reasoning",
                serde_json::json!({ "reasoning": "Worked it out from the evidence.", "answer": answer }),
            )
            .on(
                "confidence",
                serde_json::json!({ "confidence": confidence, "issues": ["minor gap"] }),
            )
    }

    fn push(&self, key: &str, reply: Result<Map<String, Value>, GenerationError>) {
        self.replies
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push(reply);
    }

    /// Inputs of every call made for `key`, in order.
    pub fn calls_for(&self, key: &str) -> Vec<Inputs> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, inputs)| inputs.clone())
            .collect()
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.calls_for(key).len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        signature: &Signature,
        inputs: &Inputs,
    ) -> Result<Map<String, Value>, GenerationError> {
        let key = signature
            .outputs
            .first()
            .map(|f| f.name.clone())
            .unwrap_or_default();

        self.calls
            .lock()
            .unwrap()
            .push((key.clone(), inputs.clone()));

        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(&key)
            .unwrap_or_else(|| panic!("ScriptedModel: no reply scripted for '{key}'"));
        if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        }
    }
}

/// A retriever with per-query scripted results.
///
/// Unscripted queries return no snippets. Results are returned as scripted,
/// even when longer than `k`.
pub struct ScriptedRetriever {
    results: HashMap<String, Result<Vec<String>, RetrievalError>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedRetriever {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, query: &str, snippets: &[&str]) -> Self {
        self.results.insert(
            query.to_string(),
            Ok(snippets.iter().map(|s| s.to_string()).collect()),
        );
        self
    }

    pub fn failing(mut self, query: &str, error: RetrievalError) -> Self {
        self.results.insert(query.to_string(), Err(error));
        self
    }

    pub fn delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    /// `(query, k)` for every call, in call order.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        self.calls.lock().unwrap().push((query.to_string(), k));
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        self.results.get(query).cloned().unwrap_or(Ok(Vec::new()))
    }
}

/// A fallback that records what it was handed and returns a fixed result.
pub struct RecordingFallback {
    result: Option<ChainResult>,
    seen: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingFallback {
    /// Escalate with reason `"recorded"`.
    pub fn new() -> Self {
        Self {
            result: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(result: ChainResult) -> Self {
        Self {
            result: Some(result),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// `(question, issues)` for every call.
    pub fn seen(&self) -> Vec<(String, Vec<String>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fallback for RecordingFallback {
    fn name(&self) -> &str {
        "recording"
    }

    async fn resolve(&self, question: &Question, issues: &[String]) -> Result<ChainResult, Error> {
        self.seen
            .lock()
            .unwrap()
            .push((question.as_str().to_string(), issues.to_vec()));

        Ok(self.result.clone().unwrap_or_else(|| {
            ChainResult::Escalation(Escalation {
                question: question.as_str().to_string(),
                issues: issues.to_vec(),
                reason: "recorded".into(),
            })
        }))
    }
}

/// A fallback whose own model call fails mid-way through decomposing.
pub struct FailingFallback {
    calls: Mutex<usize>,
}

impl FailingFallback {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Fallback for FailingFallback {
    fn name(&self) -> &str {
        "failing"
    }

    async fn resolve(&self, question: &Question, _issues: &[String]) -> Result<ChainResult, Error> {
        *self.calls.lock().unwrap() += 1;
        Err(Error::Generation {
            stage: Stage::Decompose,
            input: question.as_str().to_string(),
            source: ProviderError::Network("connection reset".into()).into(),
        })
    }
}
