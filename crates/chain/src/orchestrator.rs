//! The orchestrator: sequences the stages and applies the confidence policy.
//!
//! ```text
//! Decomposing → Gathering → Synthesizing → Verifying ─┬─ confidence ≥ threshold → Accepted
//!                                                     └─ otherwise → Escalated (fallback)
//! ```
//!
//! A run is linear and single-pass. Any stage failure other than a
//! retrieval aborts the run with a typed error; nothing is retried unless
//! the caller asks for it through [`ReasoningChain::run_with_retry`]. A
//! failing fallback surfaces as [`Error::Fallback`], never as the stage the
//! fallback itself happened to fail in.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reasonchain_config::{ChainConfig, RetryConfig};
use reasonchain_core::chain::{Answer, ChainResult, Question, Verification};
use reasonchain_core::error::{Error, Result, Stage};
use reasonchain_core::event::{DomainEvent, EventBus};
use reasonchain_core::fallback::Fallback;
use reasonchain_core::model::LanguageModel;
use reasonchain_core::retriever::Retriever;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::guard::check_cancelled;
use crate::stages::{Decomposer, EvidenceGatherer, Synthesizer, Verifier};
use crate::trace::{ChainState, RunTrace};

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Accepted,
    Escalated,
}

/// The outcome of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ChainRun {
    pub state: TerminalState,
    pub result: ChainResult,
    /// The verifier's judgement that decided the branch
    pub verification: Verification,
    pub trace: RunTrace,
}

/// Whole-run retry policy for [`ReasoningChain::run_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_millis(500))
    }
}

/// Decompose, gather, synthesize, verify, then accept or fall back.
///
/// Holds no per-run state, so one instance can serve concurrent runs.
pub struct ReasoningChain {
    decomposer: Decomposer,
    gatherer: EvidenceGatherer,
    synthesizer: Synthesizer,
    verifier: Verifier,
    fallback: Arc<dyn Fallback>,
    confidence_threshold: f64,
    max_sources: usize,
    event_bus: Option<Arc<EventBus>>,
}

impl ReasoningChain {
    /// Create a chain with default policy (threshold 0.7, 5 snippets per
    /// sub-question, 3 sources, no timeouts).
    pub fn new(
        model: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
        fallback: Arc<dyn Fallback>,
    ) -> Self {
        Self {
            decomposer: Decomposer::new(model.clone()),
            gatherer: EvidenceGatherer::new(retriever),
            synthesizer: Synthesizer::new(model.clone()),
            verifier: Verifier::new(model),
            fallback,
            confidence_threshold: 0.7,
            max_sources: 3,
            event_bus: None,
        }
    }

    /// Create a chain with policy taken from configuration.
    ///
    /// The configuration is validated first, so a hand-built `ChainConfig`
    /// gets the same checks as a loaded one.
    pub fn from_config(
        model: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
        fallback: Arc<dyn Fallback>,
        config: &ChainConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(model, retriever, fallback)
            .with_confidence_threshold(config.confidence_threshold)?
            .with_top_k(config.retrieval_top_k)
            .with_max_sources(config.max_sources)
            .with_context_separator(config.context_separator.clone())
            .with_parallel_retrieval(config.parallel_retrieval)
            .with_model_timeout(config.timeouts.model())
            .with_retrieval_timeout(config.timeouts.retrieval()))
    }

    /// Minimum confidence for acceptance (inclusive). Must lie in [0, 1].
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config {
                message: format!("confidence threshold must be between 0.0 and 1.0, got {threshold}"),
            });
        }
        self.confidence_threshold = threshold;
        Ok(self)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.gatherer = self.gatherer.with_top_k(top_k);
        self
    }

    pub fn with_max_sources(mut self, max_sources: usize) -> Self {
        self.max_sources = max_sources;
        self
    }

    pub fn with_context_separator(mut self, separator: impl Into<String>) -> Self {
        self.synthesizer = self.synthesizer.with_separator(separator);
        self
    }

    pub fn with_parallel_retrieval(mut self, parallel: bool) -> Self {
        self.gatherer = self.gatherer.with_parallel(parallel);
        self
    }

    /// Budget for each language model call.
    pub fn with_model_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.decomposer = self.decomposer.with_timeout(timeout);
        self.synthesizer = self.synthesizer.with_timeout(timeout);
        self.verifier = self.verifier.with_timeout(timeout);
        self
    }

    /// Budget for each retriever call.
    pub fn with_retrieval_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.gatherer = self.gatherer.with_timeout(timeout);
        self
    }

    /// Publish run events on the given bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Run the chain once.
    pub async fn run(&self, question: &str) -> Result<ChainRun> {
        self.execute(question, None).await
    }

    /// Run the chain once, stopping at the next stage boundary after
    /// `token` is cancelled.
    pub async fn run_cancellable(&self, question: &str, token: &CancellationToken) -> Result<ChainRun> {
        self.execute(question, Some(token)).await
    }

    /// Re-run the whole chain on retryable failures.
    pub async fn run_with_retry(&self, question: &str, policy: &RetryPolicy) -> Result<ChainRun> {
        self.retry(question, policy, None).await
    }

    /// [`run_with_retry`](Self::run_with_retry) that also honours `token`,
    /// both at stage boundaries and while waiting out a backoff.
    pub async fn run_with_retry_cancellable(
        &self,
        question: &str,
        policy: &RetryPolicy,
        token: &CancellationToken,
    ) -> Result<ChainRun> {
        self.retry(question, policy, Some(token)).await
    }

    async fn retry(
        &self,
        question: &str,
        policy: &RetryPolicy,
        token: Option<&CancellationToken>,
    ) -> Result<ChainRun> {
        let mut attempt = 1;
        loop {
            match self.execute(question, token).await {
                Ok(run) => return Ok(run),
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "Run failed, retrying"
                    );
                    back_off(policy.backoff, token).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute(&self, question: &str, token: Option<&CancellationToken>) -> Result<ChainRun> {
        let question = Question::new(question)?;
        let mut trace = RunTrace::new(&question);
        let run_id = trace.run_id.clone();

        info!(
            run_id = %run_id,
            threshold = self.confidence_threshold,
            "Reasoning run started"
        );
        self.publish(DomainEvent::RunStarted {
            run_id: run_id.clone(),
            question_preview: question.as_str().chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        match self.drive(&question, &mut trace, token).await {
            Ok(run) => Ok(run),
            Err(e) => {
                warn!(run_id = %run_id, stage = ?e.stage(), error = %e, "Reasoning run failed");
                self.publish(DomainEvent::RunFailed {
                    run_id,
                    stage: e.stage(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        question: &Question,
        trace: &mut RunTrace,
        token: Option<&CancellationToken>,
    ) -> Result<ChainRun> {
        // Decompose
        check_cancelled(token, Stage::Decompose)?;
        trace.enter(ChainState::Decomposing);
        let started = Instant::now();
        let sub_questions = self.decomposer.decompose(question).await?;
        trace.sub_questions = sub_questions.as_slice().to_vec();
        self.stage_completed(&trace.run_id, Stage::Decompose, started);

        // Gather
        check_cancelled(token, Stage::Gather)?;
        trace.enter(ChainState::Gathering);
        let started = Instant::now();
        let gathered = self.gatherer.gather(&sub_questions).await;
        for omission in &gathered.omissions {
            self.publish(DomainEvent::RetrievalOmitted {
                run_id: trace.run_id.clone(),
                sub_question: omission.sub_question.clone(),
                error_message: omission.error.clone(),
                timestamp: Utc::now(),
            });
        }
        trace.evidence_count = gathered.pool.len();
        trace.omissions = gathered.omissions;
        let pool = gathered.pool;
        self.stage_completed(&trace.run_id, Stage::Gather, started);

        // Synthesize
        check_cancelled(token, Stage::Synthesize)?;
        trace.enter(ChainState::Synthesizing);
        let started = Instant::now();
        let synthesis = self.synthesizer.synthesize(question, &pool).await?;
        self.stage_completed(&trace.run_id, Stage::Synthesize, started);

        // Verify
        check_cancelled(token, Stage::Verify)?;
        trace.enter(ChainState::Verifying);
        let started = Instant::now();
        let verification = self.verifier.verify(question, &synthesis.answer).await?;
        self.stage_completed(&trace.run_id, Stage::Verify, started);

        let confidence = verification.confidence();

        if confidence >= self.confidence_threshold {
            trace.enter(ChainState::Accepted);
            let answer = Answer {
                answer: synthesis.answer,
                reasoning: synthesis.reasoning,
                confidence,
                sources: pool.sources(self.max_sources),
            };

            info!(
                run_id = %trace.run_id,
                confidence,
                sources = answer.sources.len(),
                "Answer accepted"
            );
            self.publish(DomainEvent::RunAccepted {
                run_id: trace.run_id.clone(),
                confidence,
                sources: answer.sources.len(),
                timestamp: Utc::now(),
            });

            return Ok(ChainRun {
                state: TerminalState::Accepted,
                result: ChainResult::Answer(answer),
                verification,
                trace: trace.clone(),
            });
        }

        check_cancelled(token, Stage::Fallback)?;
        warn!(
            run_id = %trace.run_id,
            confidence,
            threshold = self.confidence_threshold,
            issues = verification.issues.len(),
            fallback = self.fallback.name(),
            "Confidence below threshold, falling back"
        );
        trace.enter(ChainState::Escalated);
        let started = Instant::now();
        let result = self
            .fallback
            .resolve(question, &verification.issues)
            .await
            .map_err(|source| Error::Fallback {
                fallback: self.fallback.name().to_string(),
                source: Box::new(source),
            })?;
        self.stage_completed(&trace.run_id, Stage::Fallback, started);

        info!(run_id = %trace.run_id, summary = %trace.summarize(), "Run escalated");
        self.publish(DomainEvent::RunEscalated {
            run_id: trace.run_id.clone(),
            confidence,
            issues: verification.issues.len(),
            timestamp: Utc::now(),
        });

        Ok(ChainRun {
            state: TerminalState::Escalated,
            result,
            verification,
            trace: trace.clone(),
        })
    }

    fn stage_completed(&self, run_id: &str, stage: Stage, started: Instant) {
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(run_id, stage = %stage, duration_ms, "Stage completed");
        self.publish(DomainEvent::StageCompleted {
            run_id: run_id.to_string(),
            stage,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

/// Sleep out a retry backoff, returning early if `token` is cancelled.
async fn back_off(backoff: Duration, token: Option<&CancellationToken>) -> Result<()> {
    let Some(token) = token else {
        tokio::time::sleep(backoff).await;
        return Ok(());
    };
    match tokio::time::timeout(backoff, token.cancelled()).await {
        Ok(()) => Err(Error::Cancelled {
            before: Stage::Decompose,
        }),
        Err(_elapsed) => Ok(()),
    }
}
