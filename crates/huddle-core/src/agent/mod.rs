//! Agent clients: one remote predictor behind a timeout and retry loop.
//!
//! - [`PredictionAgent`] — the narrow seam every predictor implements
//! - [`AgentClient`] — wraps an agent with a per-call deadline and [`RetryPolicy`]
//! - [`http::HttpAgent`] — the agent-service HTTP implementation
//!
//! The client applies no fallback itself; the dispatcher decides what an
//! exhausted agent contributes.

pub mod error;
pub mod http;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::request::PredictionRequest;
use crate::domain::vote::{AgentKind, AgentVote};
use crate::metrics::METRICS;
use crate::obs::{emit_confidence_clamped, emit_retry_scheduled};

pub use error::{AgentError, AgentResult};
pub use http::HttpAgent;
pub use retry::{Backoff, RetryPolicy};

/// Default per-call deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for a liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// An agent's answer before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVote {
    #[serde(alias = "predicted_winner")]
    pub winner: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl RawVote {
    pub fn new(winner: impl Into<String>, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            winner: winner.into(),
            confidence,
            reasoning: reasoning.into(),
        }
    }
}

/// A predictor reachable by the orchestrator.
///
/// Implement this to plug in HTTP agents, in-process models, or test stubs.
#[async_trait]
pub trait PredictionAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Ask for one vote. Called once per attempt.
    async fn predict(&self, request: &PredictionRequest) -> AgentResult<RawVote>;

    /// Cheap liveness check.
    async fn probe(&self) -> AgentResult<()>;
}

/// One registered agent with its call deadline and retry policy.
#[derive(Clone)]
pub struct AgentClient {
    agent: Arc<dyn PredictionAgent>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("kind", &self.kind())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl AgentClient {
    pub fn new(agent: Arc<dyn PredictionAgent>) -> Self {
        Self {
            agent,
            timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn kind(&self) -> AgentKind {
        self.agent.kind()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Request a vote, bounding each attempt by `deadline` and retrying
    /// retryable failures per the policy.
    ///
    /// Returns [`AgentError::Exhausted`] carrying the last failure once the
    /// attempts run out, or immediately on a non-retryable failure.
    #[instrument(skip(self, request, deadline), fields(agent = %self.kind(), game_id = request.game_id))]
    pub async fn vote(&self, request: &PredictionRequest, deadline: Duration) -> AgentResult<AgentVote> {
        let agent = self.kind();
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(deadline, self.agent.predict(request)).await {
                Ok(Ok(raw)) => normalize_vote(agent, request, raw),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(AgentError::Timeout {
                    agent,
                    timeout_ms: deadline.as_millis() as u64,
                }),
            };

            let err = match result {
                Ok(vote) => {
                    debug!(attempt, winner = %vote.predicted_winner, "agent voted");
                    return Ok(vote);
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= max_attempts {
                return Err(AgentError::Exhausted {
                    agent,
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.retry.delay_for(attempt);
            emit_retry_scheduled(agent.as_str(), attempt, delay.as_millis() as u64, &err);
            METRICS.inc_retries();
            tokio::time::sleep(delay).await;
        }
    }

    /// Run the agent's liveness probe under its own short deadline.
    pub async fn probe(&self, timeout: Duration) -> AgentResult<()> {
        let agent = self.kind();
        match tokio::time::timeout(timeout, self.agent.probe()).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout {
                agent,
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Check a raw answer against the request and clamp its confidence.
pub fn normalize_vote(
    agent: AgentKind,
    request: &PredictionRequest,
    raw: RawVote,
) -> AgentResult<AgentVote> {
    let winner = request
        .resolve_team(&raw.winner)
        .ok_or_else(|| AgentError::UnknownWinner {
            agent,
            winner: raw.winner.clone(),
        })?
        .to_string();

    if !raw.confidence.is_finite() {
        return Err(AgentError::InvalidResponse {
            agent,
            detail: format!("confidence is not a finite number: {}", raw.confidence),
        });
    }

    let confidence = raw.confidence.clamp(0.0, 1.0);
    let confidence_clamped = confidence != raw.confidence;
    if confidence_clamped {
        emit_confidence_clamped(agent.as_str(), raw.confidence, confidence);
        METRICS.inc_confidence_clamped();
    }

    Ok(AgentVote {
        agent,
        predicted_winner: winner,
        confidence,
        reasoning: raw.reasoning,
        voted_at: Utc::now(),
        confidence_clamped,
    })
}
