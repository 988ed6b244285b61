//! Concurrent fan-out of one request to every registered agent.
//!
//! [`FanOutDispatcher`] never fails: unhealthy agents become `Excluded`,
//! exhausted agents become `Fallback`, and the result set always holds one
//! outcome per registered agent in registration order.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{instrument, warn};

use crate::agent::{AgentClient, AgentResult};
use crate::domain::request::PredictionRequest;
use crate::domain::vote::{AgentOutcome, AgentVote, PartialResultSet};
use crate::health::HealthMonitor;
use crate::metrics::METRICS;
use crate::obs::emit_agent_outcome;

/// Fans a request out to all healthy agents and collects their outcomes.
pub struct FanOutDispatcher {
    clients: Vec<AgentClient>,
    health: Arc<HealthMonitor>,
    call_timeout: Option<Duration>,
}

impl FanOutDispatcher {
    pub fn new(clients: Vec<AgentClient>, health: Arc<HealthMonitor>) -> Self {
        Self {
            clients,
            health,
            call_timeout: None,
        }
    }

    /// Use one deadline for every agent instead of each client's own.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn agent_count(&self) -> usize {
        self.clients.len()
    }

    /// Call every healthy agent concurrently and wait for all of them to settle.
    ///
    /// Slow agents are not cut short; each call is bounded only by its own
    /// timeout and retry policy. Dropping the returned future aborts the
    /// calls still in flight.
    #[instrument(skip(self, request), fields(game_id = request.game_id))]
    pub async fn dispatch(&self, request: Arc<PredictionRequest>) -> PartialResultSet {
        let mut slots: Vec<Option<AgentOutcome>> = vec![None; self.clients.len()];
        let mut join_set = JoinSet::new();

        for (idx, client) in self.clients.iter().enumerate() {
            let agent = client.kind();
            if !self.health.is_healthy(agent) {
                METRICS.inc_excluded();
                slots[idx] = Some(AgentOutcome::Excluded { agent });
                continue;
            }

            let client = client.clone();
            let request = Arc::clone(&request);
            let deadline = self.call_timeout.unwrap_or_else(|| client.timeout());
            join_set.spawn(async move {
                let result = client.vote(&request, deadline).await;
                (idx, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, result)) => {
                    slots[idx] = Some(self.settle(idx, result, &request));
                }
                // The slot stays empty and is filled with a fallback below.
                Err(e) => warn!(error = %e, "agent task failed to join"),
            }
        }

        let outcomes: Vec<AgentOutcome> = slots
            .into_iter()
            .zip(&self.clients)
            .map(|(slot, client)| {
                slot.unwrap_or_else(|| {
                    METRICS.inc_fallbacks();
                    AgentOutcome::Fallback {
                        vote: AgentVote::fallback(client.kind(), &request),
                        error: "agent task aborted before settling".to_string(),
                    }
                })
            })
            .collect();

        for outcome in &outcomes {
            let vote = outcome.vote();
            emit_agent_outcome(
                outcome.agent().as_str(),
                outcome.status_str(),
                vote.map(|v| v.predicted_winner.as_str()),
                vote.map(|v| v.confidence),
            );
        }

        PartialResultSet::new(request.game_id, outcomes)
    }

    fn settle(
        &self,
        idx: usize,
        result: AgentResult<AgentVote>,
        request: &PredictionRequest,
    ) -> AgentOutcome {
        match result {
            Ok(vote) => AgentOutcome::Live(vote),
            Err(err) => {
                let agent = self.clients[idx].kind();
                warn!(agent = %agent, error = %err, "agent exhausted; substituting fallback vote");
                METRICS.inc_fallbacks();
                AgentOutcome::Fallback {
                    vote: AgentVote::fallback(agent, request),
                    error: err.to_string(),
                }
            }
        }
    }
}
