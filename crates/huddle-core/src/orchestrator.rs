//! The single entry point: validate, fan out, aggregate.
//!
//! ```rust,ignore
//! let orchestrator = Orchestrator::from_config(&OrchestratorConfig::from_env()?)?;
//! let consensus = orchestrator.predict(request).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::agent::{AgentClient, DEFAULT_PROBE_TIMEOUT};
use crate::aggregate::ConsensusAggregator;
use crate::config::{ConfigError, OrchestratorConfig};
use crate::dispatch::FanOutDispatcher;
use crate::domain::consensus::ConsensusResult;
use crate::domain::error::{PredictError, Result};
use crate::domain::request::PredictionRequest;
use crate::domain::vote::AgentKind;
use crate::health::{HealthMonitor, HealthReport};
use crate::metrics::METRICS;
use crate::obs::{
    emit_consensus_reached, emit_prediction_cancelled, emit_prediction_started, PredictionSpan,
};

/// Builder for [`Orchestrator`].
#[derive(Debug, Default)]
pub struct OrchestratorBuilder {
    clients: Vec<AgentClient>,
    probe_timeout: Option<Duration>,
    call_timeout: Option<Duration>,
    aggregator: Option<ConsensusAggregator>,
}

impl OrchestratorBuilder {
    /// Register an agent. Registration order is the order of outcomes and insights.
    pub fn register(mut self, client: AgentClient) -> Self {
        self.clients.push(client);
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// One deadline for every agent call, overriding per-client timeouts.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn aggregator(mut self, aggregator: ConsensusAggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        if self.clients.is_empty() {
            return Err(PredictError::NoAgents);
        }
        let mut seen = HashSet::new();
        for client in &self.clients {
            if !seen.insert(client.kind()) {
                return Err(PredictError::DuplicateAgent(client.kind()));
            }
        }

        let health = Arc::new(
            HealthMonitor::new(self.clients.clone())
                .with_probe_timeout(self.probe_timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT)),
        );
        let mut dispatcher = FanOutDispatcher::new(self.clients.clone(), Arc::clone(&health));
        if let Some(timeout) = self.call_timeout {
            dispatcher = dispatcher.with_call_timeout(timeout);
        }

        Ok(Orchestrator {
            agents: self.clients.iter().map(AgentClient::kind).collect(),
            dispatcher,
            aggregator: self.aggregator.unwrap_or_default(),
            health,
        })
    }
}

/// Polls every registered agent and returns one consensus answer.
pub struct Orchestrator {
    agents: Vec<AgentKind>,
    dispatcher: FanOutDispatcher,
    aggregator: ConsensusAggregator,
    health: Arc<HealthMonitor>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Build HTTP-backed agents from configuration.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Self::builder().probe_timeout(config.health.probe_timeout());
        for endpoint in &config.agents {
            let client = endpoint
                .build_client()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            builder = builder.register(client);
        }
        builder.build()
    }

    /// Registered agents in registration order.
    pub fn agents(&self) -> &[AgentKind] {
        &self.agents
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Predict without a cancellation signal.
    pub async fn predict(&self, request: PredictionRequest) -> Result<ConsensusResult> {
        self.predict_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Predict the winner of `request`.
    ///
    /// Fails only when the request is invalid or `cancel` fires first. On
    /// cancellation the agent calls still in flight are abandoned and no
    /// consensus is produced.
    pub async fn predict_with_cancel(
        &self,
        request: PredictionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConsensusResult> {
        request.validate()?;
        if cancel.is_cancelled() {
            emit_prediction_cancelled(request.game_id);
            return Err(PredictError::Cancelled);
        }

        let span = PredictionSpan::new(request.game_id);
        let request = Arc::new(request);

        async {
            emit_prediction_started(
                request.game_id,
                &request.home_team,
                &request.away_team,
                self.agents.len(),
            );

            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    emit_prediction_cancelled(request.game_id);
                    return Err(PredictError::Cancelled);
                }
                results = self.dispatcher.dispatch(Arc::clone(&request)) => results,
            };

            let consensus = self.aggregator.aggregate(&request, &results)?;
            METRICS.inc_predictions();
            emit_consensus_reached(
                consensus.game_id,
                &consensus.overall_winner,
                consensus.overall_confidence,
                &consensus.consensus_label,
                consensus.low_confidence,
            );
            Ok(consensus)
        }
        .instrument(span.span().clone())
        .await
    }

    /// Probe every agent now.
    pub async fn check_health(&self) -> HealthReport {
        self.health.check_all().await
    }

    /// Re-probe agents every `interval` until `cancel` fires.
    pub fn spawn_health_monitor(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        Arc::clone(&self.health).spawn_periodic(interval, cancel)
    }
}
