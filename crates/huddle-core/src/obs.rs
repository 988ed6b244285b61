//! Structured observability hooks for the prediction lifecycle.
//!
//! - [`PredictionSpan`] scopes every log line of one `predict` call
//! - `emit_*` functions log the key lifecycle events with stable `event` names

use tracing::{info, warn};
use uuid::Uuid;

/// RAII guard for a prediction-scoped span.
///
/// ```ignore
/// let span = PredictionSpan::new(401);
/// async { /* ... */ }.instrument(span.span().clone()).await;
/// ```
pub struct PredictionSpan {
    span: tracing::Span,
    prediction_id: Uuid,
}

impl PredictionSpan {
    /// Create a span tagged with the game id and a fresh prediction id.
    pub fn new(game_id: i64) -> Self {
        let prediction_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "huddle.predict",
            game_id = game_id,
            prediction_id = %prediction_id
        );
        Self {
            span,
            prediction_id,
        }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn prediction_id(&self) -> Uuid {
        self.prediction_id
    }
}

/// Emit event: prediction dispatched to the registered agents.
pub fn emit_prediction_started(game_id: i64, home_team: &str, away_team: &str, agents: usize) {
    info!(
        event = "prediction.started",
        game_id = game_id,
        home_team = %home_team,
        away_team = %away_team,
        agents = agents,
    );
}

/// Emit event: one agent's outcome settled.
pub fn emit_agent_outcome(agent: &str, status: &str, winner: Option<&str>, confidence: Option<f64>) {
    info!(
        event = "agent.outcome",
        agent = %agent,
        status = %status,
        winner = winner.unwrap_or("-"),
        confidence = confidence.unwrap_or_default(),
    );
}

/// Emit event: consensus computed.
pub fn emit_consensus_reached(game_id: i64, winner: &str, confidence: f64, label: &str, low_confidence: bool) {
    info!(
        event = "consensus.reached",
        game_id = game_id,
        winner = %winner,
        confidence = confidence,
        label = %label,
        low_confidence = low_confidence,
    );
}

/// Emit event: the caller cancelled a prediction in flight.
pub fn emit_prediction_cancelled(game_id: i64) {
    warn!(event = "prediction.cancelled", game_id = game_id);
}

/// Emit event: a retry is scheduled after a failed attempt (warning level).
pub fn emit_retry_scheduled(agent: &str, attempt: u32, delay_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "agent.retry_scheduled",
        agent = %agent,
        attempt = attempt,
        delay_ms = delay_ms,
        error = %error,
    );
}

/// Emit event: an agent confidence outside `[0, 1]` was clamped (warning level).
pub fn emit_confidence_clamped(agent: &str, reported: f64, clamped: f64) {
    warn!(
        event = "agent.confidence_clamped",
        agent = %agent,
        reported = reported,
        clamped = clamped,
    );
}

/// Emit event: a liveness probe finished.
pub fn emit_health_checked(agent: &str, healthy: bool, error: Option<&str>) {
    if healthy {
        info!(event = "health.checked", agent = %agent, healthy = true);
    } else {
        warn!(
            event = "health.checked",
            agent = %agent,
            healthy = false,
            error = error.unwrap_or("unknown"),
        );
    }
}
