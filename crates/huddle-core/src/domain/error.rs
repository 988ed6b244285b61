//! Domain-level error taxonomy for huddle.

use crate::domain::vote::AgentKind;

/// Errors produced while validating a [`PredictionRequest`](crate::PredictionRequest).
///
/// Validation runs before any agent is contacted; these are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("required field is empty: {field}")]
    EmptyField { field: &'static str },

    #[error("home and away team are the same: {team}")]
    SameTeam { team: String },

    #[error("confidence threshold must be within [0, 1], got {value}")]
    ConfidenceThresholdOutOfRange { value: f64 },
}

/// Errors surfaced by the orchestrator facade.
///
/// Agent-level trouble never appears here: it degrades into fallback votes.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("invalid prediction request: {0}")]
    Validation(#[from] ValidationError),

    #[error("prediction cancelled by caller")]
    Cancelled,

    /// The result set handed to the aggregator was empty. Indicates a bug in
    /// the dispatcher, which always emits one outcome per registered agent.
    #[error("aggregation impossible: no agent outcomes for game {game_id}")]
    AggregationImpossible { game_id: i64 },

    #[error("agent {0} registered more than once")]
    DuplicateAgent(AgentKind),

    #[error("no agents registered")]
    NoAgents,

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, PredictError>;
