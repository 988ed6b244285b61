//! Error types for agent calls.

use crate::domain::vote::AgentKind;

/// Failures of a single agent call or liveness probe.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("agent {agent} timed out after {timeout_ms}ms")]
    Timeout { agent: AgentKind, timeout_ms: u64 },

    #[error("agent {agent} transport error: {detail}")]
    Transport { agent: AgentKind, detail: String },

    /// The agent answered but broke the response contract.
    #[error("agent {agent} returned an invalid response: {detail}")]
    InvalidResponse { agent: AgentKind, detail: String },

    /// The named winner plays in neither seat of this game.
    #[error("agent {agent} picked '{winner}', who is not in this game")]
    UnknownWinner { agent: AgentKind, winner: String },

    #[error("agent {agent} reports status '{status}'")]
    Unhealthy { agent: AgentKind, status: String },

    #[error("agent {agent} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        agent: AgentKind,
        attempts: u32,
        #[source]
        last: Box<AgentError>,
    },
}

impl AgentError {
    pub fn agent(&self) -> AgentKind {
        match self {
            AgentError::Timeout { agent, .. }
            | AgentError::Transport { agent, .. }
            | AgentError::InvalidResponse { agent, .. }
            | AgentError::UnknownWinner { agent, .. }
            | AgentError::Unhealthy { agent, .. }
            | AgentError::Exhausted { agent, .. } => *agent,
        }
    }

    /// Every failure is retried except a winner outside the game, which the
    /// same agent will report again for the same request.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AgentError::UnknownWinner { .. } | AgentError::Exhausted { .. }
        )
    }
}

/// Result type for agent operations.
pub type AgentResult<T> = std::result::Result<T, AgentError>;
