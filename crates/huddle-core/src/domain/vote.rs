//! Agent identity, votes, and per-agent outcomes for one prediction.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::PredictionRequest;

/// Reasoning attached to every substituted vote.
pub const FALLBACK_REASONING: &str = "agent unavailable — fallback prediction";

/// Confidence given to substituted votes and to the low-information consensus.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// The predictor categories an orchestrator can register.
///
/// Assigned at registration time; aggregation never infers a kind from a
/// free-text agent name.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Statistical,
    Weather,
    Sentiment,
    Market,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Statistical,
        AgentKind::Weather,
        AgentKind::Sentiment,
        AgentKind::Market,
    ];

    /// Human-readable name used in reasoning strings.
    pub fn display_name(self) -> &'static str {
        match self {
            AgentKind::Statistical => "Basic Predictor",
            AgentKind::Weather => "Weather Impact",
            AgentKind::Sentiment => "News Sentiment",
            AgentKind::Market => "Market Intelligence",
        }
    }

    /// Path segment of the agent service's per-agent endpoints.
    pub fn endpoint_slug(self) -> &'static str {
        match self {
            AgentKind::Statistical => "basic",
            AgentKind::Weather => "weather",
            AgentKind::Sentiment => "news",
            AgentKind::Market => "market",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Statistical => "statistical",
            AgentKind::Weather => "weather",
            AgentKind::Sentiment => "sentiment",
            AgentKind::Market => "market",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One agent's normalized answer for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentVote {
    pub agent: AgentKind,
    /// Always one of the request's two team names, in the request's spelling.
    pub predicted_winner: String,
    /// Within `[0.0, 1.0]`.
    pub confidence: f64,
    pub reasoning: String,
    pub voted_at: DateTime<Utc>,
    /// The agent reported a confidence outside `[0, 1]` and it was clamped.
    #[serde(default)]
    pub confidence_clamped: bool,
}

impl AgentVote {
    /// The deterministic vote substituted for an agent that could not answer.
    pub fn fallback(agent: AgentKind, request: &PredictionRequest) -> Self {
        Self {
            agent,
            predicted_winner: request.home_team.clone(),
            confidence: FALLBACK_CONFIDENCE,
            reasoning: FALLBACK_REASONING.to_string(),
            voted_at: Utc::now(),
            confidence_clamped: false,
        }
    }
}

/// Exactly one of these exists per registered agent per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    /// The agent answered.
    Live(AgentVote),
    /// Retries were exhausted; a fallback vote stands in for the agent.
    Fallback { vote: AgentVote, error: String },
    /// The agent was known unhealthy and was not called.
    Excluded { agent: AgentKind },
}

impl AgentOutcome {
    pub fn agent(&self) -> AgentKind {
        match self {
            AgentOutcome::Live(vote) => vote.agent,
            AgentOutcome::Fallback { vote, .. } => vote.agent,
            AgentOutcome::Excluded { agent } => *agent,
        }
    }

    /// The vote representing this agent, if it is represented at all.
    pub fn vote(&self) -> Option<&AgentVote> {
        match self {
            AgentOutcome::Live(vote) | AgentOutcome::Fallback { vote, .. } => Some(vote),
            AgentOutcome::Excluded { .. } => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, AgentOutcome::Live(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AgentOutcome::Fallback { .. })
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, AgentOutcome::Excluded { .. })
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            AgentOutcome::Live(_) => "live",
            AgentOutcome::Fallback { .. } => "fallback",
            AgentOutcome::Excluded { .. } => "excluded",
        }
    }
}

/// Outcomes for one request, in agent registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResultSet {
    game_id: i64,
    outcomes: Vec<AgentOutcome>,
}

impl PartialResultSet {
    pub fn new(game_id: i64, outcomes: Vec<AgentOutcome>) -> Self {
        Self { game_id, outcomes }
    }

    pub fn game_id(&self) -> i64 {
        self.game_id
    }

    pub fn outcomes(&self) -> &[AgentOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Votes from every non-excluded agent, fallbacks included.
    pub fn represented_votes(&self) -> impl Iterator<Item = &AgentVote> {
        self.outcomes.iter().filter_map(AgentOutcome::vote)
    }

    pub fn live_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_live()).count()
    }

    pub fn fallback_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_fallback()).count()
    }

    pub fn excluded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_excluded()).count()
    }
}
