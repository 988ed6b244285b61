//! The orchestrator's externally visible answer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::vote::{AgentKind, AgentOutcome};

/// How an agent is represented in the consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    Live,
    Fallback,
    Excluded,
}

/// How broadly the registered agents back the overall winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStrength {
    /// Every registered agent is aligned.
    Unanimous,
    /// Strictly more than half of the registered agents are aligned.
    Majority,
    Split,
}

impl ConsensusStrength {
    pub fn classify(aligned: usize, total: usize) -> Self {
        if total > 0 && aligned == total {
            ConsensusStrength::Unanimous
        } else if aligned * 2 > total {
            ConsensusStrength::Majority
        } else {
            ConsensusStrength::Split
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            ConsensusStrength::Unanimous => "Unanimous decision",
            ConsensusStrength::Majority => "Strong majority",
            ConsensusStrength::Split => "Split decision",
        }
    }
}

impl fmt::Display for ConsensusStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.headline())
    }
}

/// One agent's contribution as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInsight {
    pub agent: AgentKind,
    pub agent_name: String,
    pub status: InsightStatus,
    pub predicted_winner: Option<String>,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
    pub prediction_time: Option<DateTime<Utc>>,
    pub is_aligned: bool,
}

impl AgentInsight {
    pub fn from_outcome(outcome: &AgentOutcome, overall_winner: &str) -> Self {
        let status = match outcome {
            AgentOutcome::Live(_) => InsightStatus::Live,
            AgentOutcome::Fallback { .. } => InsightStatus::Fallback,
            AgentOutcome::Excluded { .. } => InsightStatus::Excluded,
        };
        let agent = outcome.agent();
        let vote = outcome.vote();
        Self {
            agent,
            agent_name: agent.display_name().to_string(),
            status,
            predicted_winner: vote.map(|v| v.predicted_winner.clone()),
            confidence: vote.map(|v| v.confidence),
            reasoning: vote.map(|v| v.reasoning.clone()),
            prediction_time: vote.map(|v| v.voted_at),
            is_aligned: vote.is_some_and(|v| v.predicted_winner == overall_winner),
        }
    }
}

/// Combined answer for one matchup. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub game_id: i64,
    pub overall_winner: String,
    pub overall_confidence: f64,
    pub consensus_reasoning: String,
    /// `"{aligned}/{total} agents"`.
    pub consensus_label: String,
    pub strength: ConsensusStrength,
    pub aligned_agents: usize,
    /// Every registered agent, excluded ones included.
    pub total_agents: usize,
    /// No agent produced a live vote; the answer is the home-team default.
    pub low_confidence: bool,
    pub agent_predictions: Vec<AgentInsight>,
    pub prediction_time: DateTime<Utc>,
}

impl ConsensusResult {
    pub fn insight(&self, agent: AgentKind) -> Option<&AgentInsight> {
        self.agent_predictions.iter().find(|i| i.agent == agent)
    }
}

/// Render the `"k/N agents"` label.
pub fn consensus_label(aligned: usize, total: usize) -> String {
    format!("{aligned}/{total} agents")
}
