//! Reduction of a [`PartialResultSet`] into a [`ConsensusResult`].
//!
//! The winner is the team with the highest confidence mass (sum of the
//! confidences of the votes for it), so one confident agent can outweigh two
//! hesitant dissenters. Equal mass goes to the home team. Overall confidence
//! is the mean confidence of the votes that agree with the winner.
//!
//! The denominator of the `"k/N agents"` label is every registered agent,
//! excluded ones included.

use chrono::Utc;

use crate::domain::consensus::{consensus_label, AgentInsight, ConsensusResult, ConsensusStrength};
use crate::domain::error::{PredictError, Result};
use crate::domain::request::PredictionRequest;
use crate::domain::vote::{AgentVote, PartialResultSet, FALLBACK_CONFIDENCE};

/// Masses closer than this are a tie.
const MASS_EPSILON: f64 = 1e-9;

/// Default length of each agent's reasoning excerpt.
pub const DEFAULT_REASONING_EXCERPT: usize = 80;

/// Folds agent outcomes into one answer.
#[derive(Debug, Clone)]
pub struct ConsensusAggregator {
    reasoning_excerpt: usize,
}

impl Default for ConsensusAggregator {
    fn default() -> Self {
        Self {
            reasoning_excerpt: DEFAULT_REASONING_EXCERPT,
        }
    }
}

/// Confidence mass per side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tally {
    pub home_mass: f64,
    pub away_mass: f64,
}

impl Tally {
    pub fn from_votes<'a>(request: &PredictionRequest, votes: impl Iterator<Item = &'a AgentVote>) -> Self {
        votes.fold(Self::default(), |mut tally, vote| {
            if vote.predicted_winner == request.home_team {
                tally.home_mass += vote.confidence;
            } else if vote.predicted_winner == request.away_team {
                tally.away_mass += vote.confidence;
            }
            tally
        })
    }

    /// Home unless the away side carries strictly more mass.
    pub fn leader<'r>(&self, request: &'r PredictionRequest) -> &'r str {
        if self.away_mass - self.home_mass > MASS_EPSILON {
            &request.away_team
        } else {
            &request.home_team
        }
    }
}

impl ConsensusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Truncate each agent's reasoning to `chars` characters in the summary.
    pub fn with_reasoning_excerpt(mut self, chars: usize) -> Self {
        self.reasoning_excerpt = chars;
        self
    }

    /// Compute the consensus for `request` from its settled outcomes.
    ///
    /// Fails only on an empty result set. When no agent produced a live vote
    /// the answer is the home team at confidence 0.5, flagged `low_confidence`.
    pub fn aggregate(&self, request: &PredictionRequest, results: &PartialResultSet) -> Result<ConsensusResult> {
        if results.is_empty() {
            return Err(PredictError::AggregationImpossible {
                game_id: request.game_id,
            });
        }

        let tally = Tally::from_votes(request, results.represented_votes());
        let low_confidence = results.live_count() == 0;
        let overall_winner = if low_confidence {
            request.home_team.clone()
        } else {
            tally.leader(request).to_string()
        };

        let aligned: Vec<&AgentVote> = results
            .represented_votes()
            .filter(|v| v.predicted_winner == overall_winner)
            .collect();

        let overall_confidence = if low_confidence {
            FALLBACK_CONFIDENCE
        } else if aligned.is_empty() {
            0.0
        } else {
            round4(aligned.iter().map(|v| v.confidence).sum::<f64>() / aligned.len() as f64)
        };

        let total_agents = results.len();
        let aligned_agents = aligned.len();
        let label = consensus_label(aligned_agents, total_agents);
        let strength = ConsensusStrength::classify(aligned_agents, total_agents);

        let agent_predictions = results
            .outcomes()
            .iter()
            .map(|o| AgentInsight::from_outcome(o, &overall_winner))
            .collect();

        let consensus_reasoning = if low_confidence {
            format!(
                "No agent produced a live vote; defaulting to home team {}. {} aligned.",
                request.home_team, label
            )
        } else {
            let loser_mass = if request.is_home(&overall_winner) {
                tally.away_mass
            } else {
                tally.home_mass
            };
            let winner_mass = tally.home_mass + tally.away_mass - loser_mass;
            let mut text = format!(
                "{}: {} favored by {} (confidence mass {:.2} vs {:.2}).",
                strength.headline(),
                overall_winner,
                label,
                winner_mass,
                loser_mass
            );
            if request.include_reasoning && !aligned.is_empty() {
                text.push(' ');
                text.push_str(&self.summarize(&aligned));
            }
            text
        };

        Ok(ConsensusResult {
            game_id: request.game_id,
            overall_winner,
            overall_confidence,
            consensus_reasoning,
            consensus_label: label,
            strength,
            aligned_agents,
            total_agents,
            low_confidence,
            agent_predictions,
            prediction_time: Utc::now(),
        })
    }

    fn summarize(&self, aligned: &[&AgentVote]) -> String {
        aligned
            .iter()
            .map(|v| format!("{}: {}", v.agent.display_name(), excerpt(&v.reasoning, self.reasoning_excerpt)))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
