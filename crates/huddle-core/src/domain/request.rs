//! Prediction request: the immutable input to one `predict` call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::ValidationError;

/// One matchup to predict.
///
/// Built once by the caller and shared read-only with every agent call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub game_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub is_dome: bool,
    /// Ask agents for free-text reasoning and include it in the consensus.
    #[serde(default = "default_include_reasoning")]
    pub include_reasoning: bool,
    /// Forwarded to agents unchanged.
    #[serde(default)]
    pub confidence_threshold: f64,
}

fn default_include_reasoning() -> bool {
    true
}

impl PredictionRequest {
    pub fn new(
        game_id: i64,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            game_id,
            home_team: home_team.into(),
            away_team: away_team.into(),
            scheduled_at,
            venue: None,
            is_dome: false,
            include_reasoning: true,
            confidence_threshold: 0.0,
        }
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn with_dome(mut self, is_dome: bool) -> Self {
        self.is_dome = is_dome;
        self
    }

    pub fn with_reasoning(mut self, include: bool) -> Self {
        self.include_reasoning = include;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Reject malformed or self-referential requests.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.home_team.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "home_team" });
        }
        if self.away_team.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "away_team" });
        }
        if same_team(&self.home_team, &self.away_team) {
            return Err(ValidationError::SameTeam {
                team: self.home_team.trim().to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ValidationError::ConfidenceThresholdOutOfRange {
                value: self.confidence_threshold,
            });
        }
        if let Some(venue) = &self.venue {
            if venue.trim().is_empty() {
                return Err(ValidationError::EmptyField { field: "venue" });
            }
        }
        Ok(())
    }

    /// Map an agent-reported team name onto this request's spelling.
    ///
    /// Returns `None` when the name matches neither team.
    pub fn resolve_team(&self, name: &str) -> Option<&str> {
        if same_team(name, &self.home_team) {
            Some(&self.home_team)
        } else if same_team(name, &self.away_team) {
            Some(&self.away_team)
        } else {
            None
        }
    }

    pub fn is_home(&self, team: &str) -> bool {
        team == self.home_team
    }

    /// Venue as sent to agents; defaults to the home team's stadium.
    pub fn venue_or_default(&self) -> String {
        self.venue
            .clone()
            .unwrap_or_else(|| format!("{} Stadium", self.home_team))
    }
}

fn same_team(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
