//! Domain types for matchup prediction.

pub mod consensus;
pub mod error;
pub mod request;
pub mod vote;

pub use consensus::{consensus_label, AgentInsight, ConsensusResult, ConsensusStrength, InsightStatus};
pub use error::{PredictError, Result, ValidationError};
pub use request::PredictionRequest;
pub use vote::{
    AgentKind, AgentOutcome, AgentVote, PartialResultSet, FALLBACK_CONFIDENCE, FALLBACK_REASONING,
};
