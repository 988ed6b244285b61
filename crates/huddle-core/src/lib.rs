//! huddle core library
//!
//! Predicts the winner of a matchup by polling independent prediction agents
//! concurrently and folding their votes into one consensus.
//!
//! # Module layout
//!
//! - [`domain`] — requests, votes, outcomes, consensus results, errors
//! - [`agent`] — `PredictionAgent` seam, `AgentClient` timeout/retry, `HttpAgent`
//! - [`dispatch`] — `FanOutDispatcher`: concurrent fan-out with fallback votes
//! - [`aggregate`] — `ConsensusAggregator`: confidence-mass consensus
//! - [`health`] — `HealthMonitor`: liveness probes and the health table
//! - [`orchestrator`] — `Orchestrator`: the entry point
//! - [`config`] — TOML / environment configuration

pub mod agent;
pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod fakes;
pub mod health;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod telemetry;

pub use agent::{
    AgentClient, AgentError, AgentResult, Backoff, HttpAgent, PredictionAgent, RawVote, RetryPolicy,
};
pub use aggregate::ConsensusAggregator;
pub use config::{AgentEndpointConfig, ConfigError, HealthConfig, OrchestratorConfig};
pub use dispatch::FanOutDispatcher;
pub use domain::{
    AgentInsight, AgentKind, AgentOutcome, AgentVote, ConsensusResult, ConsensusStrength,
    InsightStatus, PartialResultSet, PredictError, PredictionRequest, Result, ValidationError,
};
pub use health::{AgentHealthRecord, HealthMonitor, HealthReport, HealthStatus};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};

pub use metrics::{MetricsSnapshot, METRICS};
pub use obs::PredictionSpan;
pub use telemetry::init_tracing;

/// huddle version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
