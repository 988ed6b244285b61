//! Orchestrator configuration.
//!
//! Loaded from a TOML file ([`OrchestratorConfig::load`]) or from environment
//! variables ([`OrchestratorConfig::from_env`]). A file without any
//! `[[agents]]` entry gets all four agents at [`DEFAULT_AGENT_URL`]; a file
//! that lists agents registers exactly those. Omitted agent fields take their
//! defaults.
//!
//! ```toml
//! [[agents]]
//! kind = "weather"
//! base_url = "http://agent-service:8001"
//! timeout_ms = 10000
//! max_retries = 2
//!
//! [health]
//! probe_timeout_ms = 2000
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentClient, AgentResult, Backoff, HttpAgent, RetryPolicy};
use crate::domain::vote::AgentKind;

/// Agent service address used when nothing else is configured.
pub const DEFAULT_AGENT_URL: &str = "http://agent-service:8001";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Connection and retry settings for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEndpointConfig {
    pub kind: AgentKind,
    pub base_url: String,
    /// Defaults to `/agents/<slug>/predict`.
    #[serde(default)]
    pub predict_path: Option<String>,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub backoff: Backoff,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl AgentEndpointConfig {
    pub fn new(kind: AgentKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            predict_path: None,
            health_path: default_health_path(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff: Backoff::default(),
            max_delay_ms: default_max_delay_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_retries, Duration::from_millis(self.retry_delay_ms))
            .with_backoff(self.backoff)
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }

    /// Build an HTTP-backed client for this endpoint.
    pub fn build_client(&self) -> AgentResult<AgentClient> {
        let mut agent = HttpAgent::new(self.kind, self.base_url.clone())?
            .with_health_path(self.health_path.clone());
        if let Some(path) = &self.predict_path {
            agent = agent.with_predict_path(path.clone());
        }
        Ok(AgentClient::new(std::sync::Arc::new(agent))
            .with_timeout(self.timeout())
            .with_retry_policy(self.retry_policy()))
    }
}

/// Liveness probing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_interval_secs() -> u64 {
    60
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Full orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentEndpointConfig>,
    #[serde(default)]
    pub health: HealthConfig,
}

/// All four agents against [`DEFAULT_AGENT_URL`].
fn default_agents() -> Vec<AgentEndpointConfig> {
    AgentKind::ALL
        .iter()
        .map(|kind| AgentEndpointConfig::new(*kind, DEFAULT_AGENT_URL))
        .collect()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            health: HealthConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Default deployment adjusted by environment variables:
    ///
    /// - `HUDDLE_AGENT_URL` — base URL for every agent
    /// - `HUDDLE_<KIND>_URL` — per-agent override, e.g. `HUDDLE_WEATHER_URL`
    /// - `HUDDLE_AGENT_TIMEOUT_MS`, `HUDDLE_AGENT_MAX_RETRIES`, `HUDDLE_AGENT_RETRY_DELAY_MS`
    /// - `HUDDLE_PROBE_TIMEOUT_MS`, `HUDDLE_HEALTH_INTERVAL_SECS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base = lookup("HUDDLE_AGENT_URL").unwrap_or_else(|| DEFAULT_AGENT_URL.to_string());
        let timeout_ms = parse_var(&lookup, "HUDDLE_AGENT_TIMEOUT_MS")?;
        let max_retries = parse_var(&lookup, "HUDDLE_AGENT_MAX_RETRIES")?;
        let retry_delay_ms = parse_var(&lookup, "HUDDLE_AGENT_RETRY_DELAY_MS")?;

        let agents = AgentKind::ALL
            .iter()
            .map(|kind| {
                let key = format!("HUDDLE_{}_URL", kind.as_str().to_ascii_uppercase());
                let mut agent = AgentEndpointConfig::new(*kind, lookup(&key).unwrap_or_else(|| base.clone()));
                if let Some(v) = timeout_ms {
                    agent.timeout_ms = v;
                }
                if let Some(v) = max_retries {
                    agent.max_retries = v;
                }
                if let Some(v) = retry_delay_ms {
                    agent.retry_delay_ms = v;
                }
                agent
            })
            .collect();

        let mut health = HealthConfig::default();
        if let Some(v) = parse_var(&lookup, "HUDDLE_PROBE_TIMEOUT_MS")? {
            health.probe_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "HUDDLE_HEALTH_INTERVAL_SECS")? {
            health.interval_secs = v;
        }

        let config = Self { agents, health };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::Invalid("no agents configured".to_string()));
        }
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.kind) {
                return Err(ConfigError::Invalid(format!(
                    "agent '{}' configured more than once",
                    agent.kind
                )));
            }
            if agent.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "agent '{}' has an empty base_url",
                    agent.kind
                )));
            }
            if agent.timeout_ms == 0 {
                return Err(ConfigError::Invalid(format!(
                    "agent '{}' timeout_ms must be positive",
                    agent.kind
                )));
            }
        }
        if self.health.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "health.probe_timeout_ms must be positive".to_string(),
            ));
        }
        if self.health.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "health.interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value,
            }),
    }
}
