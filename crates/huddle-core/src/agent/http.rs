//! HTTP agent backed by the prediction agent service.
//!
//! Posts a game description to the agent's predict endpoint and expects a
//! `{"winner", "confidence", "reasoning"}` triple back. Liveness is a GET on
//! the health path.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::{AgentError, AgentResult, PredictionAgent, RawVote};
use crate::domain::request::PredictionRequest;
use crate::domain::vote::AgentKind;

/// Game description as the agent service expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub game_id: i64,
    pub home_team_name: String,
    pub away_team_name: String,
    pub game_time: String,
    pub venue: String,
    pub is_dome: bool,
}

/// Body of a predict call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePredictionRequest {
    pub game_data: GameData,
    pub include_reasoning: bool,
    pub confidence_threshold: f64,
}

impl From<&PredictionRequest> for WirePredictionRequest {
    fn from(request: &PredictionRequest) -> Self {
        Self {
            game_data: GameData {
                game_id: request.game_id,
                home_team_name: request.home_team.clone(),
                away_team_name: request.away_team.clone(),
                game_time: request.scheduled_at.to_rfc3339(),
                venue: request.venue_or_default(),
                is_dome: request.is_dome,
            },
            include_reasoning: request.include_reasoning,
            confidence_threshold: request.confidence_threshold,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: Option<String>,
}

/// A predictor reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAgent {
    kind: AgentKind,
    base_url: String,
    predict_path: String,
    health_path: String,
    client: reqwest::Client,
}

impl HttpAgent {
    /// Agent at `base_url` using the service's default paths
    /// (`/agents/<slug>/predict` and `/health`).
    pub fn new(kind: AgentKind, base_url: impl Into<String>) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("huddle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Transport {
                agent: kind,
                detail: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(kind, base_url, client))
    }

    /// Share one connection pool across agents.
    pub fn with_client(kind: AgentKind, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            predict_path: format!("/agents/{}/predict", kind.endpoint_slug()),
            health_path: "/health".to_string(),
            client,
        }
    }

    pub fn with_predict_path(mut self, path: impl Into<String>) -> Self {
        self.predict_path = path.into();
        self
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn predict_url(&self) -> String {
        join_url(&self.base_url, &self.predict_path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.base_url, &self.health_path)
    }

    fn transport(&self, detail: impl Into<String>) -> AgentError {
        AgentError::Transport {
            agent: self.kind,
            detail: detail.into(),
        }
    }

    fn invalid(&self, detail: impl Into<String>) -> AgentError {
        AgentError::InvalidResponse {
            agent: self.kind,
            detail: detail.into(),
        }
    }
}

#[async_trait]
impl PredictionAgent for HttpAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn predict(&self, request: &PredictionRequest) -> AgentResult<RawVote> {
        let url = self.predict_url();
        debug!(agent = %self.kind, url = %url, "posting prediction request");

        let response = self
            .client
            .post(&url)
            .json(&WirePredictionRequest::from(request))
            .send()
            .await
            .map_err(|e| self.transport(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("HTTP {status}: {body}");
            // Other 4xx answers reject the request itself rather than the connection.
            return if status.is_client_error()
                && status != StatusCode::REQUEST_TIMEOUT
                && status != StatusCode::TOO_MANY_REQUESTS
            {
                Err(self.invalid(detail))
            } else {
                Err(self.transport(detail))
            };
        }

        response
            .json::<RawVote>()
            .await
            .map_err(|e| self.invalid(format!("unparseable prediction body: {e}")))
    }

    async fn probe(&self) -> AgentResult<()> {
        let url = self.health_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport(format!("health check to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.transport(format!("health check returned HTTP {status}")));
        }

        // A body is optional; when it names a status it must be a healthy one.
        let body = response.text().await.unwrap_or_default();
        if let Ok(HealthBody {
            status: Some(reported),
        }) = serde_json::from_str::<HealthBody>(&body)
        {
            let normalized = reported.to_ascii_lowercase();
            if !matches!(normalized.as_str(), "healthy" | "ok" | "up") {
                return Err(AgentError::Unhealthy {
                    agent: self.kind,
                    status: reported,
                });
            }
        }
        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
