//! Agent liveness tracking.
//!
//! [`HealthMonitor`] owns one [`AgentHealthRecord`] per registered agent. Only
//! the monitor writes records (one key at a time); the dispatcher reads them
//! through [`HealthMonitor::is_healthy`] to skip agents known to be down.
//!
//! An agent turns unhealthy on a failed probe and stays that way until a later
//! probe succeeds. There is no time-based recovery.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::{AgentClient, AgentResult, DEFAULT_PROBE_TIMEOUT};
use crate::domain::vote::AgentKind;
use crate::metrics::METRICS;
use crate::obs::emit_health_checked;

/// Last known liveness of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Never probed. Treated as callable.
    Unknown,
    Healthy,
    Unhealthy,
}

/// Health details for a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealthRecord {
    pub agent: AgentKind,
    pub status: HealthStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl AgentHealthRecord {
    pub fn unknown(agent: AgentKind) -> Self {
        Self {
            agent,
            status: HealthStatus::Unknown,
            last_checked: None,
            last_error: None,
        }
    }

    fn from_probe(agent: AgentKind, result: &AgentResult<()>) -> Self {
        match result {
            Ok(()) => Self {
                agent,
                status: HealthStatus::Healthy,
                last_checked: Some(Utc::now()),
                last_error: None,
            },
            Err(err) => Self {
                agent,
                status: HealthStatus::Unhealthy,
                last_checked: Some(Utc::now()),
                last_error: Some(err.to_string()),
            },
        }
    }
}

/// Operator view of every registered agent's health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Registration order.
    pub records: Vec<AgentHealthRecord>,
    pub checked_at: DateTime<Utc>,
    /// `true` only when every agent is [`HealthStatus::Healthy`].
    pub all_healthy: bool,
    pub unhealthy_agents: Vec<AgentKind>,
}

impl HealthReport {
    fn from_records(records: Vec<AgentHealthRecord>) -> Self {
        let all_healthy = !records.is_empty()
            && records.iter().all(|r| r.status == HealthStatus::Healthy);
        let unhealthy_agents = records
            .iter()
            .filter(|r| r.status == HealthStatus::Unhealthy)
            .map(|r| r.agent)
            .collect();
        Self {
            records,
            checked_at: Utc::now(),
            all_healthy,
            unhealthy_agents,
        }
    }

    pub fn healthy_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == HealthStatus::Healthy)
            .count()
    }

    pub fn unhealthy_count(&self) -> usize {
        self.unhealthy_agents.len()
    }
}

/// Probes agents and keeps their health records.
pub struct HealthMonitor {
    clients: Vec<AgentClient>,
    records: DashMap<AgentKind, AgentHealthRecord>,
    probe_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(clients: Vec<AgentClient>) -> Self {
        let records = clients
            .iter()
            .map(|c| (c.kind(), AgentHealthRecord::unknown(c.kind())))
            .collect();
        Self {
            clients,
            records,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// `false` only for agents whose last probe failed.
    ///
    /// Agents the monitor does not know about are considered healthy.
    pub fn is_healthy(&self, agent: AgentKind) -> bool {
        self.records
            .get(&agent)
            .map_or(true, |r| r.status != HealthStatus::Unhealthy)
    }

    pub fn record(&self, agent: AgentKind) -> Option<AgentHealthRecord> {
        self.records.get(&agent).map(|r| r.clone())
    }

    /// Current records without probing.
    pub fn report(&self) -> HealthReport {
        let records = self
            .clients
            .iter()
            .map(|c| {
                self.record(c.kind())
                    .unwrap_or_else(|| AgentHealthRecord::unknown(c.kind()))
            })
            .collect();
        HealthReport::from_records(records)
    }

    /// Probe every agent concurrently, each under the probe timeout, and
    /// replace its record with the result.
    pub async fn check_all(&self) -> HealthReport {
        let mut join_set = JoinSet::new();
        for client in self.clients.iter().cloned() {
            let timeout = self.probe_timeout;
            join_set.spawn(async move {
                let result = client.probe(timeout).await;
                (client.kind(), result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((agent, result)) => self.apply_probe(agent, &result),
                Err(e) => warn!(error = %e, "health probe task failed to join"),
            }
        }

        let report = self.report();
        debug!(
            healthy = report.healthy_count(),
            unhealthy = report.unhealthy_count(),
            "health sweep finished"
        );
        report
    }

    fn apply_probe(&self, agent: AgentKind, result: &AgentResult<()>) {
        let record = AgentHealthRecord::from_probe(agent, result);
        if record.status == HealthStatus::Unhealthy {
            METRICS.inc_probes_failed();
        }
        emit_health_checked(
            agent.as_str(),
            record.status == HealthStatus::Healthy,
            record.last_error.as_deref(),
        );
        self.records.insert(agent, record);
    }

    /// Run [`check_all`](Self::check_all) every `interval` until `cancel` fires.
    ///
    /// The first sweep runs immediately.
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("health monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.check_all().await;
                    }
                }
            }
        })
    }
}
