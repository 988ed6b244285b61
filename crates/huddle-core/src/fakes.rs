//! In-memory test doubles for the agent seam.
//!
//! [`ScriptedAgent`] replays a fixed script of behaviours so timeout, retry,
//! fallback and health paths can be driven deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::agent::{AgentError, AgentResult, PredictionAgent, RawVote};
use crate::domain::request::PredictionRequest;
use crate::domain::vote::AgentKind;

/// One scripted behaviour.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with this vote.
    Vote(RawVote),
    /// Answer with this vote after sleeping.
    Delayed(Duration, RawVote),
    /// Fail with a transport error.
    Fail(String),
    /// Answer with a response that breaks the contract.
    Invalid(String),
    /// Never answer.
    Hang,
}

impl Step {
    pub fn vote(winner: &str, confidence: f64, reasoning: &str) -> Self {
        Step::Vote(RawVote::new(winner, confidence, reasoning))
    }

    pub fn delayed(after: Duration, winner: &str, confidence: f64) -> Self {
        Step::Delayed(after, RawVote::new(winner, confidence, "delayed answer"))
    }

    pub fn fail(detail: &str) -> Self {
        Step::Fail(detail.to_string())
    }

    pub fn ok() -> Self {
        Step::vote("", 0.0, "")
    }
}

/// A [`PredictionAgent`] that follows a script.
///
/// Steps are consumed in order; once the script runs out the `repeat` step
/// (if any) is used for every further call, otherwise calls fail.
pub struct ScriptedAgent {
    kind: AgentKind,
    script: Mutex<VecDeque<Step>>,
    repeat: Option<Step>,
    probe: Mutex<Step>,
    calls: AtomicUsize,
    probes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            script: Mutex::new(VecDeque::new()),
            repeat: None,
            probe: Mutex::new(Step::ok()),
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Shorthand for an agent that always votes the same way.
    pub fn always(kind: AgentKind, winner: &str, confidence: f64) -> Self {
        Self::new(kind).repeat(Step::vote(winner, confidence, "scripted"))
    }

    pub fn then(self, step: Step) -> Self {
        self.lock_script().push_back(step);
        self
    }

    pub fn repeat(mut self, step: Step) -> Self {
        self.repeat = Some(step);
        self
    }

    /// Probe behaviour: `Vote`/`Delayed` succeed, `Fail` is a transport error,
    /// `Invalid` reports an unhealthy status, `Hang` never answers.
    pub fn with_probe(self, step: Step) -> Self {
        self.set_probe(step);
        self
    }

    pub fn set_probe(&self, step: Step) {
        *self.probe.lock().unwrap_or_else(|e| e.into_inner()) = step;
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous `predict` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Step>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_step(&self) -> Option<Step> {
        self.lock_script()
            .pop_front()
            .or_else(|| self.repeat.clone())
    }

    async fn run(&self, step: Step) -> AgentResult<RawVote> {
        match step {
            Step::Vote(vote) => Ok(vote),
            Step::Delayed(after, vote) => {
                tokio::time::sleep(after).await;
                Ok(vote)
            }
            Step::Fail(detail) => Err(AgentError::Transport {
                agent: self.kind,
                detail,
            }),
            Step::Invalid(detail) => Err(AgentError::InvalidResponse {
                agent: self.kind,
                detail,
            }),
            Step::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl PredictionAgent for ScriptedAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn predict(&self, _request: &PredictionRequest) -> AgentResult<RawVote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = match self.next_step() {
            Some(step) => self.run(step).await,
            None => Err(AgentError::Transport {
                agent: self.kind,
                detail: "script exhausted".to_string(),
            }),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn probe(&self) -> AgentResult<()> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let step = self.probe.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match step {
            Step::Invalid(status) => Err(AgentError::Unhealthy {
                agent: self.kind,
                status,
            }),
            other => self.run(other).await.map(|_| ()),
        }
    }
}
