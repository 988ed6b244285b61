//! Process-wide prediction counters.
//!
//! Call sites bump counters without logging. [`Metrics::flush`] reports them
//! as one `info!` event; the CLI calls it once per command.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    predictions_served: AtomicU64,
    fallbacks_substituted: AtomicU64,
    agents_excluded: AtomicU64,
    confidence_clamped: AtomicU64,
    retries: AtomicU64,
    probes_failed: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub predictions_served: u64,
    pub fallbacks_substituted: u64,
    pub agents_excluded: u64,
    pub confidence_clamped: u64,
    pub retries: u64,
    pub probes_failed: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(counter: &AtomicU64, name: &'static str) {
    counter.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(metric = name, "counter incremented");
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            fallbacks_substituted: AtomicU64::new(0),
            agents_excluded: AtomicU64::new(0),
            confidence_clamped: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            probes_failed: AtomicU64::new(0),
        }
    }

    pub fn inc_predictions(&self) {
        bump(&self.predictions_served, "predictions_served");
    }

    pub fn inc_fallbacks(&self) {
        bump(&self.fallbacks_substituted, "fallbacks_substituted");
    }

    pub fn inc_excluded(&self) {
        bump(&self.agents_excluded, "agents_excluded");
    }

    pub fn inc_confidence_clamped(&self) {
        bump(&self.confidence_clamped, "confidence_clamped");
    }

    pub fn inc_retries(&self) {
        bump(&self.retries, "retries");
    }

    pub fn inc_probes_failed(&self) {
        bump(&self.probes_failed, "probes_failed");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            predictions_served: self.predictions_served.load(Ordering::Relaxed),
            fallbacks_substituted: self.fallbacks_substituted.load(Ordering::Relaxed),
            agents_excluded: self.agents_excluded.load(Ordering::Relaxed),
            confidence_clamped: self.confidence_clamped.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
        }
    }

    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            predictions_served = s.predictions_served,
            fallbacks_substituted = s.fallbacks_substituted,
            agents_excluded = s.agents_excluded,
            confidence_clamped = s.confidence_clamped,
            retries = s.retries,
            probes_failed = s.probes_failed,
        );
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.predictions_served,
            &self.fallbacks_substituted,
            &self.agents_excluded,
            &self.confidence_clamped,
            &self.retries,
            &self.probes_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
