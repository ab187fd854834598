use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use crate::metrics::*;

/// Where a stage-level rejection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionOrigin {
    Transform,
    Validate,
}

impl RejectionOrigin {
    fn as_label(&self) -> &'static str {
        match self {
            RejectionOrigin::Transform => "transform",
            RejectionOrigin::Validate => "validate",
        }
    }
}

/// Per-stage item counts reported once the stage barrier is reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub fulfilled: usize,
    pub rejected_by_transform: usize,
    pub rejected_by_validation: usize,
    pub carried_forward: usize,
}

/// Holds one slot of the active-runs gauge
#[must_use = "the run stops counting as active when this guard is dropped"]
#[derive(Debug)]
pub struct ActiveRun {
    _private: (),
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        ACTIVE_RUNS.dec();
    }
}

/// Metrics collector for pipeline runs
#[derive(Debug, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RUN METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record a run entering the running state
    ///
    /// The run counts as active until the returned guard is dropped, which
    /// also happens when the run unwinds.
    pub fn record_run_started(&self) -> ActiveRun {
        RUNS_STARTED.inc();
        ACTIVE_RUNS.inc();
        ActiveRun { _private: () }
    }

    /// Record a run reaching the settled state
    pub fn record_run_settled(&self, items: usize, duration: Duration) {
        RUNS_SETTLED.inc();
        RUN_ITEMS.observe(items as f64);
        RUN_DURATION.observe(duration.as_secs_f64());
    }

    /// Record a run that never started because its configuration was invalid
    pub fn record_run_refused(&self) {
        RUNS_REFUSED.inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STAGE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record the outcome of one stage
    pub fn record_stage(&self, stage: &str, counts: StageCounts, duration: Duration) {
        ITEMS_FULFILLED
            .with_label_values(&[stage])
            .inc_by(counts.fulfilled as u64);
        self.record_rejections(stage, RejectionOrigin::Transform, counts.rejected_by_transform);
        self.record_rejections(stage, RejectionOrigin::Validate, counts.rejected_by_validation);
        ITEMS_CARRIED_FORWARD
            .with_label_values(&[stage])
            .inc_by(counts.carried_forward as u64);
        STAGE_DURATION
            .with_label_values(&[stage])
            .observe(duration.as_secs_f64());
    }

    fn record_rejections(&self, stage: &str, origin: RejectionOrigin, count: usize) {
        ITEMS_REJECTED
            .with_label_values(&[stage, origin.as_label()])
            .inc_by(count as u64);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HOOK METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_lookup_panic(&self, stage: &str) {
        LOOKUP_PANICS.with_label_values(&[stage]).inc();
    }

    pub fn record_rejection_dispatched(&self, current_rejection: bool) {
        let label = if current_rejection { "true" } else { "false" };
        REJECTIONS_DISPATCHED.with_label_values(&[label]).inc();
    }

    pub fn record_error_event(&self, error_type: &str) {
        ERROR_EVENTS.with_label_values(&[error_type]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

/// Metrics error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
}
