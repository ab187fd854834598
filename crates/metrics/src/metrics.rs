use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

lazy_static! {
    // ═══════════════════════════════════════════════════════════════════════════
    // RUN METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Total number of pipeline runs started
    pub static ref RUNS_STARTED: IntCounter = register_int_counter!(
        "settle_pipeline_runs_started_total",
        "Total number of pipeline runs started"
    )
    .unwrap();

    /// Total number of pipeline runs that reached the settled state
    pub static ref RUNS_SETTLED: IntCounter = register_int_counter!(
        "settle_pipeline_runs_settled_total",
        "Total number of pipeline runs settled"
    )
    .unwrap();

    /// Total number of runs refused because of configuration errors
    pub static ref RUNS_REFUSED: IntCounter = register_int_counter!(
        "settle_pipeline_runs_refused_total",
        "Total number of pipeline runs refused before starting"
    )
    .unwrap();

    /// Current number of runs in progress
    pub static ref ACTIVE_RUNS: IntGauge = register_int_gauge!(
        "settle_pipeline_runs_active",
        "Current number of pipeline runs in progress"
    )
    .unwrap();

    /// Run duration histogram
    pub static ref RUN_DURATION: Histogram = register_histogram!(
        "settle_pipeline_run_duration_seconds",
        "Pipeline run duration in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .unwrap();

    /// Items per run
    pub static ref RUN_ITEMS: Histogram = register_histogram!(
        "settle_pipeline_run_items",
        "Number of input items per pipeline run",
        vec![0.0, 1.0, 10.0, 100.0, 1000.0, 10000.0]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // STAGE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Items fulfilled by stage
    pub static ref ITEMS_FULFILLED: IntCounterVec = register_int_counter_vec!(
        "settle_pipeline_items_fulfilled_total",
        "Items left fulfilled by a stage",
        &["stage"]
    )
    .unwrap();

    /// Items rejected by stage and origin (transform, validate)
    pub static ref ITEMS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "settle_pipeline_items_rejected_total",
        "Items newly rejected by a stage",
        &["stage", "origin"]
    )
    .unwrap();

    /// Rejected items carried through a stage untouched
    pub static ref ITEMS_CARRIED_FORWARD: IntCounterVec = register_int_counter_vec!(
        "settle_pipeline_items_carried_forward_total",
        "Rejected items carried forward through a stage",
        &["stage"]
    )
    .unwrap();

    /// Stage duration histogram
    pub static ref STAGE_DURATION: HistogramVec = register_histogram_vec!(
        "settle_pipeline_stage_duration_seconds",
        "Stage duration in seconds, including hooks",
        &["stage"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .unwrap();

    // ═══════════════════════════════════════════════════════════════════════════
    // HOOK METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Lookup hooks that panicked and were isolated
    pub static ref LOOKUP_PANICS: IntCounterVec = register_int_counter_vec!(
        "settle_pipeline_lookup_panics_total",
        "Lookup hook panics caught by the pipeline",
        &["stage"]
    )
    .unwrap();

    /// Rejections handed to the error dispatcher
    pub static ref REJECTIONS_DISPATCHED: IntCounterVec = register_int_counter_vec!(
        "settle_pipeline_rejections_dispatched_total",
        "Rejections passed to the error handler",
        &["current"]
    )
    .unwrap();

    /// Error-level log events by error type
    pub static ref ERROR_EVENTS: IntCounterVec = register_int_counter_vec!(
        "settle_pipeline_error_events_total",
        "Error-level log events by error type",
        &["error_type"]
    )
    .unwrap();
}
