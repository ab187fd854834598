//! Core configuration structures for the staged settlement pipeline

use serde::{Deserialize, Serialize};

/// Main pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Run behaviour
    #[serde(default)]
    pub run: RunConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// When the error pass runs during a pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Once, after the final stage
    #[default]
    Final,

    /// After every stage, including the final one
    EveryStage,
}

/// Per-run behaviour of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum in-flight transform/validate calls per stage (unbounded if unset)
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Error pass scheduling
    #[serde(default)]
    pub dispatch: DispatchMode,

    /// Catch and log panicking lookup hooks instead of propagating them
    #[serde(default = "default_true")]
    pub isolate_lookup_panics: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            dispatch: DispatchMode::Final,
            isolate_lookup_panics: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Record Prometheus metrics for pipeline runs
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
