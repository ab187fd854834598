//! Metrics and logging for the staged settlement pipeline
//!
//! This crate provides Prometheus metrics for pipeline runs, stages and
//! per-item outcomes, plus tracing subscriber initialisation.
//!
//! # Example
//!
//! ```no_run
//! use settle_pipeline_config::LoggingConfig;
//! use settle_pipeline_metrics::{init_tracing_with_metrics, MetricsCollector};
//! use std::sync::Arc;
//!
//! let collector = Arc::new(MetricsCollector::new());
//! init_tracing_with_metrics(&LoggingConfig::default(), collector.clone()).unwrap();
//!
//! let run = collector.record_run_started();
//! println!("{}", collector.export_metrics().unwrap());
//! drop(run);
//! ```

pub mod collector;
pub mod metrics;
pub mod tracing;

pub use collector::{ActiveRun, MetricsCollector, MetricsError, RejectionOrigin, StageCounts};
pub use self::tracing::{init_tracing, init_tracing_with_metrics, RunId, TracingError};
