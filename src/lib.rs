//! Staged async transformation pipeline with per-item settlement tracking
//!
//! Every input item ends as exactly one [`Settled`] record carrying its
//! original index and the stage that last touched it. A failing item never
//! fails its siblings or the run.
//!
//! ```no_run
//! use settle_pipeline::{transform_fn, PipelineBuilder, Stage};
//!
//! # async fn demo() -> Result<(), settle_pipeline::PipelineError> {
//! let pipeline = PipelineBuilder::new()
//!     .stage(Stage::new(
//!         "double",
//!         transform_fn(|value: &i32, _index: usize| {
//!             let value = *value;
//!             async move { Ok::<_, anyhow::Error>(value * 2) }
//!         }),
//!     ))
//!     .build()?;
//!
//! let report = pipeline.run_values(vec![1, 2, 3]).await?;
//! assert_eq!(report.len(), 3);
//! # Ok(())
//! # }
//! ```

pub use settle_pipeline_catalog as catalog;
pub use settle_pipeline_config as config;
pub use settle_pipeline_metrics as metrics;

pub use settle_pipeline_orchestrator::{
    BuilderError, DispatchSummary, ErrorDispatcher, Pipeline, PipelineBuilder, PipelineError,
    PipelineOptions, RunReport, RunState, Stage, StageBuilder, StageSummary,
};
pub use settle_pipeline_types::{
    error_lookup_fn, lookup_fn, transform_fn, validate_fn, ErrorLookup, Fulfilled, Lookup,
    PipelineInput, Rejected, Rejection, Settled, SettlementStatus, Transform, TransformStep,
    Validate,
};
