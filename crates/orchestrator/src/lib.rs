pub mod dispatcher;
pub mod executor;
pub mod hooks;
pub mod orchestrator;
pub mod stage;
pub mod validator;


// Re-export main types
pub use dispatcher::{DispatchSummary, ErrorDispatcher};
pub use executor::{Execution, ExecutionStats, StageExecutor};
pub use hooks::{lookup_generation, validate_generation};
pub use orchestrator::{
    Pipeline, PipelineBuilder, PipelineError, PipelineOptions, RunReport, RunState, StageSummary,
};
pub use stage::{BuilderError, Stage, StageBuilder};
pub use validator::{settle_inputs, InputError};
