use async_trait::async_trait;
use settle_pipeline_config::{DispatchMode, PipelineConfig, RunConfig};
use settle_pipeline_metrics::{MetricsCollector, RunId, StageCounts};
use settle_pipeline_types::{
    ErrorLookup, Fulfilled, PipelineInput, Rejected, Rejection, Settled,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::dispatcher::{DispatchSummary, ErrorDispatcher};
use crate::executor::StageExecutor;
use crate::hooks::{lookup_generation, validate_generation};
use crate::stage::{BuilderError, Stage};
use crate::validator::{settle_inputs, InputError};

/// Options for a pipeline run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Maximum in-flight transform/validate calls per stage
    pub max_concurrency: Option<usize>,

    /// When the error pass runs
    pub dispatch: DispatchMode,

    /// Catch and log panicking lookups instead of propagating them
    pub isolate_lookup_panics: bool,
}

impl PipelineOptions {
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_lookup_isolation(mut self, enabled: bool) -> Self {
        self.isolate_lookup_panics = enabled;
        self
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&RunConfig::default())
    }
}

impl From<&RunConfig> for PipelineOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            dispatch: config.dispatch,
            isolate_lookup_panics: config.isolate_lookup_panics,
        }
    }
}

/// Lifecycle of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initialized,
    Running(usize),
    Settled,
}

impl RunState {
    /// Whether `next` is a legal successor for a pipeline of `stage_count` stages
    pub fn can_advance_to(&self, next: RunState, stage_count: usize) -> bool {
        match (*self, next) {
            (RunState::Initialized, RunState::Running(0)) => stage_count > 0,
            (RunState::Running(current), RunState::Running(following)) => {
                following == current + 1 && following < stage_count
            }
            (RunState::Running(current), RunState::Settled) => current + 1 == stage_count,
            _ => false,
        }
    }
}

/// Outcome counts for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub ordinal: usize,
    pub name: String,
    /// Fulfilled after transform and validation
    pub fulfilled: usize,
    pub rejected_by_transform: usize,
    pub rejected_by_validation: usize,
    pub carried_forward: usize,
    pub lookup_panics: usize,
    pub elapsed: Duration,
}

impl StageSummary {
    pub fn rejected(&self) -> usize {
        self.rejected_by_transform + self.rejected_by_validation + self.carried_forward
    }

    fn counts(&self) -> StageCounts {
        StageCounts {
            fulfilled: self.fulfilled,
            rejected_by_transform: self.rejected_by_transform,
            rejected_by_validation: self.rejected_by_validation,
            carried_forward: self.carried_forward,
        }
    }
}

/// Result of a settled pipeline run
#[derive(Debug)]
pub struct RunReport<O> {
    pub run_id: RunId,

    /// One record per original input, in index order
    pub records: Vec<Settled<O>>,

    /// States visited, starting with `Initialized` and ending with `Settled`
    pub transitions: Vec<RunState>,

    pub stages: Vec<StageSummary>,
}

impl<O> RunReport<O> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn final_state(&self) -> Option<RunState> {
        self.transitions.last().copied()
    }

    pub fn fulfilled(&self) -> impl Iterator<Item = &Fulfilled<O>> {
        self.records.iter().filter_map(|record| match record {
            Settled::Fulfilled(fulfilled) => Some(fulfilled),
            Settled::Rejected(_) => None,
        })
    }

    pub fn rejected(&self) -> impl Iterator<Item = &Rejected> {
        self.records.iter().filter_map(|record| match record {
            Settled::Fulfilled(_) => None,
            Settled::Rejected(rejected) => Some(rejected),
        })
    }

    pub fn into_results(self) -> Vec<Result<O, Rejection>> {
        self.records.into_iter().map(Settled::into_result).collect()
    }
}

/// Errors that stop a run before it starts
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    NoStages,

    #[error("invalid stage {ordinal}: {reason}")]
    InvalidStage { ordinal: usize, reason: String },

    #[error("invalid options: {reason}")]
    InvalidOptions { reason: String },

    #[error("input at position {position} repeats index {index}")]
    DuplicateIndex { index: usize, position: usize },

    #[error("index {index} is outside the input collection of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("stage builder error: {0}")]
    Builder(#[from] BuilderError),
}

impl From<InputError> for PipelineError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::DuplicateIndex { index, position } => {
                PipelineError::DuplicateIndex { index, position }
            }
            InputError::IndexOutOfRange { index, len } => {
                PipelineError::IndexOutOfRange { index, len }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RUN CONTEXT
// ═══════════════════════════════════════════════════════════════════════════

struct RunContext<'a> {
    options: &'a PipelineOptions,
    dispatcher: Option<&'a ErrorDispatcher>,
    metrics: Option<&'a MetricsCollector>,
    stage_count: usize,
    state: RunState,
    transitions: Vec<RunState>,
    summaries: Vec<StageSummary>,
}

impl<'a> RunContext<'a> {
    fn new(
        options: &'a PipelineOptions,
        dispatcher: Option<&'a ErrorDispatcher>,
        metrics: Option<&'a MetricsCollector>,
        stage_count: usize,
    ) -> Self {
        Self {
            options,
            dispatcher,
            metrics,
            stage_count,
            state: RunState::Initialized,
            transitions: vec![RunState::Initialized],
            summaries: Vec::with_capacity(stage_count),
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next, self.stage_count),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        info!(from = ?self.state, to = ?next, "Pipeline state transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn complete_stage<U>(&mut self, summary: StageSummary, records: &[Settled<U>]) {
        info!(
            stage = summary.ordinal,
            stage_name = %summary.name,
            fulfilled = summary.fulfilled,
            rejected = summary.rejected(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Stage complete"
        );

        if let Some(metrics) = self.metrics {
            metrics.record_stage(&summary.name, summary.counts(), summary.elapsed);
            for _ in 0..summary.lookup_panics {
                metrics.record_lookup_panic(&summary.name);
            }
        }
        self.summaries.push(summary);

        if self.options.dispatch == DispatchMode::EveryStage {
            self.dispatch(records);
        }
    }

    fn settle<O>(&mut self, records: &[Settled<O>]) {
        self.advance(RunState::Settled);

        if self.options.dispatch == DispatchMode::Final {
            self.dispatch(records);
        }
    }

    fn dispatch<U>(&self, records: &[Settled<U>]) {
        let Some(dispatcher) = self.dispatcher else {
            return;
        };

        let summary: DispatchSummary = dispatcher.dispatch(records);
        debug!(
            current = summary.current,
            carried = summary.carried,
            "Error pass complete"
        );

        if let Some(metrics) = self.metrics {
            for _ in 0..summary.current {
                metrics.record_rejection_dispatched(true);
            }
            for _ in 0..summary.carried {
                metrics.record_rejection_dispatched(false);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STAGE CHAIN
// ═══════════════════════════════════════════════════════════════════════════

/// Type-changing sequence of stages from `I` to `O`
#[async_trait]
trait StageChain<I, O>: Send + Sync {
    async fn run(&self, records: Vec<Settled<I>>, ctx: &mut RunContext<'_>) -> Vec<Settled<O>>;
}

/// Empty chain: input generation passes through unchanged
struct Source;

#[async_trait]
impl<I> StageChain<I, I> for Source
where
    I: Send + 'static,
{
    async fn run(&self, records: Vec<Settled<I>>, _ctx: &mut RunContext<'_>) -> Vec<Settled<I>> {
        records
    }
}

struct Chained<I, M, O> {
    head: Box<dyn StageChain<I, M>>,
    stage: Stage<M, O>,
    ordinal: usize,
}

#[async_trait]
impl<I, M, O> StageChain<I, O> for Chained<I, M, O>
where
    I: Send + Sync + 'static,
    M: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    async fn run(&self, records: Vec<Settled<I>>, ctx: &mut RunContext<'_>) -> Vec<Settled<O>> {
        let records = self.head.run(records, ctx).await;
        run_stage(self.ordinal, &self.stage, records, ctx).await
    }
}

/// Transform, validate, then look up; the stage barrier is the return
async fn run_stage<T, U>(
    ordinal: usize,
    stage: &Stage<T, U>,
    records: Vec<Settled<T>>,
    ctx: &mut RunContext<'_>,
) -> Vec<Settled<U>>
where
    T: Send + Sync,
    U: Send + Sync,
{
    ctx.advance(RunState::Running(ordinal));
    let started = Instant::now();
    let max_concurrency = ctx.options.max_concurrency;

    let executor = StageExecutor::new(ordinal, max_concurrency);
    let execution = executor.execute(stage.transform.as_ref(), records).await;

    let (records, downgraded) = match stage.validate.as_deref() {
        Some(validate) => {
            validate_generation(validate, executor.step(), execution.records, max_concurrency)
                .await
        }
        None => (execution.records, 0),
    };

    let lookup_panics = match stage.lookup.as_deref() {
        Some(lookup) => lookup_generation(
            lookup,
            stage.name(),
            &records,
            ctx.options.isolate_lookup_panics,
        ),
        None => 0,
    };

    let summary = StageSummary {
        ordinal,
        name: stage.name().to_string(),
        fulfilled: execution.stats.fulfilled - downgraded,
        rejected_by_transform: execution.stats.rejected,
        rejected_by_validation: downgraded,
        carried_forward: execution.stats.carried_forward,
        lookup_panics,
        elapsed: started.elapsed(),
    };
    ctx.complete_stage(summary, &records);

    records
}

// ═══════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for [`Pipeline`]
///
/// Starts as an empty `I -> I` chain; each [`stage`](Self::stage) call
/// extends it to the stage's output type.
pub struct PipelineBuilder<I, O> {
    chain: Box<dyn StageChain<I, O>>,
    stage_names: Vec<String>,
    options: PipelineOptions,
    dispatcher: Option<ErrorDispatcher>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<I> PipelineBuilder<I, I>
where
    I: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            chain: Box::new(Source),
            stage_names: Vec::new(),
            options: PipelineOptions::default(),
            dispatcher: None,
            metrics: None,
        }
    }
}

impl<I> Default for PipelineBuilder<I, I>
where
    I: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> PipelineBuilder<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    /// Append a stage
    pub fn stage<P>(self, stage: Stage<O, P>) -> PipelineBuilder<I, P>
    where
        P: Send + Sync + 'static,
    {
        let ordinal = self.stage_names.len();
        let mut stage_names = self.stage_names;
        stage_names.push(stage.name().to_string());

        PipelineBuilder {
            chain: Box::new(Chained {
                head: self.chain,
                stage,
                ordinal,
            }),
            stage_names,
            options: self.options,
            dispatcher: self.dispatcher,
            metrics: self.metrics,
        }
    }

    /// Set the run options
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Apply run options and, if enabled, metrics from configuration
    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.options = PipelineOptions::from(&config.run);
        if config.metrics.enabled && self.metrics.is_none() {
            self.metrics = Some(Arc::new(MetricsCollector::new()));
        }
        self
    }

    /// Set the error pass handler
    pub fn with_error_lookup(mut self, handler: impl ErrorLookup + 'static) -> Self {
        self.dispatcher = Some(ErrorDispatcher::new(handler));
        self
    }

    /// Record Prometheus metrics for runs of this pipeline
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the pipeline, validating its stage list and options
    pub fn build(self) -> Result<Pipeline<I, O>, PipelineError> {
        if self.stage_names.is_empty() {
            return Err(PipelineError::NoStages);
        }

        if let Some(ordinal) = self.stage_names.iter().position(|name| name.trim().is_empty()) {
            return Err(PipelineError::InvalidStage {
                ordinal,
                reason: "stage name must not be empty".to_string(),
            });
        }

        if self.options.max_concurrency == Some(0) {
            return Err(PipelineError::InvalidOptions {
                reason: "max_concurrency must be greater than 0".to_string(),
            });
        }

        Ok(Pipeline {
            chain: self.chain,
            stage_names: self.stage_names,
            options: self.options,
            dispatcher: self.dispatcher,
            metrics: self.metrics,
        })
    }
}

/// Staged settlement pipeline from inputs of `I` to records of `O`
///
/// A pipeline is reusable; every [`run`](Self::run) is independent.
pub struct Pipeline<I, O> {
    chain: Box<dyn StageChain<I, O>>,
    stage_names: Vec<String>,
    options: PipelineOptions,
    dispatcher: Option<ErrorDispatcher>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<I, O> Pipeline<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    pub fn stage_count(&self) -> usize {
        self.stage_names.len()
    }

    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run every stage over `inputs` and return the settled records
    ///
    /// Item failures never fail the run; only an invalid input collection
    /// does, and then no stage is entered.
    pub async fn run<In>(&self, inputs: In) -> Result<RunReport<O>, PipelineError>
    where
        In: IntoIterator<Item = PipelineInput<I>>,
    {
        let run_id = RunId::new();
        let records = match settle_inputs(inputs) {
            Ok(records) => records,
            Err(e) => {
                warn!(%run_id, error = %e, "Pipeline run refused");
                if let Some(metrics) = &self.metrics {
                    metrics.record_run_refused();
                }
                return Err(e.into());
            }
        };

        let span = info_span!("pipeline_run", %run_id, stages = self.stage_count());
        self.run_records(run_id, records).instrument(span).await
    }

    /// Run over raw values, indexed by position
    pub async fn run_values<V>(&self, values: V) -> Result<RunReport<O>, PipelineError>
    where
        V: IntoIterator<Item = I>,
    {
        self.run(values.into_iter().map(PipelineInput::Value)).await
    }

    async fn run_records(
        &self,
        run_id: RunId,
        records: Vec<Settled<I>>,
    ) -> Result<RunReport<O>, PipelineError> {
        let items = records.len();
        let started = Instant::now();
        let metrics = self.metrics.as_deref();

        let mut ctx = RunContext::new(
            &self.options,
            self.dispatcher.as_ref(),
            metrics,
            self.stage_count(),
        );

        info!(items, "Pipeline run started");
        let _active = metrics.map(MetricsCollector::record_run_started);

        let records = self.chain.run(records, &mut ctx).await;
        ctx.settle(&records);

        let RunContext {
            transitions,
            summaries,
            ..
        } = ctx;

        let rejected = records.iter().filter(|record| record.is_rejected()).count();
        info!(items, rejected, "Pipeline run settled");
        if let Some(metrics) = metrics {
            metrics.record_run_settled(items, started.elapsed());
        }

        Ok(RunReport {
            run_id,
            records,
            transitions,
            stages: summaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_transitions() {
        assert!(RunState::Initialized.can_advance_to(RunState::Running(0), 2));
        assert!(RunState::Running(0).can_advance_to(RunState::Running(1), 2));
        assert!(RunState::Running(1).can_advance_to(RunState::Settled, 2));

        assert!(!RunState::Initialized.can_advance_to(RunState::Running(0), 0));
        assert!(!RunState::Initialized.can_advance_to(RunState::Settled, 2));
        assert!(!RunState::Running(0).can_advance_to(RunState::Running(2), 3));
        assert!(!RunState::Running(0).can_advance_to(RunState::Settled, 2));
        assert!(!RunState::Running(1).can_advance_to(RunState::Running(2), 2));
        assert!(!RunState::Settled.can_advance_to(RunState::Running(0), 1));
    }

    #[test]
    fn test_options_from_run_config() {
        let config = RunConfig {
            max_concurrency: Some(8),
            dispatch: DispatchMode::EveryStage,
            isolate_lookup_panics: false,
        };

        let options = PipelineOptions::from(&config);
        assert_eq!(options.max_concurrency, Some(8));
        assert_eq!(options.dispatch, DispatchMode::EveryStage);
        assert!(!options.isolate_lookup_panics);
    }

    #[test]
    fn test_options_default() {
        let options = PipelineOptions::default();
        assert_eq!(options.max_concurrency, None);
        assert_eq!(options.dispatch, DispatchMode::Final);
        assert!(options.isolate_lookup_panics);
    }

    #[test]
    fn test_stage_summary_rejected_total() {
        let summary = StageSummary {
            ordinal: 0,
            name: "s".to_string(),
            fulfilled: 1,
            rejected_by_transform: 2,
            rejected_by_validation: 3,
            carried_forward: 4,
            lookup_panics: 0,
            elapsed: Duration::ZERO,
        };
        assert_eq!(summary.rejected(), 9);
    }
}
