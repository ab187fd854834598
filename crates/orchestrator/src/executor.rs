use futures::{future, stream, StreamExt};
use settle_pipeline_types::{Rejection, Settled, Transform, TransformStep};
use std::future::Future;
use tracing::debug;

/// Drive every future to completion and return outputs in input order
///
/// With a limit, at most `limit` futures are polled at once; completion order
/// never affects output order.
pub(crate) async fn fan_out<I, F>(futures: I, limit: Option<usize>) -> Vec<F::Output>
where
    I: IntoIterator<Item = F>,
    F: Future,
{
    match limit {
        Some(limit) => {
            stream::iter(futures)
                .buffered(limit.max(1))
                .collect()
                .await
        }
        None => future::join_all(futures).await,
    }
}

/// Item counts produced by one stage's transform pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Transform completed
    pub fulfilled: usize,

    /// Transform failed at this stage
    pub rejected: usize,

    /// Already rejected on entry, transform skipped
    pub carried_forward: usize,
}

/// Next generation of records produced by a stage
#[derive(Debug)]
pub struct Execution<U> {
    pub records: Vec<Settled<U>>,
    pub stats: ExecutionStats,
}

/// Applies one stage's transform across a generation of records
#[derive(Debug, Clone, Copy)]
pub struct StageExecutor {
    ordinal: usize,
    max_concurrency: Option<usize>,
}

impl StageExecutor {
    pub fn new(ordinal: usize, max_concurrency: Option<usize>) -> Self {
        Self {
            ordinal,
            max_concurrency,
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Provenance stamped on records this stage changes
    pub fn step(&self) -> TransformStep {
        TransformStep::Stage(self.ordinal)
    }

    /// Produce the next generation from `records`
    ///
    /// The output has the same length and index order as the input. Rejected
    /// records skip the transform and are carried forward with
    /// `current_rejection = Some(false)`.
    pub async fn execute<T, U>(
        &self,
        transform: &dyn Transform<T, U>,
        records: Vec<Settled<T>>,
    ) -> Execution<U>
    where
        T: Send + Sync,
        U: Send,
    {
        let step = self.step();
        let ordinal = self.ordinal;
        let generation = records.as_slice();

        // Owned futures keep the stage future Send.
        let pending: Vec<_> = generation.iter().map(|record| async move {
            match record {
                Settled::Fulfilled(fulfilled) => {
                    let index = fulfilled.index();
                    match transform
                        .transform(fulfilled.value(), index, generation)
                        .await
                    {
                        Ok(value) => Settled::fulfilled(value, index, step),
                        Err(error) => {
                            debug!(stage = ordinal, index, error = %error, "Transform rejected item");
                            Settled::rejected(Rejection::from(error), index, step, Some(true))
                        }
                    }
                }
                Settled::Rejected(rejected) => {
                    Settled::Rejected(rejected.clone().carried_forward())
                }
            }
        }).collect();

        let next = fan_out(pending, self.max_concurrency).await;

        let mut stats = ExecutionStats::default();
        for record in &next {
            match record.current_rejection() {
                None => stats.fulfilled += 1,
                Some(true) => stats.rejected += 1,
                Some(false) => stats.carried_forward += 1,
            }
        }

        Execution {
            records: next,
            stats,
        }
    }
}
