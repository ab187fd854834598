//! Observation hooks run after a stage's transform pass
//!
//! Validation may only downgrade fulfilled records. Lookup never changes a
//! record; a panicking lookup is a caller defect and is isolated per item.

use settle_pipeline_types::{Lookup, Rejection, Settled, TransformStep, Validate};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

use crate::executor::fan_out;

/// Run `validate` over every fulfilled record of a generation
///
/// Returns the replacement generation and the number of downgraded items.
/// Each failure rejects only its own item, stamped with `step` and
/// `current_rejection = Some(true)`.
pub async fn validate_generation<U>(
    validate: &dyn Validate<U>,
    step: TransformStep,
    records: Vec<Settled<U>>,
    max_concurrency: Option<usize>,
) -> (Vec<Settled<U>>, usize)
where
    U: Send + Sync,
{
    let failures: Vec<Option<Rejection>> = {
        let generation = records.as_slice();
        let pending: Vec<_> = generation.iter().map(|record| async move {
            match record {
                Settled::Fulfilled(fulfilled) => validate
                    .validate(fulfilled.value(), fulfilled.index(), generation)
                    .await
                    .err()
                    .map(Rejection::from),
                Settled::Rejected(_) => None,
            }
        }).collect();
        fan_out(pending, max_concurrency).await
    };

    let mut downgraded = 0;
    let records = records
        .into_iter()
        .zip(failures)
        .map(|(record, failure)| match failure {
            Some(reason) => {
                downgraded += 1;
                let index = record.index();
                debug!(step = %step, index, reason = %reason, "Validation downgraded item");
                Settled::rejected(reason, index, step, Some(true))
            }
            None => record,
        })
        .collect();

    (records, downgraded)
}

/// Run `lookup` over every record of a generation in index order
///
/// Returns the number of lookups that panicked. When `isolate` is false the
/// first panic is resumed on the caller.
pub fn lookup_generation<U>(
    lookup: &dyn Lookup<U>,
    stage: &str,
    records: &[Settled<U>],
    isolate: bool,
) -> usize {
    let mut panics = 0;

    for record in records {
        let index = record.index();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            lookup.lookup(record.value(), index, records)
        }));

        if let Err(payload) = outcome {
            if !isolate {
                panic::resume_unwind(payload);
            }

            panics += 1;
            error!(
                stage,
                index,
                error_type = "lookup_panic",
                panic = %panic_message(payload.as_ref()),
                "Lookup hook panicked, pipeline state unaffected"
            );
        }
    }

    panics
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
