use settle_pipeline_types::{ErrorLookup, Settled};
use std::fmt;

/// Counts from one error pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Rejected by the stage that produced the generation
    pub current: usize,

    /// Rejected earlier and carried forward
    pub carried: usize,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.current + self.carried
    }
}

/// Routes rejected records to a caller-supplied handler
pub struct ErrorDispatcher {
    handler: Box<dyn ErrorLookup>,
}

impl ErrorDispatcher {
    pub fn new(handler: impl ErrorLookup + 'static) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Hand every rejected record to the handler in index order
    ///
    /// Unknown provenance is reported as `current_rejection = false`.
    pub fn dispatch<U>(&self, records: &[Settled<U>]) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for record in records {
            if let Settled::Rejected(rejected) = record {
                let current = rejected.current_rejection().unwrap_or(false);
                self.handler
                    .on_rejection(rejected.reason(), rejected.index(), current);

                if current {
                    summary.current += 1;
                } else {
                    summary.carried += 1;
                }
            }
        }

        summary
    }
}

impl fmt::Debug for ErrorDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorDispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_pipeline_types::{error_lookup_fn, Rejection, TransformStep};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_dispatch_in_index_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = {
            let seen = seen.clone();
            ErrorDispatcher::new(error_lookup_fn(
                move |reason: &Rejection, index: usize, current: bool| {
                    seen.lock().unwrap().push((reason.to_string(), index, current));
                },
            ))
        };

        let records: Vec<Settled<i32>> = vec![
            Settled::rejected(Rejection::msg("early"), 0, TransformStep::Stage(0), Some(false)),
            Settled::fulfilled(3, 1, TransformStep::Stage(1)),
            Settled::rejected(Rejection::msg("late"), 2, TransformStep::Stage(1), Some(true)),
            Settled::rejected(Rejection::msg("unknown"), 3, TransformStep::Initial, None),
        ];

        let summary = dispatcher.dispatch(&records);

        assert_eq!(summary, DispatchSummary { current: 1, carried: 2 });
        assert_eq!(summary.total(), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("early".to_string(), 0, false),
                ("late".to_string(), 2, true),
                ("unknown".to_string(), 3, false),
            ]
        );
    }

    #[test]
    fn test_dispatch_nothing_rejected() {
        let dispatcher = ErrorDispatcher::new(error_lookup_fn(|_: &Rejection, _: usize, _: bool| {
            panic!("handler must not be called");
        }));

        let records: Vec<Settled<i32>> = vec![Settled::initial(1, 0)];
        assert_eq!(dispatcher.dispatch(&records), DispatchSummary::default());
        assert_eq!(dispatcher.dispatch::<i32>(&[]), DispatchSummary::default());
    }
}
