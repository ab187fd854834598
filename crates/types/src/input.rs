use crate::rejection::Rejection;
use crate::settled::{Settled, TransformStep};

/// One entry of a pipeline's input collection
///
/// Inputs may mix raw values with work that was already settled upstream.
#[derive(Debug, Clone)]
pub enum PipelineInput<T> {
    /// Raw value; becomes a fulfilled record at its position
    Value(T),

    /// Plain settled outcome; indexed by its position, rejections enter with
    /// unknown provenance
    Outcome(Result<T, Rejection>),

    /// Record produced elsewhere; keeps its own index and provenance
    Settled(Settled<T>),
}

impl<T> PipelineInput<T> {
    /// Wrap a collection of raw values
    pub fn values<I>(values: I) -> Vec<PipelineInput<T>>
    where
        I: IntoIterator<Item = T>,
    {
        values.into_iter().map(PipelineInput::Value).collect()
    }

    /// Index this entry declares for itself, if any
    pub fn declared_index(&self) -> Option<usize> {
        match self {
            PipelineInput::Settled(record) => Some(record.index()),
            PipelineInput::Value(_) | PipelineInput::Outcome(_) => None,
        }
    }

    /// Materialize the initial settlement record for this entry
    pub fn into_record(self, position: usize) -> Settled<T> {
        match self {
            PipelineInput::Value(value) => Settled::initial(value, position),
            PipelineInput::Outcome(Ok(value)) => Settled::initial(value, position),
            PipelineInput::Outcome(Err(reason)) => {
                Settled::rejected(reason, position, TransformStep::Initial, None)
            }
            PipelineInput::Settled(record) => record,
        }
    }
}

impl<T> From<Settled<T>> for PipelineInput<T> {
    fn from(record: Settled<T>) -> Self {
        PipelineInput::Settled(record)
    }
}

impl<T, E> From<Result<T, E>> for PipelineInput<T>
where
    E: Into<Rejection>,
{
    fn from(result: Result<T, E>) -> Self {
        PipelineInput::Outcome(result.map_err(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_becomes_initial_record() {
        let record = PipelineInput::Value(9).into_record(2);
        assert!(record.is_fulfilled());
        assert_eq!(record.index(), 2);
        assert_eq!(record.transform_step(), TransformStep::Initial);
    }

    #[test]
    fn test_failed_outcome_has_unknown_provenance() {
        let input: PipelineInput<i32> = Err::<i32, _>(anyhow::anyhow!("upstream")).into();
        let record = input.into_record(0);

        assert!(record.is_rejected());
        assert_eq!(record.current_rejection(), None);
        assert_eq!(record.transform_step(), TransformStep::Initial);
        assert_eq!(record.reason().unwrap().to_string(), "upstream");
    }

    #[test]
    fn test_settled_input_keeps_its_index() {
        let input = PipelineInput::from(Settled::fulfilled("x", 5, TransformStep::Stage(1)));
        assert_eq!(input.declared_index(), Some(5));

        let record = input.into_record(0);
        assert_eq!(record.index(), 5);
        assert_eq!(record.transform_step(), TransformStep::Stage(1));
    }

    #[test]
    fn test_values_helper() {
        let inputs = PipelineInput::values(vec![1, 2, 3]);
        assert_eq!(inputs.len(), 3);
        assert!(inputs.iter().all(|input| input.declared_index().is_none()));
    }
}
