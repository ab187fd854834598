use settle_pipeline_types::{PipelineInput, Settled};
use thiserror::Error;

/// Turn an input collection into the initial generation of records
///
/// Raw values and plain outcomes take their position as index; settled
/// records keep their declared index. The resulting indices must cover
/// `0..len` exactly once, and the generation is returned in index order.
pub fn settle_inputs<T, I>(inputs: I) -> Result<Vec<Settled<T>>, InputError>
where
    I: IntoIterator<Item = PipelineInput<T>>,
{
    let inputs: Vec<PipelineInput<T>> = inputs.into_iter().collect();
    let len = inputs.len();
    let mut slots: Vec<Option<Settled<T>>> = std::iter::repeat_with(|| None).take(len).collect();

    for (position, input) in inputs.into_iter().enumerate() {
        let record = input.into_record(position);
        let index = record.index();

        let slot = slots
            .get_mut(index)
            .ok_or(InputError::IndexOutOfRange { index, len })?;

        if slot.is_some() {
            return Err(InputError::DuplicateIndex { index, position });
        }
        *slot = Some(record);
    }

    // Every slot is filled: `len` records landed in `len` distinct slots.
    Ok(slots.into_iter().flatten().collect())
}

/// Input collection errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("input at position {position} repeats index {index}")]
    DuplicateIndex { index: usize, position: usize },

    #[error("index {index} is outside the input collection of {len} items")]
    IndexOutOfRange { index: usize, len: usize },
}
