use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rejection::Rejection;

// ═══════════════════════════════════════════════════════════════════════════
// PROVENANCE
// ═══════════════════════════════════════════════════════════════════════════

/// Ordinal of the stage that most recently established a record's status
///
/// Serialized as a signed integer where `-1` stands for [`TransformStep::Initial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum TransformStep {
    /// Untransformed input, no stage has touched the record yet
    Initial,

    /// Established by the stage with this ordinal
    Stage(usize),
}

impl TransformStep {
    /// Wire value of [`TransformStep::Initial`]
    pub const INITIAL_SENTINEL: i64 = -1;

    pub fn is_initial(&self) -> bool {
        matches!(self, TransformStep::Initial)
    }

    /// Stage ordinal, if any stage has produced the record
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            TransformStep::Initial => None,
            TransformStep::Stage(ordinal) => Some(*ordinal),
        }
    }

    pub fn as_i64(&self) -> i64 {
        i64::from(*self)
    }
}

impl Default for TransformStep {
    fn default() -> Self {
        TransformStep::Initial
    }
}

impl From<i64> for TransformStep {
    fn from(value: i64) -> Self {
        if value < 0 {
            TransformStep::Initial
        } else {
            TransformStep::Stage(value as usize)
        }
    }
}

impl From<TransformStep> for i64 {
    fn from(step: TransformStep) -> Self {
        match step {
            TransformStep::Initial => TransformStep::INITIAL_SENTINEL,
            TransformStep::Stage(ordinal) => ordinal as i64,
        }
    }
}

impl fmt::Display for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// Settlement status discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Fulfilled,
    Rejected,
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementStatus::Fulfilled => f.write_str("fulfilled"),
            SettlementStatus::Rejected => f.write_str("rejected"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════

/// Successful outcome for one input item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfilled<T> {
    value: T,
    index: usize,
    transform_step: TransformStep,
}

impl<T> Fulfilled<T> {
    pub fn new(value: T, index: usize, transform_step: TransformStep) -> Self {
        Self {
            value,
            index,
            transform_step,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn transform_step(&self) -> TransformStep {
        self.transform_step
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Failed outcome for one input item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejected {
    reason: Rejection,
    index: usize,
    transform_step: TransformStep,

    /// `Some(true)` when the producing stage caused the rejection,
    /// `Some(false)` when it was carried forward from an earlier stage,
    /// `None` when provenance is unknown (entered the pipeline already rejected).
    current_rejection: Option<bool>,
}

impl Rejected {
    pub fn new(
        reason: Rejection,
        index: usize,
        transform_step: TransformStep,
        current_rejection: Option<bool>,
    ) -> Self {
        Self {
            reason,
            index,
            transform_step,
            current_rejection,
        }
    }

    pub fn reason(&self) -> &Rejection {
        &self.reason
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn transform_step(&self) -> TransformStep {
        self.transform_step
    }

    pub fn current_rejection(&self) -> Option<bool> {
        self.current_rejection
    }

    /// Same rejection as seen by a later stage: reason, index and step are
    /// kept, only the origin flag is cleared.
    pub fn carried_forward(self) -> Self {
        Self {
            current_rejection: Some(false),
            ..self
        }
    }
}

/// Settlement record carried per input item through the pipeline
///
/// Exactly one of value or reason exists, decided by the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settled<T> {
    Fulfilled(Fulfilled<T>),
    Rejected(Rejected),
}

impl<T> Settled<T> {
    pub fn fulfilled(value: T, index: usize, transform_step: TransformStep) -> Self {
        Settled::Fulfilled(Fulfilled::new(value, index, transform_step))
    }

    pub fn rejected(
        reason: Rejection,
        index: usize,
        transform_step: TransformStep,
        current_rejection: Option<bool>,
    ) -> Self {
        Settled::Rejected(Rejected::new(
            reason,
            index,
            transform_step,
            current_rejection,
        ))
    }

    /// Untransformed input at its original position
    pub fn initial(value: T, index: usize) -> Self {
        Self::fulfilled(value, index, TransformStep::Initial)
    }

    pub fn status(&self) -> SettlementStatus {
        match self {
            Settled::Fulfilled(_) => SettlementStatus::Fulfilled,
            Settled::Rejected(_) => SettlementStatus::Rejected,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settled::Rejected(_))
    }

    pub fn index(&self) -> usize {
        match self {
            Settled::Fulfilled(fulfilled) => fulfilled.index,
            Settled::Rejected(rejected) => rejected.index,
        }
    }

    pub fn transform_step(&self) -> TransformStep {
        match self {
            Settled::Fulfilled(fulfilled) => fulfilled.transform_step,
            Settled::Rejected(rejected) => rejected.transform_step,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Settled::Fulfilled(fulfilled) => Some(&fulfilled.value),
            Settled::Rejected(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&Rejection> {
        match self {
            Settled::Fulfilled(_) => None,
            Settled::Rejected(rejected) => Some(&rejected.reason),
        }
    }

    /// Rejection provenance; always `None` for fulfilled records
    pub fn current_rejection(&self) -> Option<bool> {
        match self {
            Settled::Fulfilled(_) => None,
            Settled::Rejected(rejected) => rejected.current_rejection,
        }
    }

    pub fn as_result(&self) -> Result<&T, &Rejection> {
        match self {
            Settled::Fulfilled(fulfilled) => Ok(&fulfilled.value),
            Settled::Rejected(rejected) => Err(&rejected.reason),
        }
    }

    pub fn into_result(self) -> Result<T, Rejection> {
        match self {
            Settled::Fulfilled(fulfilled) => Ok(fulfilled.value),
            Settled::Rejected(rejected) => Err(rejected.reason),
        }
    }
}

impl<T> From<Fulfilled<T>> for Settled<T> {
    fn from(fulfilled: Fulfilled<T>) -> Self {
        Settled::Fulfilled(fulfilled)
    }
}

impl<T> From<Rejected> for Settled<T> {
    fn from(rejected: Rejected) -> Self {
        Settled::Rejected(rejected)
    }
}
