//! Settlement model for the staged settlement pipeline
//!
//! A [`Settled`] record is the unit of state carried per input item. It is
//! either [`Fulfilled`] with a value or [`Rejected`] with a [`Rejection`],
//! and always carries its original index plus the [`TransformStep`] that
//! established its current status.

pub mod delegate;
pub mod input;
pub mod rejection;
pub mod settled;

pub use delegate::*;
pub use input::*;
pub use rejection::*;
pub use settled::*;
