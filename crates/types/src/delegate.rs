//! Delegate contracts invoked by the pipeline
//!
//! Each trait has a closure adapter (`transform_fn`, `lookup_fn`,
//! `validate_fn`, `error_lookup_fn`) for callers that do not need a named type.

use async_trait::async_trait;
use std::future::Future;

use crate::rejection::Rejection;
use crate::settled::Settled;

/// Transforms a fulfilled value of type `T` into a value of type `U`
///
/// `records` is the whole generation the stage is reading from. An `Err`
/// becomes a rejection for this item only.
#[async_trait]
pub trait Transform<T, U>: Send + Sync {
    async fn transform(&self, value: &T, index: usize, records: &[Settled<T>])
        -> anyhow::Result<U>;
}

/// Side-effect only observer of a stage's output
///
/// Called for every record in index order. `value` is `None` for rejected
/// records, which can still be inspected through `records`.
pub trait Lookup<U>: Send + Sync {
    fn lookup(&self, value: Option<&U>, index: usize, records: &[Settled<U>]);
}

/// Gatekeeper over a stage's fulfilled output
///
/// An `Err` downgrades the item to rejected at the validating stage.
#[async_trait]
pub trait Validate<U>: Send + Sync {
    async fn validate(&self, value: &U, index: usize, records: &[Settled<U>])
        -> anyhow::Result<()>;
}

/// Receives rejected items from the error pass
pub trait ErrorLookup: Send + Sync {
    fn on_rejection(&self, reason: &Rejection, index: usize, current_rejection: bool);
}

// ═══════════════════════════════════════════════════════════════════════════
// CLOSURE ADAPTERS
// ═══════════════════════════════════════════════════════════════════════════

/// [`Transform`] backed by a closure returning an owned future
pub struct TransformFn<F>(F);

/// Adapt `Fn(&T, usize) -> impl Future<Output = anyhow::Result<U>>`
///
/// The closure reads what it needs from `&T` before building the future, so
/// the future itself owns its data.
pub fn transform_fn<T, U, F, Fut>(f: F) -> TransformFn<F>
where
    F: Fn(&T, usize) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<U>> + Send,
{
    TransformFn(f)
}

#[async_trait]
impl<T, U, F, Fut> Transform<T, U> for TransformFn<F>
where
    T: Send + Sync,
    U: Send,
    F: Fn(&T, usize) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<U>> + Send,
{
    async fn transform(
        &self,
        value: &T,
        index: usize,
        _records: &[Settled<T>],
    ) -> anyhow::Result<U> {
        (self.0)(value, index).await
    }
}

/// [`Lookup`] backed by a closure
pub struct LookupFn<F>(F);

pub fn lookup_fn<U, F>(f: F) -> LookupFn<F>
where
    F: Fn(Option<&U>, usize, &[Settled<U>]) + Send + Sync,
{
    LookupFn(f)
}

impl<U, F> Lookup<U> for LookupFn<F>
where
    F: Fn(Option<&U>, usize, &[Settled<U>]) + Send + Sync,
{
    fn lookup(&self, value: Option<&U>, index: usize, records: &[Settled<U>]) {
        (self.0)(value, index, records)
    }
}

/// [`Validate`] backed by a closure returning an owned future
pub struct ValidateFn<F>(F);

pub fn validate_fn<U, F, Fut>(f: F) -> ValidateFn<F>
where
    F: Fn(&U, usize) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    ValidateFn(f)
}

#[async_trait]
impl<U, F, Fut> Validate<U> for ValidateFn<F>
where
    U: Send + Sync,
    F: Fn(&U, usize) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn validate(
        &self,
        value: &U,
        index: usize,
        _records: &[Settled<U>],
    ) -> anyhow::Result<()> {
        (self.0)(value, index).await
    }
}

/// [`ErrorLookup`] backed by a closure
pub struct ErrorLookupFn<F>(F);

pub fn error_lookup_fn<F>(f: F) -> ErrorLookupFn<F>
where
    F: Fn(&Rejection, usize, bool) + Send + Sync,
{
    ErrorLookupFn(f)
}

impl<F> ErrorLookup for ErrorLookupFn<F>
where
    F: Fn(&Rejection, usize, bool) + Send + Sync,
{
    fn on_rejection(&self, reason: &Rejection, index: usize, current_rejection: bool) {
        (self.0)(reason, index, current_rejection)
    }
}
