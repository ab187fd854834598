use settle_pipeline_types::{Lookup, Transform, Validate};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One ordered step of a pipeline: a transform plus optional hooks
pub struct Stage<T, U> {
    name: String,
    pub(crate) transform: Arc<dyn Transform<T, U>>,
    pub(crate) lookup: Option<Arc<dyn Lookup<U>>>,
    pub(crate) validate: Option<Arc<dyn Validate<U>>>,
}

impl<T, U> Stage<T, U> {
    pub fn new(name: impl Into<String>, transform: impl Transform<T, U> + 'static) -> Self {
        Self {
            name: name.into(),
            transform: Arc::new(transform),
            lookup: None,
            validate: None,
        }
    }

    pub fn builder(name: impl Into<String>) -> StageBuilder<T, U> {
        StageBuilder::new(name)
    }

    /// Attach a side-effect observer
    pub fn with_lookup(mut self, lookup: impl Lookup<U> + 'static) -> Self {
        self.lookup = Some(Arc::new(lookup));
        self
    }

    /// Attach a gatekeeper that may downgrade fulfilled items
    pub fn with_validate(mut self, validate: impl Validate<U> + 'static) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_lookup(&self) -> bool {
        self.lookup.is_some()
    }

    pub fn has_validate(&self) -> bool {
        self.validate.is_some()
    }
}

impl<T, U> fmt::Debug for Stage<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("lookup", &self.has_lookup())
            .field("validate", &self.has_validate())
            .finish()
    }
}

/// Builder error
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("missing required field: {field}")]
    MissingField { field: String },
}

/// Builder for [`Stage`]
pub struct StageBuilder<T, U> {
    name: String,
    transform: Option<Arc<dyn Transform<T, U>>>,
    lookup: Option<Arc<dyn Lookup<U>>>,
    validate: Option<Arc<dyn Validate<U>>>,
}

impl<T, U> StageBuilder<T, U> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: None,
            lookup: None,
            validate: None,
        }
    }

    /// Set the transform
    pub fn transform(mut self, transform: impl Transform<T, U> + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Set the lookup hook
    pub fn lookup(mut self, lookup: impl Lookup<U> + 'static) -> Self {
        self.lookup = Some(Arc::new(lookup));
        self
    }

    /// Set the validate hook
    pub fn validate(mut self, validate: impl Validate<U> + 'static) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Build the stage, validating that a transform is set
    pub fn build(self) -> Result<Stage<T, U>, BuilderError> {
        let transform = self.transform.ok_or_else(|| BuilderError::MissingField {
            field: "transform".to_string(),
        })?;

        Ok(Stage {
            name: self.name,
            transform,
            lookup: self.lookup,
            validate: self.validate,
        })
    }
}
