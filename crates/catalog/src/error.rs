use settle_pipeline_orchestrator::{BuilderError, PipelineError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Invalid query parameters: {0}")]
    InvalidQuery(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("stage builder error: {0}")]
    Builder(#[from] BuilderError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("zip file not found: {0}")]
    ZipFileNotFound(u64),

    #[error("duplicate image {filename} in {zip_path}")]
    DuplicateImage { zip_path: String, filename: String },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
