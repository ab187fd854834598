//! Image catalog ingestion built on the staged settlement pipeline

pub mod error;
pub mod model;
pub mod service;
pub mod store;

pub use error::{CatalogError, Result, StoreError};
pub use model::{CreateImage, ImageQuery, ImageRecord, ZipFile, DEFAULT_CONTENT_TYPE};
pub use service::{ImageCatalog, IngestFailure, IngestOutcome};
pub use store::{ImageStore, InMemoryImageStore, NewImage};
