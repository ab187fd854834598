use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::model::{ImageQuery, ImageRecord, ZipFile};

/// Image to insert once its archive is known
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub zip_file_id: u64,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub metadata: Option<Map<String, Value>>,
}

/// Image storage trait - can be implemented for different backends
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetch the archive for `zip_path`, creating it if absent
    async fn upsert_zip_file(&self, zip_path: &str) -> Result<ZipFile, StoreError>;

    /// Store a new image
    async fn create_image(&self, image: NewImage) -> Result<ImageRecord, StoreError>;

    /// List images matching a query, in insertion order
    async fn find_images(&self, query: &ImageQuery) -> Result<Vec<ImageRecord>, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    zip_files: HashMap<String, ZipFile>,
    images: Vec<ImageRecord>,
    next_zip_id: u64,
    next_image_id: u64,
}

/// In-memory [`ImageStore`]
#[derive(Debug, Default)]
pub struct InMemoryImageStore {
    tables: RwLock<Tables>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored images
    pub async fn len(&self) -> usize {
        self.tables.read().await.images.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.images.is_empty()
    }

    pub async fn zip_file_count(&self) -> usize {
        self.tables.read().await.zip_files.len()
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn upsert_zip_file(&self, zip_path: &str) -> Result<ZipFile, StoreError> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.zip_files.get(zip_path) {
            return Ok(existing.clone());
        }

        tables.next_zip_id += 1;
        let zip_file = ZipFile {
            id: tables.next_zip_id,
            zip_path: zip_path.to_string(),
            created_at: Utc::now(),
        };
        tables
            .zip_files
            .insert(zip_path.to_string(), zip_file.clone());
        Ok(zip_file)
    }

    async fn create_image(&self, image: NewImage) -> Result<ImageRecord, StoreError> {
        let mut tables = self.tables.write().await;

        let zip_path = tables
            .zip_files
            .values()
            .find(|zip| zip.id == image.zip_file_id)
            .map(|zip| zip.zip_path.clone())
            .ok_or(StoreError::ZipFileNotFound(image.zip_file_id))?;

        let duplicate = tables
            .images
            .iter()
            .any(|existing| existing.zip_file_id == image.zip_file_id && existing.filename == image.filename);
        if duplicate {
            return Err(StoreError::DuplicateImage {
                zip_path,
                filename: image.filename,
            });
        }

        tables.next_image_id += 1;
        let record = ImageRecord {
            id: tables.next_image_id,
            zip_file_id: image.zip_file_id,
            filename: image.filename,
            content_type: image.content_type,
            size: image.size,
            metadata: image.metadata,
            created_at: Utc::now(),
        };
        tables.images.push(record.clone());
        Ok(record)
    }

    async fn find_images(&self, query: &ImageQuery) -> Result<Vec<ImageRecord>, StoreError> {
        let tables = self.tables.read().await;

        let Some(zip_file) = tables.zip_files.get(&query.zip_path) else {
            return Ok(Vec::new());
        };

        Ok(tables
            .images
            .iter()
            .filter(|image| image.zip_file_id == zip_file.id)
            .filter(|image| query.matches(&zip_file.zip_path, image))
            .cloned()
            .collect())
    }
}
