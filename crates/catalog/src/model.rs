use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CatalogError;

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

/// Request to register an image found inside a zip archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateImage {
    #[serde(default)]
    pub zip_path: String,

    #[serde(default)]
    pub filename: String,

    #[serde(default = "default_content_type")]
    pub content_type: String,

    #[serde(default)]
    pub size: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl CreateImage {
    pub fn new(zip_path: impl Into<String>, filename: impl Into<String>, size: i64) -> Self {
        Self {
            zip_path: zip_path.into(),
            filename: filename.into(),
            content_type: default_content_type(),
            size: Some(size),
            metadata: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Parse an unvalidated JSON payload
    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        serde_json::from_value(value).map_err(|e| CatalogError::InvalidImage(e.to_string()))
    }

    /// Check the creation rules, reporting every violated rule at once
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut issues = Vec::new();

        if self.zip_path.is_empty() {
            issues.push("Zip path is required");
        }
        if self.filename.is_empty() {
            issues.push("Filename is required");
        }
        if !matches!(self.size, Some(size) if size > 0) {
            issues.push("Size must be a positive integer");
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::InvalidImage(issues.join("; ")))
        }
    }

    /// Validated size in bytes
    pub fn size_bytes(&self) -> Result<u64, CatalogError> {
        self.size
            .filter(|size| *size > 0)
            .map(|size| size as u64)
            .ok_or_else(|| CatalogError::InvalidImage("Size must be a positive integer".to_string()))
    }
}

/// Image lookup by archive, optionally narrowed by filename substring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageQuery {
    #[serde(default)]
    pub zip_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

impl ImageQuery {
    pub fn new(zip_path: impl Into<String>) -> Self {
        Self {
            zip_path: zip_path.into(),
            image_name: None,
        }
    }

    pub fn with_image_name(mut self, image_name: impl Into<String>) -> Self {
        self.image_name = Some(image_name.into());
        self
    }

    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        serde_json::from_value(value).map_err(|e| CatalogError::InvalidQuery(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.zip_path.is_empty() {
            return Err(CatalogError::InvalidQuery("Zip path is required".to_string()));
        }
        Ok(())
    }

    /// Whether `image` belongs to the queried archive and matches the name filter
    pub fn matches(&self, zip_path: &str, image: &ImageRecord) -> bool {
        zip_path == self.zip_path
            && self
                .image_name
                .as_deref()
                .map_or(true, |name| image.filename.contains(name))
    }
}

/// Archive that images are registered against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipFile {
    pub id: u64,
    pub zip_path: String,
    pub created_at: DateTime<Utc>,
}

/// Stored image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: u64,
    pub zip_file_id: u64,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}
