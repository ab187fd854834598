use async_trait::async_trait;
use serde_json::Value;
use settle_pipeline_orchestrator::{Pipeline, PipelineBuilder, PipelineOptions, RunReport, Stage};
use settle_pipeline_types::{
    lookup_fn, transform_fn, validate_fn, ErrorLookup, Rejection, Settled, Transform,
    TransformStep,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::error::Result;
use crate::model::{CreateImage, ImageQuery, ImageRecord};
use crate::store::{ImageStore, NewImage};

/// One payload that did not become an image
#[derive(Debug, Clone)]
pub struct IngestFailure {
    pub index: usize,
    pub reason: Rejection,

    /// Stage that rejected the payload
    pub stage: TransformStep,
}

/// Result of ingesting a batch of payloads
#[derive(Debug)]
pub struct IngestOutcome {
    pub report: RunReport<ImageRecord>,
    pub failures: Vec<IngestFailure>,
}

impl IngestOutcome {
    pub fn created(&self) -> impl Iterator<Item = &ImageRecord> {
        self.report.fulfilled().map(|fulfilled| fulfilled.value())
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Collects dispatched rejections for one ingest run
#[derive(Clone, Default)]
struct FailureLog(Arc<Mutex<Vec<(usize, Rejection)>>>);

impl FailureLog {
    fn drain(&self) -> Vec<(usize, Rejection)> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ErrorLookup for FailureLog {
    fn on_rejection(&self, reason: &Rejection, index: usize, _current_rejection: bool) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((index, reason.clone()));
    }
}

/// Writes a validated request through the store
struct Persist {
    store: Arc<dyn ImageStore>,
}

#[async_trait]
impl Transform<CreateImage, ImageRecord> for Persist {
    async fn transform(
        &self,
        request: &CreateImage,
        _index: usize,
        _records: &[Settled<CreateImage>],
    ) -> anyhow::Result<ImageRecord> {
        let size = request.size_bytes()?;
        let zip_file = self.store.upsert_zip_file(&request.zip_path).await?;

        let image = self
            .store
            .create_image(NewImage {
                zip_file_id: zip_file.id,
                filename: request.filename.clone(),
                content_type: request.content_type.clone(),
                size,
                metadata: request.metadata.clone(),
            })
            .await?;
        Ok(image)
    }
}

/// Image catalog backed by an [`ImageStore`]
///
/// Ingestion runs as a two-stage pipeline: `parse` turns raw JSON into a
/// validated [`CreateImage`], `persist` stores it. A bad payload only fails
/// its own item.
#[derive(Clone)]
pub struct ImageCatalog {
    store: Arc<dyn ImageStore>,
    options: PipelineOptions,
}

impl ImageCatalog {
    pub fn new(store: Arc<dyn ImageStore>) -> Self {
        Self {
            store,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    fn pipeline(&self, failures: FailureLog) -> Result<Pipeline<Value, ImageRecord>> {
        let parse = Stage::builder("parse")
            .transform(transform_fn(|payload: &Value, _index: usize| {
                let parsed = CreateImage::from_value(payload.clone()).map_err(anyhow::Error::from);
                async move { parsed }
            }))
            .validate(validate_fn(|request: &CreateImage, _index: usize| {
                let outcome = request.validate().map_err(anyhow::Error::from);
                async move { outcome }
            }))
            .build()?;

        let persist = Stage::new(
            "persist",
            Persist {
                store: self.store.clone(),
            },
        )
        .with_lookup(lookup_fn(
            |image: Option<&ImageRecord>, index: usize, _: &[Settled<ImageRecord>]| {
                if let Some(image) = image {
                    debug!(index, image_id = image.id, filename = %image.filename, "Image stored");
                }
            },
        ));

        let pipeline = PipelineBuilder::new()
            .stage(parse)
            .stage(persist)
            .with_options(self.options.clone())
            .with_error_lookup(failures)
            .build()?;
        Ok(pipeline)
    }

    /// Validate and store a batch of raw image payloads
    pub async fn ingest(&self, payloads: Vec<Value>) -> Result<IngestOutcome> {
        let failures = FailureLog::default();
        let pipeline = self.pipeline(failures.clone())?;

        let submitted = payloads.len();
        let report = pipeline.run_values(payloads).await?;

        let failures: Vec<IngestFailure> = failures
            .drain()
            .into_iter()
            .map(|(index, reason)| IngestFailure {
                index,
                reason,
                stage: report.records[index].transform_step(),
            })
            .collect();

        info!(
            submitted,
            created = submitted - failures.len(),
            failed = failures.len(),
            "Image ingest complete"
        );

        Ok(IngestOutcome { report, failures })
    }

    /// Validate a query and list matching images
    pub async fn query(&self, query: ImageQuery) -> Result<Vec<ImageRecord>> {
        query.validate()?;
        Ok(self.store.find_images(&query).await?)
    }

    /// Parse and run an unvalidated query payload
    pub async fn query_value(&self, payload: Value) -> Result<Vec<ImageRecord>> {
        self.query(ImageQuery::from_value(payload)?).await
    }
}
