use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::{
    dto::{IngestOutcome, UploadedImage},
    sanitize::sanitize_file_name,
    transform::{self, essence, Optimized, RasterFormat, TransformSettings},
};
use crate::{
    config::ImageConfig,
    storage::{AssetStore, StorageError},
};

const OPTIMIZED_SUFFIX: &str = "-optimized";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported media type {0:?}: only image uploads are accepted")]
    UnsupportedMediaType(String),
    #[error("unsupported image format {0:?}: only JPEG and PNG can be optimized")]
    UnsupportedFormat(String),
    #[error("image could not be decoded: {0}")]
    Decode(String),
    #[error("upload is empty")]
    EmptyUpload,
    #[error("upload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("file name {0:?} has no usable characters")]
    InvalidFileName(String),
    #[error("image processing timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("image pipeline: {0}")]
    Internal(String),
}

/// Accepts uploaded images, optionally optimizes them and writes them to the
/// asset store.
pub struct ImagePipeline {
    store: Arc<dyn AssetStore>,
    max_upload_bytes: usize,
    optimize: bool,
    keep_original: bool,
    transform: TransformSettings,
    process_timeout: Duration,
    workers: Arc<Semaphore>,
}

impl ImagePipeline {
    pub fn new(store: Arc<dyn AssetStore>, cfg: &ImageConfig) -> Self {
        Self {
            store,
            max_upload_bytes: cfg.max_upload_bytes,
            optimize: cfg.optimize,
            keep_original: cfg.keep_original,
            transform: TransformSettings {
                max_dimension: cfg.max_dimension,
                jpeg_quality: cfg.jpeg_quality,
            },
            process_timeout: cfg.process_timeout,
            workers: Arc::new(Semaphore::new(cfg.workers.max(1))),
        }
    }

    pub async fn ingest(&self, upload: UploadedImage) -> Result<IngestOutcome, IngestError> {
        self.ingest_stamped(upload, unix_micros()).await
    }

    #[instrument(
        skip(self, upload),
        fields(
            file_name = %upload.file_name,
            content_type = %upload.content_type,
            size = upload.bytes.len()
        )
    )]
    pub(crate) async fn ingest_stamped(
        &self,
        upload: UploadedImage,
        stamp: i128,
    ) -> Result<IngestOutcome, IngestError> {
        let UploadedImage {
            bytes,
            content_type,
            file_name,
        } = upload;

        if !essence(&content_type).starts_with("image/") {
            warn!("rejected non-image upload");
            return Err(IngestError::UnsupportedMediaType(content_type));
        }
        if bytes.is_empty() {
            return Err(IngestError::EmptyUpload);
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(IngestError::TooLarge {
                size: bytes.len(),
                max: self.max_upload_bytes,
            });
        }

        let clean = sanitize_file_name(&file_name)?;

        if !self.optimize {
            let name = format!("{}-{}", stamp, clean.file_name());
            self.store.put_object(&name, bytes).await?;
            info!(asset = %name, "image stored");
            return Ok(IngestOutcome {
                path: self.store.public_path(&name),
                original: None,
                width: None,
                height: None,
            });
        }

        let format = RasterFormat::from_mime(&content_type)
            .ok_or_else(|| IngestError::UnsupportedFormat(content_type.clone()))?;

        let optimized = self.run_transform(bytes.clone(), format).await?;
        let name = format!(
            "{}-{}{}.{}",
            stamp,
            clean.stem,
            OPTIMIZED_SUFFIX,
            format.extension()
        );
        self.store
            .put_object(&name, Bytes::from(optimized.bytes))
            .await?;

        let original = if self.keep_original {
            let raw_name = format!("{}-{}.{}", stamp, clean.stem, format.extension());
            if let Err(e) = self.store.put_object(&raw_name, bytes).await {
                self.remove_quietly(&name).await;
                return Err(e.into());
            }
            Some(self.store.public_path(&raw_name))
        } else {
            None
        };

        info!(
            asset = %name,
            width = optimized.width,
            height = optimized.height,
            "image optimized and stored"
        );
        Ok(IngestOutcome {
            path: self.store.public_path(&name),
            original,
            width: Some(optimized.width),
            height: Some(optimized.height),
        })
    }

    /// Deletes the asset behind a stored public path along with its retained
    /// raw upload, if any. Failures are logged, never returned.
    pub async fn release(&self, public_path: &str) {
        let Some(name) = self.store.name_from_public_path(public_path) else {
            warn!(path = public_path, "refusing to release asset outside the upload root");
            return;
        };
        let sibling = original_sibling(&name);
        self.remove_quietly(&name).await;
        if let Some(raw) = sibling {
            self.remove_quietly(&raw).await;
        }
    }

    async fn remove_quietly(&self, name: &str) {
        match self.store.delete_object(name).await {
            Ok(true) => info!(asset = name, "asset released"),
            Ok(false) => debug!(asset = name, "asset already gone"),
            Err(e) => warn!(error = %e, asset = name, "failed to release asset"),
        }
    }

    async fn run_transform(
        &self,
        bytes: Bytes,
        format: RasterFormat,
    ) -> Result<Optimized, IngestError> {
        let settings = self.transform;
        let workers = self.workers.clone();
        let work = async move {
            let permit = workers
                .acquire_owned()
                .await
                .map_err(|_| IngestError::Internal("image worker pool closed".into()))?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                transform::optimize(&bytes, format, &settings)
            })
            .await
            .map_err(|e| IngestError::Internal(format!("image task failed: {}", e)))?
        };

        match tokio::time::timeout(self.process_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.process_timeout, "image processing timed out");
                Err(IngestError::Timeout(self.process_timeout))
            }
        }
    }
}

fn unix_micros() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000
}

/// `"17-photo-optimized.jpg"` -> `Some("17-photo.jpg")`
fn original_sibling(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    let base = stem.strip_suffix(OPTIMIZED_SUFFIX)?;
    Some(format!("{}.{}", base, ext))
}
