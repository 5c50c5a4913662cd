use bytes::Bytes;
use serde::Serialize;

/// A file part of an incoming form. Lives for one request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: String,
}

/// Public paths produced by one ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}
