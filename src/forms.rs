use std::collections::HashMap;

use axum::extract::Multipart;
use tracing::debug;

use crate::{error::AppError, images::dto::UploadedImage};

/// A `multipart/form-data` body split into text fields and file parts.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedImage>,
}

impl FormData {
    pub async fn read(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();
        while let Some(field) = mp.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_owned();
                    let bytes = field.bytes().await?;
                    // a file input left blank still submits an empty part
                    if file_name.is_empty() && bytes.is_empty() {
                        debug!(field = %name, "skipping empty file part");
                        continue;
                    }
                    form.files.insert(
                        name,
                        UploadedImage {
                            bytes,
                            content_type,
                            file_name,
                        },
                    );
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    /// Text value, `None` when missing or blank.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.text(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("1" | "true" | "on" | "yes")
        )
    }

    pub fn take_file(&mut self, key: &str) -> Option<UploadedImage> {
        self.files.remove(key)
    }
}
