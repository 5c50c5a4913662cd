use lazy_static::lazy_static;
use regex::Regex;

use super::services::IngestError;

const MAX_STEM_LEN: usize = 64;
const MAX_EXT_LEN: usize = 8;

/// Client file name reduced to characters that are safe both on disk and in
/// a URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanName {
    pub stem: String,
    pub ext: Option<String>,
}

impl CleanName {
    pub fn file_name(&self) -> String {
        match &self.ext {
            Some(ext) => format!("{}.{}", self.stem, ext),
            None => self.stem.clone(),
        }
    }
}

pub fn sanitize_file_name(raw: &str) -> Result<CleanName, IngestError> {
    lazy_static! {
        static ref DISALLOWED: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
        static ref UNDERSCORES: Regex = Regex::new(r"_{2,}").unwrap();
    }

    // browsers on Windows sometimes send the full client path
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let replaced = DISALLOWED.replace_all(last, "_");
    let collapsed = UNDERSCORES.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_start_matches(['.', '_']);

    let (stem, ext) = match trimmed.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.len() <= MAX_EXT_LEN => {
            (stem, Some(ext.to_ascii_lowercase()))
        }
        _ => (trimmed, None),
    };

    let stem = stem.trim_matches(['.', '_', '-']);
    // only ASCII survives the regex, so byte slicing is on char boundaries
    let stem = &stem[..stem.len().min(MAX_STEM_LEN)];
    let ext = ext.filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()));

    if stem.is_empty() {
        return Err(IngestError::InvalidFileName(raw.to_string()));
    }

    Ok(CleanName {
        stem: stem.to_string(),
        ext,
    })
}
