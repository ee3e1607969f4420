//! Artifact naming and registration input checks
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ProvenanceError;

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?://)?(([a-z0-9_-]+\.)+[a-z]{2,6})(/\S*)?$")
        .expect("url pattern is valid")
});

/// `{project}/{base}_{YYYYMMDD}.{ext}` with the prefix flag, `{base}.{ext}`
/// without. The extension is whatever follows the last dot of the original
/// name; a name without a dot contributes none.
pub fn generate_name(project: &str, base: &str, original_filename: &str, add_prefix: bool, date: NaiveDate) -> String {
    let ext = original_filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty());
    let stem = if add_prefix {
        format!("{}/{}_{}", project, base, date.format("%Y%m%d"))
    } else {
        base.to_string()
    };
    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

pub fn validate_base_name(base: &str) -> Result<(), ProvenanceError> {
    if !base.is_empty() && base.chars().all(char::is_alphanumeric) {
        Ok(())
    } else {
        Err(ProvenanceError::InvalidInput(format!(
            "base name '{}' must be alphanumeric",
            base
        )))
    }
}

pub fn is_valid_url(url: &str) -> bool {
    URL_RE.is_match(url.trim())
}
