//! Provenance entries and their signatures
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::fingerprint;
use crate::error::ProvenanceError;

/// Descriptive fields supplied by whoever registers an artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFields {
    pub source_description: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub processing_intent: String,
    pub uploader_identity: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// One registration event. Immutable once signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub upload_time: DateTime<Utc>,
    pub source_description: String,
    pub source_url: String,
    pub processing_intent: String,
    pub uploader_identity: String,
    pub file_type: String,
    pub tags: BTreeSet<String>,
    pub signature: String,
}

impl ProvenanceEntry {
    pub fn sign(fields: EntryFields, upload_time: DateTime<Utc>) -> Result<Self, ProvenanceError> {
        let mut entry = Self {
            upload_time,
            source_description: fields.source_description,
            source_url: fields.source_url,
            processing_intent: fields.processing_intent,
            uploader_identity: fields.uploader_identity,
            file_type: fields.file_type,
            tags: fields.tags,
            signature: String::new(),
        };
        entry.signature = entry.compute_signature()?;
        Ok(entry)
    }

    /// Fingerprint of every field except `signature`.
    pub fn compute_signature(&self) -> Result<String, ProvenanceError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("signature");
        }
        Ok(fingerprint(&value))
    }

    pub fn verify(&self) -> bool {
        self.compute_signature()
            .map(|sig| sig == self.signature)
            .unwrap_or(false)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fields() -> EntryFields {
        EntryFields {
            source_description: "Kaggle".to_string(),
            source_url: "https://kaggle.com/d/1".to_string(),
            processing_intent: "training".to_string(),
            uploader_identity: "ana".to_string(),
            file_type: "csv".to_string(),
            tags: ["raw", "finance"].into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn test_signature_is_reproducible() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let a = ProvenanceEntry::sign(fields(), at).unwrap();
        let b = ProvenanceEntry::sign(fields(), at).unwrap();
        assert_eq!(a.signature, b.signature);
        assert!(a.signature.starts_with("blake3:"));
        assert!(a.verify());
    }

    #[test]
    fn test_tampering_breaks_verification() {
        let mut entry = ProvenanceEntry::sign(fields(), Utc::now()).unwrap();
        entry.source_description = "Internal DB".to_string();
        assert!(!entry.verify());
    }

    #[test]
    fn test_tag_insertion_order_is_irrelevant() {
        let at = Utc::now();
        let mut reordered = fields();
        reordered.tags = ["finance", "raw"].into_iter().map(String::from).collect();
        assert_eq!(
            ProvenanceEntry::sign(fields(), at).unwrap().signature,
            ProvenanceEntry::sign(reordered, at).unwrap().signature
        );
    }

    #[test]
    fn test_signature_survives_json_round_trip() {
        let entry = ProvenanceEntry::sign(fields(), Utc::now()).unwrap();
        let text = serde_json::to_string_pretty(&entry).unwrap();
        let back: ProvenanceEntry = serde_json::from_str(&text).unwrap();
        assert!(back.verify());
        assert_eq!(back, entry);
    }
}
