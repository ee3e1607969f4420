//! Provenance records: the append-only history of one artifact name
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::ProvenanceEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub artifact_filename: String,
    pub original_filename: String,
    pub project: String,
    pub bucket: String,
    pub history: Vec<ProvenanceEntry>,
}

impl ProvenanceRecord {
    pub fn new(
        artifact_filename: impl Into<String>,
        original_filename: impl Into<String>,
        project: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            artifact_filename: artifact_filename.into(),
            original_filename: original_filename.into(),
            project: project.into(),
            bucket: bucket.into(),
            history: Vec::new(),
        }
    }

    /// The only mutation a record supports.
    pub fn append(&mut self, entry: ProvenanceEntry) {
        self.history.push(entry);
    }

    pub fn latest(&self) -> Option<&ProvenanceEntry> {
        self.history.last()
    }

    /// Positions of entries whose signature no longer matches.
    pub fn invalid_entries(&self) -> Vec<usize> {
        self.history
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.verify())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn verify_all(&self) -> bool {
        self.invalid_entries().is_empty()
    }

    pub fn summary(&self) -> RecordSummary {
        let latest = self.latest();
        RecordSummary {
            artifact_filename: self.artifact_filename.clone(),
            project: self.project.clone(),
            bucket: self.bucket.clone(),
            entries: self.history.len(),
            last_upload: latest.map(|e| e.upload_time),
            tags: latest.map(|e| e.tags.clone()).unwrap_or_default(),
        }
    }
}

/// What a tag lookup returns per matching artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub artifact_filename: String,
    pub project: String,
    pub bucket: String,
    pub entries: usize,
    pub last_upload: Option<DateTime<Utc>>,
    pub tags: BTreeSet<String>,
}
