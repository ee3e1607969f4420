//! Provenance Ledger
//!
//! Records live in the object store next to the artifacts they describe, under
//! `{artifact}{record_suffix}`. A record is only ever read, appended to and
//! written back; an unreadable record is reported, never replaced.
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::entry::{EntryFields, ProvenanceEntry};
use crate::error::ProvenanceError;
use crate::naming::{generate_name, is_valid_url, validate_base_name};
use crate::record::{ProvenanceRecord, RecordSummary};
use crate::store::ObjectStore;

pub const DEFAULT_BUCKET: &str = "dw-bucket-bronze";
pub const RECORD_SUFFIX: &str = ".provenance.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSettings {
    pub bucket: String,
    pub record_suffix: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            record_suffix: RECORD_SUFFIX.to_string(),
        }
    }
}

impl LedgerSettings {
    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }
}

/// Identifies the artifact a registration is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub artifact_filename: String,
    pub original_filename: String,
    pub project: String,
}

/// Bytes plus everything needed to name and register them.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub project: String,
    pub base_name: String,
    pub original_filename: String,
    pub add_prefix: bool,
    pub bytes: Vec<u8>,
    pub fields: EntryFields,
}

#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub artifact_filename: String,
    pub bucket: String,
    pub entry: ProvenanceEntry,
}

pub struct Ledger<S: ObjectStore> {
    store: S,
    settings: LedgerSettings,
}

impl<S: ObjectStore> Ledger<S> {
    pub fn new(store: S, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn record_key(&self, artifact_filename: &str) -> String {
        format!("{}{}", artifact_filename, self.settings.record_suffix)
    }

    pub fn register(&self, artifact: &ArtifactRef, fields: EntryFields) -> Result<ProvenanceEntry, ProvenanceError> {
        self.register_at(artifact, fields, Utc::now())
    }

    /// Signs a new entry and appends it to the artifact's history, creating
    /// the record on first registration.
    pub fn register_at(
        &self,
        artifact: &ArtifactRef,
        fields: EntryFields,
        upload_time: DateTime<Utc>,
    ) -> Result<ProvenanceEntry, ProvenanceError> {
        validate_fields(&fields)?;
        let mut record = self.load_or_new(artifact)?;
        let entry = ProvenanceEntry::sign(fields, upload_time)?;
        self.append_and_save(&mut record, entry)
    }

    pub fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, ProvenanceError> {
        self.upload_on(request, Utc::now().date_naive())
    }

    /// Stores the artifact bytes under their generated name and registers
    /// provenance for them. The existing record is read and the entry
    /// signed before anything is written, so an unreadable record leaves
    /// the stored artifact untouched.
    pub fn upload_on(&self, request: UploadRequest, date: NaiveDate) -> Result<UploadReceipt, ProvenanceError> {
        validate_base_name(&request.base_name)?;
        validate_fields(&request.fields)?;

        let artifact_filename = generate_name(
            &request.project,
            &request.base_name,
            &request.original_filename,
            request.add_prefix,
            date,
        );
        let artifact = ArtifactRef {
            artifact_filename: artifact_filename.clone(),
            original_filename: request.original_filename,
            project: request.project,
        };
        let mut record = self.load_or_new(&artifact)?;
        let entry = ProvenanceEntry::sign(request.fields, Utc::now())?;

        self.store
            .put(&self.settings.bucket, &artifact_filename, &request.bytes)?;
        info!(
            bucket = %self.settings.bucket,
            artifact = %artifact_filename,
            bytes = request.bytes.len(),
            "artifact uploaded"
        );

        let entry = self.append_and_save(&mut record, entry)?;
        Ok(UploadReceipt {
            artifact_filename,
            bucket: self.settings.bucket.clone(),
            entry,
        })
    }

    pub fn history(&self, artifact_filename: &str) -> Result<ProvenanceRecord, ProvenanceError> {
        self.load(artifact_filename)
    }

    /// Positions of history entries whose signature does not verify.
    pub fn verify(&self, artifact_filename: &str) -> Result<Vec<usize>, ProvenanceError> {
        Ok(self.load(artifact_filename)?.invalid_entries())
    }

    /// Exact, case-sensitive match against the most recent entry's tags.
    pub fn lookup_by_tag(&self, tag: &str) -> Result<Vec<RecordSummary>, ProvenanceError> {
        let keys = self.store.list(&self.settings.bucket)?;
        let mut matches = Vec::new();
        for key in keys.iter().filter(|k| k.ends_with(&self.settings.record_suffix)) {
            let record = match self.read_record(key) {
                Ok(record) => record,
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping unreadable provenance record");
                    continue;
                }
            };
            if record.latest().map(|e| e.has_tag(tag)).unwrap_or(false) {
                matches.push(record.summary());
            }
        }
        info!(tag, matches = matches.len(), "tag lookup");
        Ok(matches)
    }

    fn load_or_new(&self, artifact: &ArtifactRef) -> Result<ProvenanceRecord, ProvenanceError> {
        match self.load(&artifact.artifact_filename) {
            Ok(record) => Ok(record),
            Err(err) if err.is_not_found() => Ok(ProvenanceRecord::new(
                artifact.artifact_filename.clone(),
                artifact.original_filename.clone(),
                artifact.project.clone(),
                self.settings.bucket.clone(),
            )),
            Err(err) => Err(err),
        }
    }

    fn append_and_save(
        &self,
        record: &mut ProvenanceRecord,
        entry: ProvenanceEntry,
    ) -> Result<ProvenanceEntry, ProvenanceError> {
        record.append(entry.clone());
        self.save(record)?;
        info!(
            artifact = %record.artifact_filename,
            entries = record.history.len(),
            signature = %entry.signature,
            "provenance registered"
        );
        Ok(entry)
    }

    fn load(&self, artifact_filename: &str) -> Result<ProvenanceRecord, ProvenanceError> {
        self.read_record(&self.record_key(artifact_filename))
    }

    fn read_record(&self, key: &str) -> Result<ProvenanceRecord, ProvenanceError> {
        let bytes = self.store.get(&self.settings.bucket, key)?;
        serde_json::from_slice(&bytes).map_err(|e| ProvenanceError::Malformed {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn save(&self, record: &ProvenanceRecord) -> Result<(), ProvenanceError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        self.store.put(
            &self.settings.bucket,
            &self.record_key(&record.artifact_filename),
            &bytes,
        )
    }
}

fn validate_fields(fields: &EntryFields) -> Result<(), ProvenanceError> {
    if fields.source_description.trim().is_empty() {
        return Err(ProvenanceError::InvalidInput(
            "source_description must not be blank".to_string(),
        ));
    }
    if !fields.source_url.is_empty() && !is_valid_url(&fields.source_url) {
        return Err(ProvenanceError::InvalidInput(format!(
            "source_url '{}' is not a valid URL",
            fields.source_url
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn artifact() -> ArtifactRef {
        ArtifactRef {
            artifact_filename: "proj1/data_20240501.csv".to_string(),
            original_filename: "report.csv".to_string(),
            project: "proj1".to_string(),
        }
    }

    fn fields(description: &str) -> EntryFields {
        EntryFields {
            source_description: description.to_string(),
            uploader_identity: "ana".to_string(),
            ..EntryFields::default()
        }
    }

    #[test]
    fn test_record_key_uses_suffix() {
        let ledger = Ledger::new(InMemoryStore::new(), LedgerSettings::default());
        assert_eq!(
            ledger.record_key("proj1/data_20240501.csv"),
            "proj1/data_20240501.csv.provenance.json"
        );
    }

    #[test]
    fn test_blank_description_rejected_before_write() {
        let ledger = Ledger::new(InMemoryStore::new(), LedgerSettings::default());
        let err = ledger.register(&artifact(), fields("   ")).unwrap_err();
        assert!(matches!(err, ProvenanceError::InvalidInput(_)));
        assert!(ledger.store().list(DEFAULT_BUCKET).unwrap().is_empty());
    }

    #[test]
    fn test_bad_url_rejected() {
        let ledger = Ledger::new(InMemoryStore::new(), LedgerSettings::default());
        let mut f = fields("Kaggle");
        f.source_url = "not a url".to_string();
        assert!(ledger.register(&artifact(), f).is_err());
    }

    #[test]
    fn test_malformed_record_is_not_overwritten() {
        let ledger = Ledger::new(InMemoryStore::new(), LedgerSettings::default());
        let key = ledger.record_key(&artifact().artifact_filename);
        ledger.store().put(DEFAULT_BUCKET, &key, b"{oops").unwrap();

        let err = ledger.register(&artifact(), fields("Kaggle")).unwrap_err();
        assert!(matches!(err, ProvenanceError::Malformed { .. }));
        assert_eq!(ledger.store().get(DEFAULT_BUCKET, &key).unwrap(), b"{oops");
    }

    #[test]
    fn test_upload_rejects_non_alphanumeric_base() {
        let ledger = Ledger::new(InMemoryStore::new(), LedgerSettings::default());
        let request = UploadRequest {
            project: "proj1".to_string(),
            base_name: "my data".to_string(),
            original_filename: "report.csv".to_string(),
            add_prefix: true,
            bytes: b"a,b\n".to_vec(),
            fields: fields("Kaggle"),
        };
        assert!(ledger.upload(request).is_err());
        assert!(ledger.store().list(DEFAULT_BUCKET).unwrap().is_empty());
    }
}
