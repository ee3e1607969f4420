//! Data Model: StepMetadata, RunRecord, ModalitySummary
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The three input families a run can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Tabular,
    Images,
    Videos,
}

impl Modality {
    /// Execution order inside one run.
    pub const ALL: [Modality; 3] = [Modality::Tabular, Modality::Images, Modality::Videos];

    /// Top-level key of the run configuration.
    pub fn config_key(self) -> &'static str {
        match self {
            Modality::Tabular => "tabular",
            Modality::Images => "images",
            Modality::Videos => "videos",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.config_key() == key)
    }

    /// Name of the modality block in the run record.
    pub fn record_step(self) -> &'static str {
        match self {
            Modality::Tabular => "tabular_preprocessing",
            Modality::Images => "image_preprocessing",
            Modality::Videos => "video_preprocessing",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.config_key())
    }
}

/// What one step changed. Built once through the `with_*` methods and never
/// modified after it is handed to a [`RunRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetadata {
    pub step: String,
    #[serde(flatten)]
    facts: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl StepMetadata {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            facts: Map::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn fact(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    pub fn facts(&self) -> &Map<String, Value> {
        &self.facts
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// A step's metadata tagged with the modality that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedStep {
    pub modality: Modality,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: StepMetadata,
}

/// One row of a per-modality output index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactIndexEntry {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalityStatus {
    Completed,
    Failed,
}

/// Modality-level block of the run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalitySummary {
    pub step: String,
    pub modality: Modality,
    pub status: ModalityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub executor: Option<String>,
    pub output_folder: Option<String>,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    pub in_hash: Option<String>,
    pub out_hash: Option<String>,
    pub latency_ms: u64,
    #[serde(default)]
    pub artifacts: Vec<ArtifactIndexEntry>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub facts: Map<String, Value>,
}

impl ModalitySummary {
    pub fn failed(modality: Modality, error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            step: modality.record_step().to_string(),
            modality,
            status: ModalityStatus::Failed,
            error: Some(error.into()),
            executor: None,
            output_folder: None,
            input_shape: Vec::new(),
            output_shape: Vec::new(),
            in_hash: None,
            out_hash: None,
            latency_ms,
            artifacts: Vec::new(),
            facts: Map::new(),
        }
    }
}

/// Aggregate metadata for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub steps: Vec<RecordedStep>,
    #[serde(default)]
    pub modalities: Vec<ModalitySummary>,
}

impl RunRecord {
    pub fn new(run_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            start_time,
            end_time: None,
            steps: Vec::new(),
            modalities: Vec::new(),
        }
    }

    /// Append-only.
    pub fn record_step(&mut self, modality: Modality, metadata: StepMetadata) {
        self.steps.push(RecordedStep {
            modality,
            timestamp: Utc::now(),
            metadata,
        });
    }

    pub fn record_modality(&mut self, summary: ModalitySummary) {
        self.modalities.push(summary);
    }

    pub fn finish(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
    }

    pub fn steps_for(&self, modality: Modality) -> impl Iterator<Item = &StepMetadata> {
        self.steps
            .iter()
            .filter(move |s| s.modality == modality)
            .map(|s| &s.metadata)
    }

    pub fn summary(&self, modality: Modality) -> Option<&ModalitySummary> {
        self.modalities.iter().find(|m| m.modality == modality)
    }
}
