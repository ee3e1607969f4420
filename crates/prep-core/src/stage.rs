//! Stage Executor contract and step configuration
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::ModalitySection;
use crate::context::RunContext;
use crate::data_model::{ArtifactIndexEntry, Modality, StepMetadata};
use crate::error::PrepError;

/// Runs one modality's ordered step sequence: load, transform, save, index.
pub trait StageExecutor: Send + Sync {
    /// Stable executor id (ex: "tabular.v1")
    fn id(&self) -> &'static str;

    fn modality(&self) -> Modality;

    /// Errors returned here abort this modality only.
    fn execute(&self, section: &ModalitySection, ctx: &RunContext) -> Result<StageOutput, StageFailure>;
}

/// A modality that failed partway. Steps that already ran travel with the
/// error so the run record still shows them.
#[derive(Debug)]
pub struct StageFailure {
    pub error: PrepError,
    pub steps: Vec<StepMetadata>,
}

impl StageFailure {
    pub fn new(error: PrepError, steps: Vec<StepMetadata>) -> Self {
        Self { error, steps }
    }
}

impl From<PrepError> for StageFailure {
    fn from(error: PrepError) -> Self {
        Self::new(error, Vec::new())
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for StageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Everything an executor hands back to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub steps: Vec<StepMetadata>,
    pub artifacts: Vec<ArtifactIndexEntry>,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    pub in_hash: Option<String>,
    pub out_hash: Option<String>,
    pub facts: Map<String, Value>,
}

/// Incremental blake3 fingerprint over source or output bytes.
#[derive(Default)]
pub struct ContentDigest {
    hasher: blake3::Hasher,
}

impl ContentDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update(data);
        self
    }

    pub fn finish(&self) -> String {
        format!("blake3:{}", self.hasher.finalize())
    }
}

pub fn hash_bytes(data: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(data))
}

/// A named operation and its raw configuration value. Parameters are read
/// lazily: unknown keys are ignored, optional keys fall back to defaults,
/// and a missing required key fails only the step that asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct StepConfig {
    pub name: String,
    value: Value,
}

impl StepConfig {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Flag-style steps (`drop_duplicates: true`) are enabled by any value
    /// other than `false` or null.
    pub fn enabled(&self) -> bool {
        !matches!(self.value, Value::Null | Value::Bool(false))
    }

    pub fn raw(&self) -> &Value {
        &self.value
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StepError> {
        match self.value.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| StepError::InvalidParameter {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StepError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, StepError> {
        self.get(key)?
            .ok_or_else(|| StepError::MissingParameter(key.to_string()))
    }

    /// Deserialize the whole value, for steps configured by a bare mapping.
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T, StepError> {
        serde_json::from_value(self.value.clone()).map_err(|e| StepError::InvalidParameter {
            key: self.name.clone(),
            message: e.to_string(),
        })
    }
}

/// A step-level failure. The step is skipped and the reason recorded; the
/// rest of the modality continues.
#[derive(Debug, Clone, PartialEq)]
pub enum StepError {
    MissingParameter(String),
    InvalidParameter { key: String, message: String },
    ExecutionFailed(String),
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::MissingParameter(key) => write!(f, "STEP/PARAM: missing required key '{}'", key),
            Self::InvalidParameter { key, message } => {
                write!(f, "STEP/PARAM: invalid value for '{}': {}", key, message)
            }
            Self::ExecutionFailed(msg) => write!(f, "STEP/EXEC: {}", msg),
        }
    }
}

impl std::error::Error for StepError {}
