//! Unified Error Model
use std::path::Path;
use thiserror::Error;

/// Modality-level failures. Any of these aborts the modality that raised it;
/// sibling modalities in the same run still execute.
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("CONFIG/{modality}: {message}")]
    Configuration { modality: String, message: String },

    #[error("IO/{path}: {message}")]
    Io { path: String, message: String },

    #[error("FORMAT/{0}")]
    UnsupportedFormat(String),

    #[error("PARSE/{0}")]
    Parse(String),

    #[error("SERIALIZE/{0}")]
    Serialize(String),

    #[error("DATASET/{0}")]
    Dataset(String),
}

impl PrepError {
    pub fn config(modality: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            modality: modality.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl AsRef<Path>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    /// True for errors raised before any processing of the modality started.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<serde_json::Error> for PrepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

impl From<serde_yaml::Error> for PrepError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
