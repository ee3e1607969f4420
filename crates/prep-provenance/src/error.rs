//! Provenance error taxonomy
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvenanceError {
    /// Object store or listing service call failed. Surfaced, never retried.
    #[error("NETWORK/{0}")]
    Network(String),

    #[error("NOT_FOUND/{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("MALFORMED/{key}: {message}")]
    Malformed { key: String, message: String },

    #[error("INVALID/{0}")]
    InvalidInput(String),

    #[error("SERIALIZE/{0}")]
    Serialize(String),
}

impl ProvenanceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for ProvenanceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

impl From<reqwest::Error> for ProvenanceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
