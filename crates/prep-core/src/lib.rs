//! Prep Core: dataset model, run records and the pipeline orchestrator
//!
//! Stage executors plug in through [`StageExecutor`]; the runner walks the
//! configured modalities in order and always writes a run record.

pub mod config;
pub mod context;
pub mod data_model;
pub mod dataset;
pub mod error;
pub mod runner;
pub mod stage;

pub use config::{ModalitySection, PipelineSettings, RunConfig};
pub use context::RunContext;
pub use data_model::{
    ArtifactIndexEntry, Modality, ModalityStatus, ModalitySummary, RecordedStep, RunRecord, StepMetadata,
};
pub use dataset::{Channels, Column, ColumnKind, Frame, Raster, TabularDataset, Value};
pub use error::PrepError;
pub use runner::{PipelineRunner, RunOutcome};
pub use stage::{hash_bytes, ContentDigest, StageExecutor, StageFailure, StageOutput, StepConfig, StepError};
