//! Pipeline Runner: runs each configured modality and persists the run record
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::{PipelineSettings, RunConfig};
use crate::context::RunContext;
use crate::data_model::{Modality, ModalityStatus, ModalitySummary, RunRecord, StepMetadata};
use crate::error::PrepError;
use crate::stage::{StageExecutor, StageFailure};

const MAX_RUN_ID_SUFFIX: u32 = 999;

pub struct PipelineRunner {
    executors: Vec<Box<dyn StageExecutor>>,
    settings: PipelineSettings,
    pipeline_id: String,
}

/// A finished run and where its record was written.
#[derive(Debug)]
pub struct RunOutcome {
    pub record: RunRecord,
    pub record_path: PathBuf,
}

impl RunOutcome {
    pub fn failed_modalities(&self) -> Vec<Modality> {
        self.record
            .modalities
            .iter()
            .filter(|m| m.status == ModalityStatus::Failed)
            .map(|m| m.modality)
            .collect()
    }
}

impl PipelineRunner {
    pub fn new(executors: Vec<Box<dyn StageExecutor>>, settings: PipelineSettings) -> Self {
        let pipeline_id = executors
            .iter()
            .map(|e| e.id().split('.').next().unwrap_or("?"))
            .collect::<Vec<_>>()
            .join("→");

        Self {
            executors,
            settings,
            pipeline_id,
        }
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn run(&self, config: &RunConfig) -> Result<RunOutcome, PrepError> {
        self.run_at(config, Utc::now())
    }

    /// Modalities run sequentially in fixed order. A failing modality is
    /// recorded and the run moves on; the record is always written.
    pub fn run_at(&self, config: &RunConfig, started_at: DateTime<Utc>) -> Result<RunOutcome, PrepError> {
        let (run_id, record_path, file) = self.reserve_record(started_at)?;
        let ctx = RunContext::new(run_id.clone(), started_at);
        let mut record = RunRecord::new(run_id, started_at);

        info!(
            run_id = %ctx.run_id,
            trace_id = %ctx.trace_id,
            pipeline = %self.pipeline_id,
            "pipeline run started"
        );

        for modality in Modality::ALL {
            let Some(section) = config.section(modality) else {
                continue;
            };
            let start = Instant::now();

            let result = section.map_err(StageFailure::from).and_then(|section| {
                let executor = self.executor_for(modality).ok_or_else(|| {
                    PrepError::config(modality.config_key(), "no executor registered")
                })?;
                let output = executor.execute(&section, &ctx)?;
                Ok((executor.id(), section, output))
            });
            let latency_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok((executor_id, section, output)) => {
                    record_steps(&mut record, modality, output.steps);
                    info!(
                        modality = %modality,
                        artifacts = output.artifacts.len(),
                        latency_ms,
                        "modality completed"
                    );
                    record.record_modality(ModalitySummary {
                        step: modality.record_step().to_string(),
                        modality,
                        status: ModalityStatus::Completed,
                        error: None,
                        executor: Some(executor_id.to_string()),
                        output_folder: Some(section.output_folder.display().to_string()),
                        input_shape: output.input_shape,
                        output_shape: output.output_shape,
                        in_hash: output.in_hash,
                        out_hash: output.out_hash,
                        latency_ms,
                        artifacts: output.artifacts,
                        facts: output.facts,
                    });
                }
                Err(failure) => {
                    error!(
                        modality = %modality,
                        error = %failure.error,
                        steps_completed = failure.steps.len(),
                        "modality failed"
                    );
                    record_steps(&mut record, modality, failure.steps);
                    record.record_modality(ModalitySummary::failed(
                        modality,
                        failure.error.to_string(),
                        latency_ms,
                    ));
                }
            }
        }

        record.finish(Utc::now());
        persist(&record, file, &record_path)?;
        info!(run_id = %record.run_id, path = %record_path.display(), "run record written");

        Ok(RunOutcome { record, record_path })
    }

    fn executor_for(&self, modality: Modality) -> Option<&dyn StageExecutor> {
        self.executors
            .iter()
            .find(|e| e.modality() == modality)
            .map(|e| e.as_ref())
    }

    /// Claims `metadata_{run_id}.json`. Two runs in the same second get
    /// zero-padded `-001`, `-002`, ... suffixes so ids keep sorting in order.
    fn reserve_record(&self, started_at: DateTime<Utc>) -> Result<(String, PathBuf, File), PrepError> {
        let dir = &self.settings.metadata_dir;
        std::fs::create_dir_all(dir).map_err(|e| PrepError::io(dir, e))?;

        let base = run_id_for(started_at);
        for n in 0..=MAX_RUN_ID_SUFFIX {
            let run_id = if n == 0 { base.clone() } else { format!("{}-{:03}", base, n) };
            let path = dir.join(format!("metadata_{}.json", run_id));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((run_id, path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(PrepError::io(&path, e)),
            }
        }
        Err(PrepError::io(dir, format!("no free run id for {}", base)))
    }
}

pub fn run_id_for(started_at: DateTime<Utc>) -> String {
    started_at.format("%Y%m%d_%H%M%S").to_string()
}

fn record_steps(record: &mut RunRecord, modality: Modality, steps: Vec<StepMetadata>) {
    for step in steps {
        for warning in step.warnings() {
            warn!(modality = %modality, step = %step.step, "{}", warning);
        }
        record.record_step(modality, step);
    }
}

fn persist(record: &RunRecord, file: File, path: &Path) -> Result<(), PrepError> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, record)?;
    writer.flush().map_err(|e| PrepError::io(path, e))
}
