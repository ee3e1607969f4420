//! Tabular Stage Executor
use std::path::Path;

use chrono::Utc;
use prep_core::{
    hash_bytes, ArtifactIndexEntry, Modality, ModalitySection, PrepError, RunContext, StageExecutor,
    StageFailure, StageOutput, StepMetadata, TabularDataset,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::io::{parse_tabular, read_bytes, render_tabular, write_bytes, write_index, TabularFormat};
use crate::registry::{identity_metadata, plan, Planned};
use crate::steps::TabularStep;

pub const OUTPUT_STEM: &str = "processed_tabular";

/// Apply the configured tabular steps in their fixed order.
pub fn run_steps(mut ds: TabularDataset, section: &ModalitySection) -> (TabularDataset, Vec<StepMetadata>) {
    let mut steps = Vec::new();
    for planned in plan(section, &TabularStep::ORDER) {
        match planned {
            Planned::Step(kind, cfg) => {
                let (next, meta) = kind.apply(ds, &cfg);
                info!(
                    step = kind.step_name(),
                    rows = next.row_count(),
                    columns = next.column_count(),
                    "tabular step applied"
                );
                ds = next;
                steps.push(meta);
            }
            Planned::Identity(key) => {
                warn!(modality = "tabular", step = %key, "unrecognized step");
                steps.push(identity_metadata(&key));
            }
        }
    }
    (ds, steps)
}

/// Render, write and index the processed table.
fn save_tabular(
    ds: &TabularDataset,
    folder: &Path,
    format: TabularFormat,
) -> Result<(Vec<u8>, ArtifactIndexEntry), PrepError> {
    let rendered = render_tabular(ds, format)?;
    let filename = format!("{}.{}", OUTPUT_STEM, format.extension());
    let out_path = folder.join(&filename);
    write_bytes(&out_path, &rendered)?;

    let entry = ArtifactIndexEntry {
        filename,
        width: ds.column_count() as u32,
        height: ds.row_count() as u32,
        timestamp: Utc::now(),
        path: out_path.display().to_string(),
    };
    write_index(folder, std::slice::from_ref(&entry))?;
    info!(path = %out_path.display(), shape = ?ds.shape(), "saved processed tabular data");
    Ok((rendered, entry))
}

pub struct TabularExecutor;

impl StageExecutor for TabularExecutor {
    fn id(&self) -> &'static str {
        "tabular.v1"
    }

    fn modality(&self) -> Modality {
        Modality::Tabular
    }

    fn execute(&self, section: &ModalitySection, ctx: &RunContext) -> Result<StageOutput, StageFailure> {
        let source_format = TabularFormat::parse(section.source_type.as_deref())?;
        let output_format = TabularFormat::parse(section.output_format.as_deref())?;
        info!(
            run_id = %ctx.run_id,
            path = %section.path.display(),
            format = source_format.extension(),
            "tabular preprocessing started"
        );

        let bytes = read_bytes(&section.path)?;
        let ds = parse_tabular(&bytes, source_format)?;
        let input_shape = ds.shape();

        let (ds, steps) = run_steps(ds, section);

        let (rendered, entry) = match save_tabular(&ds, &section.output_folder, output_format) {
            Ok(saved) => saved,
            Err(err) => return Err(StageFailure::new(err, steps)),
        };

        let mut facts = Map::new();
        facts.insert("source_format".to_string(), Value::from(source_format.extension()));
        facts.insert("output_format".to_string(), Value::from(output_format.extension()));
        facts.insert("columns".to_string(), Value::from(ds.column_names()));

        Ok(StageOutput {
            steps,
            artifacts: vec![entry],
            input_shape,
            output_shape: ds.shape(),
            in_hash: Some(hash_bytes(&bytes)),
            out_hash: Some(hash_bytes(&rendered)),
            facts,
        })
    }
}
