//! Video Stage Executor
//!
//! Input is a directory of already-decoded frames in playback order (file
//! name order). Container formats are rejected rather than guessed at.
use prep_core::{Modality, ModalitySection, PrepError, RunContext, StageExecutor, StageFailure, StageOutput};
use serde_json::{Map, Value};
use tracing::info;

use crate::frames::{batch_shape, load_frames, run_raster_steps, save_frames};
use crate::raster::RasterStep;
use crate::raster_io::{list_images, SaveFormat};

pub struct VideoExecutor;

impl StageExecutor for VideoExecutor {
    fn id(&self) -> &'static str {
        "videos.v1"
    }

    fn modality(&self) -> Modality {
        Modality::Videos
    }

    fn execute(&self, section: &ModalitySection, ctx: &RunContext) -> Result<StageOutput, StageFailure> {
        info!(run_id = %ctx.run_id, path = %section.path.display(), "video preprocessing started");

        if section.path.is_file() {
            return Err(PrepError::UnsupportedFormat(format!(
                "{}: video input must be a directory of frame images",
                section.path.display()
            ))
            .into());
        }
        let files = list_images(&section.path)?;
        let loaded = load_frames("load_frames", &files);
        let input_shape = batch_shape(&loaded.frames);
        let total_frames = loaded.frames.len();

        let (frames, mut steps) = run_raster_steps(loaded.frames, section, &RasterStep::VIDEO_ORDER);
        steps.insert(0, loaded.metadata);

        let saved = match save_frames("save_frames", &frames, &section.output_folder, SaveFormat::Png, |i| {
            format!("frame_{:04}.png", i)
        }) {
            Ok(saved) => saved,
            Err(err) => return Err(StageFailure::new(err, steps)),
        };
        steps.push(saved.metadata);

        let mut facts = Map::new();
        facts.insert("total_frames".to_string(), Value::from(total_frames));
        facts.insert("frames_saved".to_string(), Value::from(saved.entries.len()));

        Ok(StageOutput {
            steps,
            input_shape,
            output_shape: batch_shape(&frames),
            in_hash: Some(loaded.in_hash),
            out_hash: Some(saved.out_hash),
            artifacts: saved.entries,
            facts,
        })
    }
}
