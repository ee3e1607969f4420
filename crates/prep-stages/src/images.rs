//! Image Stage Executor
use prep_core::{Modality, ModalitySection, RunContext, StageExecutor, StageFailure, StageOutput};
use tracing::{info, warn};

use crate::frames::{batch_shape, load_frames, run_raster_steps, save_frames};
use crate::raster::RasterStep;
use crate::raster_io::{list_images, SaveFormat};

/// Decodes a directory (or single file) of images, applies
/// resize → grayscale → flip_horizontal → normalize, and writes
/// `processed_img_{i}.{ext}` plus `metadata.csv`.
pub struct ImageExecutor;

impl StageExecutor for ImageExecutor {
    fn id(&self) -> &'static str {
        "images.v1"
    }

    fn modality(&self) -> Modality {
        Modality::Images
    }

    fn execute(&self, section: &ModalitySection, ctx: &RunContext) -> Result<StageOutput, StageFailure> {
        info!(run_id = %ctx.run_id, path = %section.path.display(), "image preprocessing started");

        let files = list_images(&section.path)?;
        let loaded = load_frames("load_images", &files);
        let input_shape = batch_shape(&loaded.frames);

        let (frames, mut steps) = run_raster_steps(loaded.frames, section, &RasterStep::IMAGE_ORDER);
        steps.insert(0, loaded.metadata);

        let (format, fell_back) = SaveFormat::resolve(section.output_format.as_deref());
        let saved = match save_frames("save_images", &frames, &section.output_folder, format, |i| {
            format!("processed_img_{}.{}", i, format.extension())
        }) {
            Ok(saved) => saved,
            Err(err) => return Err(StageFailure::new(err, steps)),
        };
        let mut save_meta = saved.metadata;
        if fell_back {
            let msg = format!(
                "unsupported image format '{}'; defaulting to png",
                section.output_format.as_deref().unwrap_or_default()
            );
            warn!("{}", msg);
            save_meta = save_meta.with_warning(msg);
        }
        steps.push(save_meta);

        Ok(StageOutput {
            steps,
            input_shape,
            output_shape: batch_shape(&frames),
            in_hash: Some(loaded.in_hash),
            out_hash: Some(saved.out_hash),
            artifacts: saved.entries,
            facts: Default::default(),
        })
    }
}
