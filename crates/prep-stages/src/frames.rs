//! Load, transform and save helpers shared by the image and video executors
use std::path::{Path, PathBuf};

use chrono::Utc;
use prep_core::{
    ArtifactIndexEntry, ContentDigest, Frame, ModalitySection, PrepError, StepMetadata,
};
use tracing::{debug, info, warn};

use crate::io::{write_bytes, write_index};
use crate::raster::{RasterError, RasterStep};
use crate::raster_io::{decode, encode, SaveFormat};
use crate::registry::{identity_metadata, plan, Planned};

pub(crate) struct LoadedBatch {
    pub frames: Vec<Frame>,
    pub in_hash: String,
    pub metadata: StepMetadata,
}

/// Read and decode every file. Unreadable or undecodable files are
/// reported per file; the batch continues without them.
pub(crate) fn load_frames(step: &str, files: &[PathBuf]) -> LoadedBatch {
    let mut digest = ContentDigest::new();
    let mut frames = Vec::with_capacity(files.len());
    let mut errors = Vec::new();

    for path in files {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let decoded = std::fs::read(path)
            .map_err(|e| RasterError::Decode {
                file: source.clone(),
                message: e.to_string(),
            })
            .and_then(|bytes| {
                digest.update(&bytes);
                decode(&source, &bytes)
            });
        match decoded {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                warn!("{}", err);
                errors.push(err.to_string());
            }
        }
    }

    info!(found = files.len(), loaded = frames.len(), "loaded frames");
    let metadata = StepMetadata::new(step)
        .with_fact("files_found", files.len())
        .with_fact("frames_loaded", frames.len())
        .with_warnings(errors);
    LoadedBatch {
        frames,
        in_hash: digest.finish(),
        metadata,
    }
}

/// Run the configured raster steps in `order`.
pub(crate) fn run_raster_steps(
    mut frames: Vec<Frame>,
    section: &ModalitySection,
    order: &[RasterStep],
) -> (Vec<Frame>, Vec<StepMetadata>) {
    let mut steps = Vec::new();
    for planned in plan(section, order) {
        match planned {
            Planned::Step(kind, cfg) => {
                let (next, meta) = kind.apply(frames, &cfg);
                frames = next;
                steps.push(meta);
            }
            Planned::Identity(key) => {
                warn!(modality = %section.modality, step = %key, "unrecognized step");
                steps.push(identity_metadata(&key));
            }
        }
    }
    (frames, steps)
}

pub(crate) struct SavedBatch {
    pub entries: Vec<ArtifactIndexEntry>,
    pub out_hash: String,
    pub metadata: StepMetadata,
}

/// Encode and write each frame as `name(index)`, then the output index.
/// Creating the folder or writing the index is fatal; a single frame
/// failing is not.
pub(crate) fn save_frames(
    step: &str,
    frames: &[Frame],
    folder: &Path,
    format: SaveFormat,
    name: impl Fn(usize) -> String,
) -> Result<SavedBatch, PrepError> {
    std::fs::create_dir_all(folder).map_err(|e| PrepError::io(folder, e))?;

    let mut digest = ContentDigest::new();
    let mut entries = Vec::with_capacity(frames.len());
    let mut errors = Vec::new();

    for (idx, frame) in frames.iter().enumerate() {
        let filename = name(idx);
        let path = folder.join(&filename);
        let written = encode(frame, format).and_then(|bytes| {
            write_bytes(&path, &bytes).map_err(|e| RasterError::Encode {
                file: frame.source.clone(),
                message: e.to_string(),
            })?;
            Ok(bytes)
        });
        match written {
            Ok(bytes) => {
                digest.update(&bytes);
                debug!(path = %path.display(), "saved frame");
                entries.push(ArtifactIndexEntry {
                    filename,
                    width: frame.raster.width(),
                    height: frame.raster.height(),
                    timestamp: Utc::now(),
                    path: path.display().to_string(),
                });
            }
            Err(err) => {
                warn!("{}", err);
                errors.push(err.to_string());
            }
        }
    }

    write_index(folder, &entries)?;
    info!(saved = entries.len(), folder = %folder.display(), "saved frames and index");
    let metadata = StepMetadata::new(step)
        .with_fact("format", format.extension())
        .with_fact("frames_saved", entries.len())
        .with_warnings(errors);
    Ok(SavedBatch {
        entries,
        out_hash: digest.finish(),
        metadata,
    })
}

/// `[frames, height, width, channels]` of the first frame, or `[0]`.
pub(crate) fn batch_shape(frames: &[Frame]) -> Vec<usize> {
    match frames.first() {
        Some(f) => vec![
            frames.len(),
            f.raster.height() as usize,
            f.raster.width() as usize,
            f.raster.channels().count(),
        ],
        None => vec![0],
    }
}
