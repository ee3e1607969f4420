//! Raster steps for the image and video modalities
//!
//! Steps map a batch of frames to a new batch. A frame that fails an
//! operation is dropped from the batch and reported; the rest continue.

pub mod ops;

use prep_core::{Frame, PrepError, Raster, StepConfig, StepError, StepMetadata};
use thiserror::Error;
use tracing::{info, warn};

use crate::registry::StepKind;
use crate::steps::skipped;

/// Per-frame failure. Recorded as a warning, never fatal for the batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    #[error("FRAME/{file}: decode failed: {message}")]
    Decode { file: String, message: String },

    #[error("FRAME/{file}: {step} failed: {message}")]
    Transform {
        file: String,
        step: &'static str,
        message: String,
    },

    #[error("FRAME/{file}: encode failed: {message}")]
    Encode { file: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterStep {
    FrameSampling,
    Resize,
    Grayscale,
    FlipHorizontal,
    Normalize,
}

impl RasterStep {
    pub const IMAGE_ORDER: [RasterStep; 4] = [
        RasterStep::Resize,
        RasterStep::Grayscale,
        RasterStep::FlipHorizontal,
        RasterStep::Normalize,
    ];

    pub const VIDEO_ORDER: [RasterStep; 4] = [
        RasterStep::FrameSampling,
        RasterStep::Resize,
        RasterStep::Grayscale,
        RasterStep::Normalize,
    ];

    pub fn step_name(self) -> &'static str {
        self.config_key()
    }

    /// Parameters are checked before any frame is touched; a step that
    /// cannot run hands the batch back unchanged.
    pub fn apply(self, frames: Vec<Frame>, cfg: &StepConfig) -> (Vec<Frame>, StepMetadata) {
        match self.params(cfg) {
            Ok(params) => self.run(frames, params),
            Err(err) => {
                warn!(step = self.step_name(), error = %err, "raster step skipped");
                (frames, skipped(self.step_name(), &err))
            }
        }
    }

    fn params(self, cfg: &StepConfig) -> Result<Params, StepError> {
        match self {
            RasterStep::FrameSampling => {
                let every: usize = cfg.get_or("every_n_frames", 1)?;
                if every == 0 {
                    return Err(StepError::InvalidParameter {
                        key: "every_n_frames".to_string(),
                        message: "must be at least 1".to_string(),
                    });
                }
                Ok(Params::Sampling {
                    every,
                    max: cfg.get("max_frames")?,
                })
            }
            RasterStep::Resize => {
                let width: u32 = cfg.require("width")?;
                let height: u32 = cfg.require("height")?;
                if width == 0 || height == 0 {
                    return Err(StepError::InvalidParameter {
                        key: "width/height".to_string(),
                        message: "dimensions must be positive".to_string(),
                    });
                }
                Ok(Params::Size { width, height })
            }
            _ => Ok(Params::None),
        }
    }

    fn run(self, frames: Vec<Frame>, params: Params) -> (Vec<Frame>, StepMetadata) {
        let meta = StepMetadata::new(self.step_name());
        match (self, params) {
            (RasterStep::FrameSampling, Params::Sampling { every, max }) => sample_frames(frames, every, max),
            (RasterStep::Resize, Params::Size { width, height }) => {
                let meta = meta.with_fact("width", width).with_fact("height", height);
                map_frames(self, frames, meta, |r| ops::resize_bilinear(r, width, height))
            }
            (RasterStep::Grayscale, _) => map_frames(self, frames, meta, ops::grayscale),
            (RasterStep::FlipHorizontal, _) => map_frames(self, frames, meta, ops::flip_horizontal),
            (RasterStep::Normalize, _) => map_frames(self, frames, meta, ops::normalize),
            (_, _) => (frames, meta),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Params {
    Sampling { every: usize, max: Option<usize> },
    Size { width: u32, height: u32 },
    None,
}

impl StepKind for RasterStep {
    fn config_key(self) -> &'static str {
        match self {
            RasterStep::FrameSampling => "frame_sampling",
            RasterStep::Resize => "resize",
            RasterStep::Grayscale => "grayscale",
            RasterStep::FlipHorizontal => "flip_horizontal",
            RasterStep::Normalize => "normalize",
        }
    }

    fn is_flag(self) -> bool {
        matches!(
            self,
            RasterStep::Grayscale | RasterStep::FlipHorizontal | RasterStep::Normalize
        )
    }
}

fn map_frames<F>(step: RasterStep, frames: Vec<Frame>, meta: StepMetadata, op: F) -> (Vec<Frame>, StepMetadata)
where
    F: Fn(&Raster) -> Result<Raster, PrepError>,
{
    let mut out = Vec::with_capacity(frames.len());
    let mut errors = Vec::new();
    for frame in frames {
        match op(&frame.raster) {
            Ok(raster) => out.push(Frame {
                source: frame.source,
                raster,
            }),
            Err(err) => {
                let err = RasterError::Transform {
                    file: frame.source,
                    step: step.step_name(),
                    message: err.to_string(),
                };
                warn!("{}", err);
                errors.push(err.to_string());
            }
        }
    }
    info!(step = step.step_name(), frames = out.len(), failed = errors.len(), "raster step applied");
    let meta = meta
        .with_fact("frames_processed", out.len())
        .with_fact("frames_failed", errors.len())
        .with_warnings(errors);
    (out, meta)
}

/// Keep every n-th frame, optionally capped at `max`.
fn sample_frames(frames: Vec<Frame>, every: usize, max: Option<usize>) -> (Vec<Frame>, StepMetadata) {
    let total = frames.len();
    let sampled: Vec<Frame> = frames
        .into_iter()
        .step_by(every)
        .take(max.unwrap_or(usize::MAX))
        .collect();
    info!(total, sampled = sampled.len(), every, "sampled frames");

    let mut meta = StepMetadata::new("frame_sampling")
        .with_fact("total_frames", total)
        .with_fact("frames_sampled", sampled.len())
        .with_fact("every_n_frames", every);
    if let Some(max) = max {
        meta = meta.with_fact("max_frames", max);
    }
    (sampled, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::Channels;
    use serde_json::json;

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame {
                source: format!("f{}.png", i),
                raster: Raster::new(2, 2, Channels::Rgb, vec![i as f32 / 10.0; 12]).unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_frame_sampling() {
        let cfg = StepConfig::new("frame_sampling", json!({"every_n_frames": 3, "max_frames": 2}));
        let (out, meta) = RasterStep::FrameSampling.apply(frames(10), &cfg);
        let names: Vec<_> = out.iter().map(|f| f.source.as_str()).collect();
        assert_eq!(names, vec!["f0.png", "f3.png"]);
        assert_eq!(meta.fact("total_frames"), Some(&json!(10)));
        assert_eq!(meta.fact("frames_sampled"), Some(&json!(2)));
    }

    #[test]
    fn test_resize_requires_dimensions() {
        let cfg = StepConfig::new("resize", json!({"width": 8}));
        let (out, meta) = RasterStep::Resize.apply(frames(1), &cfg);
        assert_eq!(out, frames(1));
        assert_eq!(meta.fact("skipped"), Some(&json!(true)));
        assert_eq!(meta.warnings(), &[StepError::MissingParameter("height".to_string()).to_string()]);
    }

    #[test]
    fn test_bad_frame_is_dropped_not_fatal() {
        let mut batch = frames(2);
        batch.push(Frame {
            source: "empty.png".to_string(),
            raster: Raster::new(0, 0, Channels::Gray, Vec::new()).unwrap(),
        });
        let cfg = StepConfig::new("resize", json!({"width": 4, "height": 4}));
        let (out, meta) = RasterStep::Resize.apply(batch, &cfg);
        assert_eq!(out.len(), 2);
        assert_eq!(meta.fact("frames_failed"), Some(&json!(1)));
        assert!(meta.warnings()[0].contains("empty.png"));
    }
}
