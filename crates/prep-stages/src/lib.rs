//! Prep Stages: the step library and one executor per modality.
//!
//! # Pipeline Flow
//!
//! ```text
//! tabular: load → structural → values → filters → dtypes → save + index
//! images:  load → resize → grayscale → flip → normalize → save + index
//! videos:  frames → sampling → resize → grayscale → normalize → save + index
//! ```

mod frames;
mod images;
pub mod io;
pub mod raster;
pub mod raster_io;
pub mod registry;
pub mod steps;
mod tabular;
mod videos;

pub use images::ImageExecutor;
pub use raster::{RasterError, RasterStep};
pub use registry::{plan, Planned, StepKind};
pub use steps::{ConversionError, TabularStep};
pub use tabular::{run_steps, TabularExecutor};
pub use videos::VideoExecutor;

use prep_core::StageExecutor;

/// Executors for all three modalities, in run order.
pub fn default_executors() -> Vec<Box<dyn StageExecutor>> {
    vec![
        Box::new(TabularExecutor),
        Box::new(ImageExecutor),
        Box::new(VideoExecutor),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::Modality;

    #[test]
    fn test_default_executors_cover_every_modality() {
        let executors = default_executors();
        let modalities: Vec<_> = executors.iter().map(|e| e.modality()).collect();
        assert_eq!(modalities, Modality::ALL.to_vec());
    }
}
