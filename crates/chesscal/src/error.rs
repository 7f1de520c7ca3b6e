use crate::archive::ArchiveError;
use chesscal_calib::CalibError;
use std::path::PathBuf;

/// Errors produced by the calibration pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("cannot read image directory {path}: {source}")]
    ImageDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no matching images found in {0}")]
    NoImagesFound(PathBuf),

    #[error("no checkerboard detected in any of {images} images")]
    NoCornersDetected { images: usize },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Calibration(#[from] CalibError),
}
