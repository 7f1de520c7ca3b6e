//! Checkerboard camera calibration, end to end.
//!
//! The pipeline reads every image of a directory, finds the inner-corner grid
//! of a known checkerboard, refines the corners to sub-pixel accuracy,
//! calibrates intrinsics, distortion and per-image poses, writes the result
//! to a NumPy-compatible `.npz` archive and demonstrates distortion removal
//! on one held-out image.
//!
//! ```no_run
//! use chesscal::{format_report, run_calibration, PipelineConfig};
//!
//! let result = run_calibration(&PipelineConfig::default())?;
//! println!("{}", format_report(&result));
//! # Ok::<(), chesscal::PipelineError>(())
//! ```
//!
//! The building blocks live in the sub-crates, re-exported here:
//! [`core`] (camera model, homographies, image views), [`chessboard`]
//! (grid detection and sub-pixel refinement) and [`calib`] (solver and
//! undistortion).

pub use chesscal_calib as calib;
pub use chesscal_chessboard as chessboard;
pub use chesscal_core as core;

pub mod archive;
mod config;
mod dataset;
mod detect;
pub mod draw;
mod error;
mod pipeline;

pub use archive::{load_calibration, save_calibration, ArchiveError};
pub use config::{PipelineConfig, UndistortDemoConfig};
pub use dataset::list_images;
pub use detect::{default_chess_config, detect_corners, gray_view, CornerExtractor};
pub use error::PipelineError;
pub use pipeline::{
    calibrate, collect_correspondences, format_report, remove_distortion, run_calibration,
    run_remove_distortion, UndistortReport,
};
