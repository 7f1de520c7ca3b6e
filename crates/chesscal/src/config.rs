//! JSON-loadable pipeline configuration.

use crate::PipelineError;
use chesscal_calib::SolverOptions;
use chesscal_chessboard::{BoardSpec, ChessboardParams, GridGraphParams, SubPixParams};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Settings of the distortion-removal demo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UndistortDemoConfig {
    /// File name inside the image directory.
    pub image: String,
    /// Free scaling passed to the optimal new camera matrix.
    pub alpha: f64,
    /// Reference line drawn on both images, in pixels.
    pub line_from: [i32; 2],
    pub line_to: [i32; 2],
    pub line_thickness: u32,
    pub output_path: PathBuf,
}

impl Default for UndistortDemoConfig {
    fn default() -> Self {
        Self {
            image: "img2.jpg".to_string(),
            alpha: 1.0,
            line_from: [1769, 103],
            line_to: [1780, 922],
            line_thickness: 2,
            output_path: PathBuf::from("undistortion_comparison.png"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub image_dir: PathBuf,
    /// Extension (without dot, case-insensitive) of the calibration images.
    pub image_extension: String,
    pub board: BoardSpec,
    pub subpix: SubPixParams,
    pub chessboard: ChessboardParams,
    pub graph: GridGraphParams,
    pub solver: SolverOptions,
    /// Write a corner overlay per detected image into `debug_dir`.
    pub show_detections: bool,
    pub debug_dir: PathBuf,
    pub output_path: PathBuf,
    pub undistort: UndistortDemoConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("demoImages"),
            image_extension: "jpg".to_string(),
            board: BoardSpec::default(),
            subpix: SubPixParams::default(),
            chessboard: ChessboardParams::default(),
            graph: GridGraphParams::default(),
            solver: SolverOptions::default(),
            show_detections: false,
            debug_dir: PathBuf::from("debug"),
            output_path: PathBuf::from("calibration.npz"),
            undistort: UndistortDemoConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk; missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve a relative `output_path` against `base`. Absolute paths are kept.
    pub fn anchor_output(&mut self, base: &Path) {
        if self.output_path.is_relative() {
            self.output_path = base.join(&self.output_path);
        }
    }

    /// Path of the held-out image used by the undistortion demo.
    pub fn undistort_image_path(&self) -> PathBuf {
        self.image_dir.join(&self.undistort.image)
    }
}
