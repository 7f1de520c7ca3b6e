use crate::archive::save_calibration;
use crate::dataset::list_images;
use crate::detect::CornerExtractor;
use crate::draw::{draw_corners, draw_thick_line, side_by_side};
use crate::{PipelineConfig, PipelineError};
use chesscal_calib::{
    calibrate_camera, optimal_new_camera_matrix, undistort_image, CalibrationResult,
    Correspondences, Roi,
};
use chesscal_core::{CameraMatrix, Distortion};
use image::{Rgb, RgbImage};
use log::{debug, info};
use nalgebra::Point2;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// What the distortion-removal demo produced.
#[derive(Clone, Debug)]
pub struct UndistortReport {
    pub new_camera: CameraMatrix,
    /// All-valid region of the undistorted image.
    pub roi: Roi,
    pub output_path: PathBuf,
}

/// Detect the board in every configured image and accumulate correspondences.
///
/// Images without a complete board are skipped. The recorded image size is
/// the one of the last image read.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(dir = %cfg.image_dir.display()))
)]
pub fn collect_correspondences(cfg: &PipelineConfig) -> Result<(Correspondences, usize), PipelineError> {
    let images = list_images(&cfg.image_dir, &cfg.image_extension)?;
    let extractor = CornerExtractor::from_config(cfg);
    let world = cfg.board.world_points();
    let mut set = Correspondences::new();

    if cfg.show_detections {
        fs::create_dir_all(&cfg.debug_dir)?;
    }

    for path in &images {
        let img = image::open(path)?;
        let gray = img.to_luma8();
        set.record_image_size(gray.width(), gray.height());

        let Some(corners) = extractor.extract(&gray) else {
            debug!("{}: board not found, skipping", path.display());
            continue;
        };
        info!("{}: {} corners", path.display(), corners.len());

        if cfg.show_detections {
            let mut overlay = img.to_rgb8();
            draw_corners(&mut overlay, &corners, cfg.board.cols as usize);
            overlay.save(debug_overlay_path(&cfg.debug_dir, path))?;
        }

        let image_points = corners
            .iter()
            .map(|p| Point2::new(p.x as f64, p.y as f64))
            .collect();
        set.push(world.clone(), image_points)?;
    }

    Ok((set, images.len()))
}

fn debug_overlay_path(debug_dir: &Path, image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    debug_dir.join(format!("{stem}_corners.png"))
}

/// Detect, accumulate and solve.
pub fn calibrate(cfg: &PipelineConfig) -> Result<CalibrationResult, PipelineError> {
    let (set, images) = collect_correspondences(cfg)?;
    if set.is_empty() {
        return Err(PipelineError::NoCornersDetected { images });
    }
    let image_size = set
        .image_size()
        .ok_or_else(|| PipelineError::NoImagesFound(cfg.image_dir.clone()))?;
    info!("board found in {} of {} images", set.len(), images);

    Ok(calibrate_camera(&set, image_size, &cfg.solver)?)
}

/// Rectify the held-out demo image and write the before/after figure.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn remove_distortion(
    cfg: &PipelineConfig,
    camera: &CameraMatrix,
    distortion: &Distortion,
) -> Result<UndistortReport, PipelineError> {
    let demo = &cfg.undistort;
    let mut original: RgbImage = image::open(cfg.undistort_image_path())?.to_rgb8();

    let (new_camera, roi) = optimal_new_camera_matrix(camera, distortion, original.dimensions(), demo.alpha)?;
    debug!("new camera matrix {:?}, valid roi {:?}", new_camera, roi);
    let mut undistorted = undistort_image(&original, camera, distortion, &new_camera);

    let white = Rgb([255, 255, 255]);
    for img in [&mut original, &mut undistorted] {
        draw_thick_line(img, demo.line_from, demo.line_to, demo.line_thickness, white);
    }

    side_by_side(&original, &undistorted).save(&demo.output_path)?;
    info!("wrote {}", demo.output_path.display());

    Ok(UndistortReport {
        new_camera,
        roi,
        output_path: demo.output_path.clone(),
    })
}

/// Calibrate and persist the result archive.
pub fn run_calibration(cfg: &PipelineConfig) -> Result<CalibrationResult, PipelineError> {
    let result = calibrate(cfg)?;
    save_calibration(&cfg.output_path, &result)?;
    info!("saved calibration to {}", cfg.output_path.display());
    Ok(result)
}

/// Calibrate, persist, then undistort the demo image with the in-memory result.
pub fn run_remove_distortion(cfg: &PipelineConfig) -> Result<(CalibrationResult, UndistortReport), PipelineError> {
    let result = run_calibration(cfg)?;
    let report = remove_distortion(cfg, &result.camera_matrix, &result.distortion)?;
    Ok((result, report))
}

/// Console summary in the shape of the classic calibration script output.
pub fn format_report(result: &CalibrationResult) -> String {
    format!(
        "Camera Matrix:\n{}\nReproj Error (pixels): {:.4}",
        result.camera_matrix.matrix(),
        result.rms_error
    )
}
