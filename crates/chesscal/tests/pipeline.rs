use approx::assert_relative_eq;
use chesscal::core::synthetic::{render_board, BoardPose, SyntheticBoard};
use chesscal::core::{CameraMatrix, Distortion};
use chesscal::{
    load_calibration, run_calibration, run_remove_distortion, PipelineConfig, PipelineError,
};
use std::path::Path;

const WIDTH: usize = 480;
const HEIGHT: usize = 360;

fn board() -> SyntheticBoard {
    SyntheticBoard {
        cols: 13,
        rows: 9,
        square_size: 1.0,
    }
}

fn truth() -> (CameraMatrix, Distortion) {
    (
        CameraMatrix::new(500.0, 500.0, 242.0, 178.0),
        Distortion::from_coeffs([-0.1, 0.02, 0.0, 0.0, 0.0]),
    )
}

fn write_views(dir: &Path) {
    let board = board();
    let (camera, distortion) = truth();
    let tilts = [
        (0.0, 0.0, 0.0),
        (0.25, 0.0, 0.05),
        (-0.25, 0.05, -0.05),
        (0.0, 0.25, 0.1),
        (0.05, -0.25, -0.1),
        (0.2, 0.2, 0.0),
    ];
    for (k, &(roll, pitch, yaw)) in tilts.iter().enumerate() {
        let pose = BoardPose::facing(board.center(), 23.0, roll, pitch, yaw);
        let gray = render_board(&board, &camera, &distortion, &pose, WIDTH, HEIGHT, 2);
        let img = image::GrayImage::from_raw(WIDTH as u32, HEIGHT as u32, gray.data).unwrap();
        img.save(dir.join(format!("img{}.png", k + 1))).unwrap();
    }
}

fn config(images: &Path, out: &Path) -> PipelineConfig {
    let mut cfg = PipelineConfig {
        image_dir: images.to_path_buf(),
        image_extension: "png".to_string(),
        output_path: out.join("calibration.npz"),
        debug_dir: out.join("debug"),
        ..PipelineConfig::default()
    };
    cfg.undistort.image = "img2.png".to_string();
    cfg.undistort.line_from = [400, 20];
    cfg.undistort.line_to = [410, 340];
    cfg.undistort.output_path = out.join("undistortion_comparison.png");
    cfg
}

#[test]
fn calibrates_rendered_views_and_writes_outputs() {
    let images = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_views(images.path());

    let mut cfg = config(images.path(), out.path());
    cfg.show_detections = true;
    let (result, report) = run_remove_distortion(&cfg).unwrap();

    let (camera, _) = truth();
    assert_eq!(result.view_count(), 6);
    assert!(result.rms_error < 0.3, "rms {}", result.rms_error);
    assert_relative_eq!(result.camera_matrix.fx, camera.fx, max_relative = 0.02);
    assert_relative_eq!(result.camera_matrix.fy, camera.fy, max_relative = 0.02);
    assert!((result.camera_matrix.cx - camera.cx).abs() < 5.0);
    assert!((result.camera_matrix.cy - camera.cy).abs() < 5.0);
    assert!(result.distortion.k1 < 0.0);

    let saved = load_calibration(&cfg.output_path).unwrap();
    assert_relative_eq!(saved.rms_error, result.rms_error);
    assert_relative_eq!(saved.camera_matrix.fx, result.camera_matrix.fx);
    assert_eq!(saved.rvecs.len(), 6);
    assert_eq!(saved.tvecs.len(), 6);

    let figure = image::open(&report.output_path).unwrap();
    assert_eq!(figure.width(), 2 * WIDTH as u32);
    assert_eq!(figure.height(), HEIGHT as u32);
    assert!(report.roi.width > 0 && report.roi.height > 0);

    for k in 1..=6 {
        assert!(cfg.debug_dir.join(format!("img{k}_corners.png")).is_file());
    }
}

#[test]
fn directory_without_boards_is_reported() {
    let images = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    for k in 0..2 {
        image::GrayImage::from_pixel(160, 120, image::Luma([90 + 40 * k]))
            .save(images.path().join(format!("blank{k}.png")))
            .unwrap();
    }

    let cfg = config(images.path(), out.path());
    match run_calibration(&cfg) {
        Err(PipelineError::NoCornersDetected { images }) => assert_eq!(images, 2),
        other => panic!("expected NoCornersDetected, got {other:?}"),
    }
    assert!(!cfg.output_path.exists());
}

#[test]
fn missing_image_directory_is_reported() {
    let out = tempfile::tempdir().unwrap();
    let cfg = config(&out.path().join("absent"), out.path());
    assert!(matches!(
        run_calibration(&cfg),
        Err(PipelineError::ImageDirectory { .. })
    ));
}
