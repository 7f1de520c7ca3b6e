use crate::PipelineConfig;
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use chesscal_chessboard::{
    refine_corners, BoardSpec, ChessboardDetector, ChessboardParams, GridGraphParams, SubPixParams,
};
use chesscal_core::{Corner, GrayImageView};
use log::debug;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Default settings for the `chess-corners` ChESS detector.
pub fn default_chess_config() -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.params.threshold_rel = 0.2;
    cfg.params.nms_radius = 2;
    cfg
}

/// Borrow an `image::GrayImage` as a `chesscal-core` view.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Detect ChESS corners and adapt them into `chesscal-core::Corner`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, cfg), fields(width = img.width(), height = img.height()))
)]
pub fn detect_corners(img: &::image::GrayImage, cfg: &ChessConfig) -> Vec<Corner> {
    find_chess_corners_image(img, cfg)
        .iter()
        .map(adapt_chess_corner)
        .collect()
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: c.orientation,
        strength: c.response,
    }
}

/// Full per-image corner extraction: ChESS candidates, board grid, sub-pixel
/// refinement.
pub struct CornerExtractor {
    chess: ChessConfig,
    detector: ChessboardDetector,
    subpix: SubPixParams,
}

impl CornerExtractor {
    pub fn new(
        board: BoardSpec,
        params: ChessboardParams,
        graph: GridGraphParams,
        subpix: SubPixParams,
    ) -> Self {
        Self {
            chess: default_chess_config(),
            detector: ChessboardDetector::new(board, params, graph),
            subpix,
        }
    }

    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self::new(
            cfg.board,
            cfg.chessboard.clone(),
            cfg.graph.clone(),
            cfg.subpix.clone(),
        )
    }

    pub fn board(&self) -> &BoardSpec {
        &self.detector.board
    }

    /// Inner corners in board row-major order, or `None` if the complete
    /// board is not visible.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(width = img.width(), height = img.height()))
    )]
    pub fn extract(&self, img: &::image::GrayImage) -> Option<Vec<Point2<f32>>> {
        let corners = detect_corners(img, &self.chess);
        let Some(detection) = self.detector.detect_from_corners(&corners) else {
            debug!("no {}x{} board among {} ChESS corners", self.board().cols, self.board().rows, corners.len());
            return None;
        };

        let mut points = detection.corners;
        refine_corners(&gray_view(img), &mut points, &self.subpix);
        Some(points)
    }
}
