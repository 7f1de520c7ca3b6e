use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibError {
    #[error("no point correspondences to calibrate from")]
    NoCorrespondences,
    #[error("view {view}: {world} world points but {image} image points")]
    MismatchedCorrespondences {
        view: usize,
        world: usize,
        image: usize,
    },
    #[error("view {view} has {count} points, at least 4 are required")]
    TooFewPoints { view: usize, count: usize },
    #[error("degenerate configuration: {0}")]
    DegenerateConfiguration(&'static str),
    #[error("solver diverged to a non-physical camera")]
    SolverDiverged,
    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },
}
