/// Errors surfaced by the localization pipeline.
#[derive(thiserror::Error, Debug)]
pub enum LocateError {
    /// Fewer finder-center candidates survived generation and culling
    /// than the three a symbol needs. The pipeline halts after the
    /// culling stage; upstream stage outputs remain available.
    #[error("not enough finder assumptions (found {found}, need 3)")]
    InsufficientCandidates { found: usize },

    #[error("input image has zero area ({width}x{height})")]
    EmptyImage { width: usize, height: usize },

    #[error("invalid rgb buffer length (expected {expected} bytes, got {got})")]
    InvalidRgbBuffer { expected: usize, got: usize },

    #[error("clustering requires at least {needed} candidates, got {got}")]
    NotEnoughForClustering { needed: usize, got: usize },

    #[error("perspective warp failed: source quadrilateral is degenerate")]
    WarpFailed,

    #[error("no input image set")]
    MissingInput,
}
