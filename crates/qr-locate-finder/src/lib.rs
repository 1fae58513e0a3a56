//! Finder-pattern localization for QR-style symbols.
//!
//! Algorithm, stage by stage:
//! 1. Scan every row and column of a binarized image for 1:1:3:1:1
//!    black/white run signatures ([`finder_lines_horizontal`],
//!    [`finder_lines_vertical`]).
//! 2. Intersect horizontal and vertical detections into weighted
//!    center candidates, then amplify candidates sitting in dense
//!    neighborhoods ([`intersect_finder_lines`],
//!    [`apply_density_weighting`]).
//! 3. Cull statistical outliers by weight ([`cull_outliers`]).
//! 4. Partition the survivors into three weighted clusters, one per
//!    finder pattern, with restart-tolerant k-means
//!    ([`cluster_candidates`]).
//! 5. Order the cluster centroids into fixed cyclic roles and complete
//!    the missing fourth corner, either by the parallelogram law or by
//!    a pinhole-camera depth solve ([`order_cyclic`],
//!    [`estimate_fourth_corner`]).
//!
//! [`LocatePipeline`] runs the stages as a version-gated dataflow with
//! per-stage caching and timing; the individual stage functions stay
//! usable on their own.

mod candidate;
mod cluster;
mod cull;
mod error;
mod geometry;
mod params;
mod pipeline;
mod scanline;

pub use candidate::{apply_density_weighting, intersect_finder_lines, Candidate};
pub use cluster::{
    cluster_candidates, Centroid, ClusterParams, Clustering, NUM_FINDER_PATTERNS,
};
pub use cull::cull_outliers;
pub use error::LocateError;
pub use geometry::{
    estimate_fourth_corner, naive_fourth_corner, order_cyclic, perspective_fourth_corner,
    CameraParams, CornerEstimate, CornerMethod, CornerParams, OrderedTriple,
};
pub use params::{LocateParams, PreprocessParams, WarpParams};
pub use pipeline::{LocatePipeline, Located, StageTiming, StageTrace};
pub use scanline::{
    composite_fit, finder_lines_horizontal, finder_lines_vertical, FinderLine,
};
