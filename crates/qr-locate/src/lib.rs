//! High-level facade for the `qr-locate-*` workspace.
//!
//! This crate re-exports the stage primitives and provides end-to-end
//! helpers that take an `image::GrayImage` (or raw buffer) and return
//! the located finder geometry plus the rectified symbol image.
//!
//! ## Quickstart
//!
//! ```no_run
//! use qr_locate::{locate_in_gray, LocateParams};
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = ImageReader::open("photo.png")?.decode()?.to_luma8();
//! let located = locate_in_gray(&img, &LocateParams::default())?;
//! println!(
//!     "fourth corner at ({:.1}, {:.1})",
//!     located.corner.point.x, located.corner.point.y
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `qr_locate::core`: image buffers, preprocessing, homography/warp,
//!   polynomial roots.
//! - `qr_locate::finder`: scanline search, candidate scoring, culling,
//!   clustering, corner geometry, the staged pipeline.
//! - crate root: `locate_*` one-shot helpers bridging `image` buffers.

pub use qr_locate_core as core;
pub use qr_locate_finder as finder;

pub use qr_locate_finder::{
    CameraParams, CornerMethod, CornerParams, ClusterParams, LocateError, LocateParams,
    LocatePipeline, Located, PreprocessParams, WarpParams,
};

mod locate;

pub use locate::{gray_view, locate_in_gray, locate_in_rgb, locate_in_view};
