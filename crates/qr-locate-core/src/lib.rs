//! Image and numeric primitives for QR finder-pattern localization.
//!
//! This crate is intentionally small and knows nothing about finder
//! patterns themselves. It provides:
//! - grayscale pixel buffers and borrowed views with bilinear sampling,
//! - the preprocessing primitives the localization pipeline consumes
//!   (grayscale conversion, resize, box blur, adaptive thresholding,
//!   transposition),
//! - a 4-point projective homography and quad-to-quad warp,
//! - a Newton-Raphson range scanner for quartic polynomials.

mod homography;
mod image;
mod preprocess;
mod roots;

pub use homography::{homography_from_4pt, warp_perspective, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use preprocess::{
    adaptive_threshold, box_blur, fit_to_target, resize_bilinear, to_grayscale, transpose, BLACK,
    BLACK_SPLIT, WHITE,
};
pub use roots::{find_real_roots, RootScanParams};
