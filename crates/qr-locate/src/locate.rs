//! One-shot localization helpers bridging `image` buffers.

use qr_locate_core::{GrayImage, GrayImageView};
use qr_locate_finder::{LocateError, LocateParams, LocatePipeline, Located};

/// Borrow an `image::GrayImage` as the lightweight core view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Run the full pipeline once over a grayscale photo.
pub fn locate_in_gray(
    img: &::image::GrayImage,
    params: &LocateParams,
) -> Result<Located, LocateError> {
    locate_in_view(&gray_view(img), params)
}

/// Run the full pipeline once over a borrowed grayscale view.
pub fn locate_in_view(
    view: &GrayImageView<'_>,
    params: &LocateParams,
) -> Result<Located, LocateError> {
    let mut pipeline = LocatePipeline::new(params.clone());
    pipeline.set_input_gray(GrayImage {
        width: view.width,
        height: view.height,
        data: view.data.to_vec(),
    })?;
    pipeline.run().cloned()
}

/// Run the full pipeline once over an interleaved RGB buffer
/// (3 bytes per pixel).
pub fn locate_in_rgb(
    width: usize,
    height: usize,
    rgb: Vec<u8>,
    params: &LocateParams,
) -> Result<Located, LocateError> {
    let mut pipeline = LocatePipeline::new(params.clone());
    pipeline.set_input_rgb(width, height, rgb)?;
    pipeline.run().cloned()
}
