//! Preprocessing primitives feeding the finder search.
//!
//! Every function allocates a fresh output image; inputs are never
//! mutated, so each pipeline stage can keep referencing the buffer it
//! was computed from.

use crate::{sample_bilinear_u8, GrayImage, GrayImageView};

/// Binarized black pixel value.
pub const BLACK: u8 = 0;
/// Binarized white pixel value.
pub const WHITE: u8 = 255;
/// Values strictly below this count as black when reading a binarized image.
pub const BLACK_SPLIT: u8 = 128;

/// Convert an interleaved RGB buffer (3 bytes per pixel) to grayscale
/// using the usual luma weights.
pub fn to_grayscale(width: usize, height: usize, rgb: &[u8]) -> GrayImage {
    debug_assert_eq!(rgb.len(), width * height * 3);

    let mut data = Vec::with_capacity(width * height);
    for px in rgb.chunks_exact(3) {
        let luma = 0.2989 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
        data.push(luma.clamp(0.0, 255.0) as u8);
    }
    GrayImage {
        width,
        height,
        data,
    }
}

/// Target dimensions that bring the larger image side to `target`
/// while preserving aspect ratio. Dimensions never drop below 1.
pub fn fit_to_target(width: usize, height: usize, target: usize) -> (usize, usize) {
    if width >= height {
        let h = (height as f64 / width as f64 * target as f64).round() as usize;
        (target, h.max(1))
    } else {
        let w = (width as f64 / height as f64 * target as f64).round() as usize;
        (w.max(1), target)
    }
}

/// Bilinear resample to the requested dimensions.
pub fn resize_bilinear(src: &GrayImageView<'_>, out_w: usize, out_h: usize) -> GrayImage {
    let sx = src.width as f32 / out_w as f32;
    let sy = src.height as f32 / out_h as f32;

    let mut data = Vec::with_capacity(out_w * out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let px = (x as f32 + 0.5) * sx - 0.5;
            let py = (y as f32 + 0.5) * sy - 0.5;
            data.push(sample_bilinear_u8(src, px, py));
        }
    }
    GrayImage {
        width: out_w,
        height: out_h,
        data,
    }
}

/// Mean filter over the clipped `(2r+1)²` neighborhood. `radius = 0`
/// returns a plain copy.
pub fn box_blur(src: &GrayImageView<'_>, radius: usize) -> GrayImage {
    if radius == 0 {
        return GrayImage {
            width: src.width,
            height: src.height,
            data: src.data.to_vec(),
        };
    }

    let integral = IntegralImage::build(src);
    let r = radius as i64;
    let mut data = Vec::with_capacity(src.width * src.height);
    for y in 0..src.height as i64 {
        for x in 0..src.width as i64 {
            let (sum, count) = integral.window_sum(x - r, y - r, x + r, y + r);
            data.push((sum as f64 / count as f64).round() as u8);
        }
    }
    GrayImage {
        width: src.width,
        height: src.height,
        data,
    }
}

/// Local mean/stddev binarization.
///
/// Each pixel is compared against `mean - c * stddev` of the clipped
/// `block_size × block_size` window around it; pixels above become
/// [`WHITE`], the rest [`BLACK`]. An even `block_size` is bumped to the
/// next odd value so the window stays centered.
pub fn adaptive_threshold(src: &GrayImageView<'_>, block_size: usize, c: f64) -> GrayImage {
    let block = if block_size % 2 == 0 {
        block_size + 1
    } else {
        block_size
    };
    let half = (block / 2) as i64;

    let integral = IntegralImage::build(src);
    let mut data = Vec::with_capacity(src.width * src.height);
    for y in 0..src.height as i64 {
        for x in 0..src.width as i64 {
            let (sum, count) = integral.window_sum(x - half, y - half, x + half, y + half);
            let sq = integral.window_sum_sq(x - half, y - half, x + half, y + half);

            let n = count as f64;
            let mean = sum as f64 / n;
            let variance = (sq as f64 / n - mean * mean).max(0.0);
            let threshold = mean - c * variance.sqrt();

            let value = src.pixel(x as usize, y as usize) as f64;
            data.push(if value > threshold { WHITE } else { BLACK });
        }
    }
    GrayImage {
        width: src.width,
        height: src.height,
        data,
    }
}

/// Transposed copy: output pixel `(x, y)` = input pixel `(y, x)`.
///
/// Lets a row scanner double as a column scanner.
pub fn transpose(src: &GrayImageView<'_>) -> GrayImage {
    let mut data = vec![0u8; src.width * src.height];
    for y in 0..src.height {
        for x in 0..src.width {
            data[x * src.height + y] = src.pixel(x, y);
        }
    }
    GrayImage {
        width: src.height,
        height: src.width,
        data,
    }
}

/// Summed-area tables for value and squared-value window statistics.
struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<u64>,    // (w+1)*(h+1)
    sum_sq: Vec<u64>, // (w+1)*(h+1)
}

impl IntegralImage {
    fn build(src: &GrayImageView<'_>) -> Self {
        let w = src.width;
        let h = src.height;
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sum_sq = vec![0u64; stride * (h + 1)];

        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = src.pixel(x, y) as u64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + (x + 1);
                sum[idx] = sum[idx - stride] + row_sum;
                sum_sq[idx] = sum_sq[idx - stride] + row_sq;
            }
        }
        Self {
            width: w,
            height: h,
            sum,
            sum_sq,
        }
    }

    /// Clip the window to the image and return (sum, pixel count).
    fn window_sum(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> (u64, u64) {
        let (x0, y0, x1, y1) = self.clip(x0, y0, x1, y1);
        let count = ((x1 - x0 + 1) * (y1 - y0 + 1)) as u64;
        (self.rect(&self.sum, x0, y0, x1, y1), count)
    }

    fn window_sum_sq(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> u64 {
        let (x0, y0, x1, y1) = self.clip(x0, y0, x1, y1);
        self.rect(&self.sum_sq, x0, y0, x1, y1)
    }

    fn clip(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> (usize, usize, usize, usize) {
        let x0 = x0.max(0) as usize;
        let y0 = y0.max(0) as usize;
        let x1 = (x1.min(self.width as i64 - 1)) as usize;
        let y1 = (y1.min(self.height as i64 - 1)) as usize;
        (x0, y0, x1, y1)
    }

    fn rect(&self, table: &[u64], x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let stride = self.width + 1;
        let a = table[y0 * stride + x0];
        let b = table[y0 * stride + (x1 + 1)];
        let c = table[(y1 + 1) * stride + x0];
        let d = table[(y1 + 1) * stride + (x1 + 1)];
        d + a - b - c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_uses_luma_weights() {
        let img = to_grayscale(1, 1, &[255, 0, 0]);
        assert_eq!(img.data[0], (0.2989f32 * 255.0) as u8);
        let img = to_grayscale(1, 1, &[255, 255, 255]);
        assert_eq!(img.data[0], 254); // 0.2989 + 0.587 + 0.114 = 0.9999
    }

    #[test]
    fn fit_to_target_preserves_aspect() {
        assert_eq!(fit_to_target(800, 400, 400), (400, 200));
        assert_eq!(fit_to_target(300, 600, 400), (200, 400));
        assert_eq!(fit_to_target(1000, 1, 400), (400, 1));
    }

    #[test]
    fn blur_preserves_constant_images() {
        let img = GrayImage::filled(8, 8, 77);
        let blurred = box_blur(&img.as_view(), 2);
        assert_eq!(blurred, img);
    }

    #[test]
    fn blur_averages_neighborhood() {
        let mut img = GrayImage::filled(3, 3, 0);
        img.data[4] = 90; // center
        let blurred = box_blur(&img.as_view(), 1);
        assert_eq!(blurred.data[4], 10); // 90 / 9
    }

    #[test]
    fn transpose_round_trips() {
        let img = GrayImage {
            width: 3,
            height: 2,
            data: vec![1, 2, 3, 4, 5, 6],
        };
        let t = transpose(&img.as_view());
        assert_eq!((t.width, t.height), (2, 3));
        assert_eq!(t.data, vec![1, 4, 2, 5, 3, 6]);
        assert_eq!(transpose(&t.as_view()), img);
    }

    #[test]
    fn adaptive_threshold_splits_bimodal_window() {
        // Left half dark, right half bright; every pixel sees a mixed
        // window, so each side lands on its own side of the local mean.
        let mut img = GrayImage::filled(8, 8, 40);
        for y in 0..8 {
            for x in 4..8 {
                img.data[y * 8 + x] = 200;
            }
        }
        let bin = adaptive_threshold(&img.as_view(), 9, 0.1);
        assert_eq!(bin.data[0], BLACK);
        assert_eq!(bin.data[7], WHITE);
    }

    #[test]
    fn adaptive_threshold_accepts_even_block() {
        let img = GrayImage::filled(4, 4, 10);
        // An even block size must not panic; it is widened to odd.
        let _ = adaptive_threshold(&img.as_view(), 2, 0.0);
    }

    #[test]
    fn resize_halves_dimensions() {
        let img = GrayImage::filled(8, 4, 123);
        let out = resize_bilinear(&img.as_view(), 4, 2);
        assert_eq!((out.width, out.height), (4, 2));
        assert!(out.data.iter().all(|&v| v == 123));
    }
}
