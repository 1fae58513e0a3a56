//! Locate the finder geometry of a QR symbol in a photo and save the
//! rectified crop.
//!
//! ```sh
//! cargo run --example locate -- config.json
//! ```
//!
//! Config file:
//!
//! ```json
//! {
//!   "image_path": "photo.jpg",
//!   "output_path": "rectified.png",
//!   "params": { "harshness": 50.0 }
//! }
//! ```

use std::{env, fs, path::PathBuf};

use image::ImageReader;
use log::info;
use serde::Deserialize;

use qr_locate::core::to_grayscale;
use qr_locate::{LocateParams, LocatePipeline};

#[derive(Debug, Deserialize)]
struct ExampleConfig {
    image_path: String,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    params: Option<LocateParams>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let cfg: ExampleConfig = serde_json::from_str(&fs::read_to_string(&config_path)?)?;
    let params = cfg.params.unwrap_or_default();

    let rgb = ImageReader::open(&cfg.image_path)?.decode()?.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    info!("loaded {} ({width}x{height})", cfg.image_path);

    let gray = to_grayscale(width, height, rgb.as_raw());

    let mut pipeline = LocatePipeline::new(params);
    pipeline.set_input_gray(gray)?;
    let located = pipeline.run()?.clone();

    info!(
        "centers a=({:.1},{:.1}) b=({:.1},{:.1}) c=({:.1},{:.1})",
        located.triple.a.x,
        located.triple.a.y,
        located.triple.b.x,
        located.triple.b.y,
        located.triple.c.x,
        located.triple.c.y,
    );
    info!(
        "fourth corner ({:.1},{:.1}) via {:?}{}",
        located.corner.point.x,
        located.corner.point.y,
        located.corner.method,
        if located.corner.degraded {
            " (degraded)"
        } else {
            ""
        },
    );
    for entry in &pipeline.trace().entries {
        info!(
            "stage {:<14} {:>8.3?}{}",
            entry.stage,
            entry.duration,
            if entry.recomputed { "" } else { " (cached)" },
        );
    }

    let output_path = cfg
        .output_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("rectified.png"));
    let rectified = located.rectified;
    let out = image::GrayImage::from_raw(
        rectified.width as u32,
        rectified.height as u32,
        rectified.data,
    )
    .ok_or("rectified buffer has inconsistent dimensions")?;
    out.save(&output_path)?;
    info!("rectified image written to {}", output_path.display());

    Ok(())
}
