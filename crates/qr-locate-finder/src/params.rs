//! Tunable parameters for the localization pipeline.

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterParams;
use crate::geometry::CornerParams;

/// Preprocessing settings (resize, blur, binarization).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreprocessParams {
    /// The larger image side is resized to this many pixels before any
    /// other stage runs.
    pub resize_target: usize,
    /// Box-blur radius; 0 disables smoothing.
    pub blur_radius: usize,
    /// The adaptive threshold block size is the average image side
    /// divided by this cell count (forced odd).
    pub threshold_cells: usize,
    /// Stddev multiplier subtracted from the local mean.
    pub threshold_c: f64,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            resize_target: 400,
            blur_radius: 1,
            threshold_cells: 5,
            threshold_c: 0.1,
        }
    }
}

impl PreprocessParams {
    /// Adaptive-threshold block size for an image of the given
    /// dimensions: average side over `threshold_cells`, forced odd.
    pub fn block_size(&self, width: usize, height: usize) -> usize {
        let approx = (width + height) / 2 / self.threshold_cells.max(1);
        if approx % 2 == 0 {
            approx + 1
        } else {
            approx.max(1)
        }
    }
}

/// Destination-square settings for the rectification warp.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarpParams {
    /// Side length of the rectified finder square, pixels.
    pub side: usize,
    /// Margin around the square; the output image is
    /// `side + 2 * margin` on each side.
    pub margin: usize,
}

impl Default for WarpParams {
    fn default() -> Self {
        Self {
            side: 150,
            margin: 30,
        }
    }
}

impl WarpParams {
    pub fn output_size(&self) -> usize {
        self.side + 2 * self.margin
    }
}

/// Complete parameter set for [`crate::LocatePipeline`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocateParams {
    #[serde(default)]
    pub preprocess: PreprocessParams,
    /// Scanline acceptance threshold, percent (0-100).
    #[serde(default = "default_scan_threshold")]
    pub scan_threshold: f64,
    /// Exponent of the candidate density amplification.
    #[serde(default = "default_weight_exponent")]
    pub weight_exponent: f64,
    /// Outlier-culling strictness dial (0-100).
    #[serde(default = "default_harshness")]
    pub harshness: f64,
    #[serde(default)]
    pub cluster: ClusterParams,
    #[serde(default)]
    pub corner: CornerParams,
    #[serde(default)]
    pub warp: WarpParams,
}

fn default_scan_threshold() -> f64 {
    25.0
}

fn default_weight_exponent() -> f64 {
    1.0
}

fn default_harshness() -> f64 {
    50.0
}

impl Default for LocateParams {
    fn default() -> Self {
        Self {
            preprocess: PreprocessParams::default(),
            scan_threshold: default_scan_threshold(),
            weight_exponent: default_weight_exponent(),
            harshness: default_harshness(),
            cluster: ClusterParams::default(),
            corner: CornerParams::default(),
            warp: WarpParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_is_always_odd() {
        let p = PreprocessParams::default();
        assert_eq!(p.block_size(400, 400) % 2, 1);
        assert_eq!(p.block_size(400, 300) % 2, 1);
        assert_eq!(p.block_size(10, 10) % 2, 1);
    }

    #[test]
    fn params_round_trip_through_json() {
        let params = LocateParams::default();
        let json = serde_json::to_string(&params).expect("serialize");
        let back: LocateParams = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.preprocess, params.preprocess);
        assert_eq!(back.scan_threshold, params.scan_threshold);
        assert_eq!(back.warp, params.warp);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let params: LocateParams =
            serde_json::from_str(r#"{"harshness": 80.0}"#).expect("deserialize");
        assert_eq!(params.harshness, 80.0);
        assert_eq!(params.scan_threshold, 25.0);
        assert_eq!(params.warp.side, 150);
    }
}
