//! Version-gated localization pipeline.
//!
//! The stages form a linear dataflow (grayscale, resize, blur,
//! threshold, finder search, candidates, cull, clustering, fourth
//! corner, reprojection). Every new input or parameter value receives a
//! fresh version stamp from one monotonically increasing counter; a
//! stage recomputes only when the combined stamp of its declared
//! dependencies differs from the stamp it last computed from.
//! Superseded intermediate states are simply dropped: a stage always
//! sees the latest value of each dependency, never the value that
//! happened to exist when an earlier run was scheduled.

use std::time::{Duration, Instant};

use log::{debug, warn};
use nalgebra::Point2;
use serde::Serialize;

use qr_locate_core::{
    adaptive_threshold, box_blur, fit_to_target, resize_bilinear, to_grayscale, transpose,
    warp_perspective, GrayImage,
};

use crate::candidate::{apply_density_weighting, intersect_finder_lines, Candidate};
use crate::cluster::{cluster_candidates, Clustering, NUM_FINDER_PATTERNS};
use crate::error::LocateError;
use crate::geometry::{estimate_fourth_corner, order_cyclic, CornerEstimate, OrderedTriple};
use crate::params::LocateParams;
use crate::scanline::{finder_lines_horizontal, FinderLine};

/// Localization outcome: ordered centers, fourth corner, and the
/// rectified image with the quads that produced it.
#[derive(Clone, Debug)]
pub struct Located {
    pub triple: OrderedTriple,
    pub corner: CornerEstimate,
    /// Finder centers plus fourth corner, in warp order
    /// (a, b, c, d) = (bottom-left, top-left, top-right, bottom-right).
    pub source_quad: [Point2<f64>; 4],
    /// Axis-aligned destination square with margin.
    pub dest_quad: [Point2<f64>; 4],
    pub rectified: GrayImage,
}

/// Per-stage timing of one `run` call.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct StageTiming {
    pub stage: &'static str,
    pub duration: Duration,
    /// False when the cached output was still current.
    pub recomputed: bool,
}

/// Ordered stage timings of the most recent `run`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StageTrace {
    pub entries: Vec<StageTiming>,
}

impl StageTrace {
    pub fn recomputed(&self, stage: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.stage == stage && e.recomputed)
    }
}

enum InputImage {
    Rgb {
        width: usize,
        height: usize,
        data: Vec<u8>,
    },
    Gray(GrayImage),
    /// Already binarized; the preprocessing stages pass it through.
    Binary(GrayImage),
}

struct Stage<T> {
    value: T,
    /// Combined dependency stamp this value was computed from.
    stamp: u64,
}

/// Version stamps of the tunable parameter groups.
struct ParamStamps {
    preprocess: u64,
    scan: u64,
    score: u64,
    cull: u64,
    cluster: u64,
    corner: u64,
    warp: u64,
}

/// Staged, restartable localization pipeline.
///
/// Feed an input with one of the `set_input_*` methods, adjust
/// parameters as needed, and call [`run`](Self::run); only stages whose
/// inputs changed since the previous run are recomputed. Intermediate
/// stage outputs stay accessible for inspection after every run.
pub struct LocatePipeline {
    params: LocateParams,
    stamps: ParamStamps,
    next_version: u64,
    input: Option<Stage<InputImage>>,

    grayscale: Option<Stage<GrayImage>>,
    resized: Option<Stage<GrayImage>>,
    blurred: Option<Stage<GrayImage>>,
    binarized: Option<Stage<GrayImage>>,
    finder_lines: Option<Stage<(Vec<FinderLine>, Vec<FinderLine>)>>,
    candidates: Option<Stage<Vec<Candidate>>>,
    culled: Option<Stage<Vec<Candidate>>>,
    clustering: Option<Stage<Clustering>>,
    corner: Option<Stage<(OrderedTriple, CornerEstimate)>>,
    located: Option<Stage<Located>>,

    last_trace: StageTrace,
}

impl LocatePipeline {
    pub fn new(params: LocateParams) -> Self {
        let mut pipeline = Self {
            params,
            stamps: ParamStamps {
                preprocess: 0,
                scan: 0,
                score: 0,
                cull: 0,
                cluster: 0,
                corner: 0,
                warp: 0,
            },
            next_version: 1,
            input: None,
            grayscale: None,
            resized: None,
            blurred: None,
            binarized: None,
            finder_lines: None,
            candidates: None,
            culled: None,
            clustering: None,
            corner: None,
            located: None,
            last_trace: StageTrace::default(),
        };
        pipeline.stamps.preprocess = pipeline.bump();
        pipeline.stamps.scan = pipeline.bump();
        pipeline.stamps.score = pipeline.bump();
        pipeline.stamps.cull = pipeline.bump();
        pipeline.stamps.cluster = pipeline.bump();
        pipeline.stamps.corner = pipeline.bump();
        pipeline.stamps.warp = pipeline.bump();
        pipeline
    }

    fn bump(&mut self) -> u64 {
        let v = self.next_version;
        self.next_version += 1;
        v
    }

    pub fn params(&self) -> &LocateParams {
        &self.params
    }

    /// Timings of the most recent [`run`](Self::run).
    pub fn trace(&self) -> &StageTrace {
        &self.last_trace
    }

    /// Feed a photo as an interleaved RGB buffer.
    pub fn set_input_rgb(
        &mut self,
        width: usize,
        height: usize,
        data: Vec<u8>,
    ) -> Result<(), LocateError> {
        if width == 0 || height == 0 {
            return Err(LocateError::EmptyImage { width, height });
        }
        let expected = width * height * 3;
        if data.len() != expected {
            return Err(LocateError::InvalidRgbBuffer {
                expected,
                got: data.len(),
            });
        }
        let stamp = self.bump();
        self.input = Some(Stage {
            value: InputImage::Rgb {
                width,
                height,
                data,
            },
            stamp,
        });
        Ok(())
    }

    /// Feed an already grayscale photo.
    pub fn set_input_gray(&mut self, image: GrayImage) -> Result<(), LocateError> {
        if image.is_empty() {
            return Err(LocateError::EmptyImage {
                width: image.width,
                height: image.height,
            });
        }
        let stamp = self.bump();
        self.input = Some(Stage {
            value: InputImage::Gray(image),
            stamp,
        });
        Ok(())
    }

    /// Feed an already binarized image; resize, blur and thresholding
    /// pass it through untouched.
    pub fn set_input_binary(&mut self, image: GrayImage) -> Result<(), LocateError> {
        if image.is_empty() {
            return Err(LocateError::EmptyImage {
                width: image.width,
                height: image.height,
            });
        }
        let stamp = self.bump();
        self.input = Some(Stage {
            value: InputImage::Binary(image),
            stamp,
        });
        Ok(())
    }

    pub fn set_preprocess_params(&mut self, preprocess: crate::params::PreprocessParams) {
        if self.params.preprocess != preprocess {
            self.params.preprocess = preprocess;
            self.stamps.preprocess = self.bump();
        }
    }

    pub fn set_scan_threshold(&mut self, threshold: f64) {
        if self.params.scan_threshold != threshold {
            self.params.scan_threshold = threshold;
            self.stamps.scan = self.bump();
        }
    }

    pub fn set_weight_exponent(&mut self, exponent: f64) {
        if self.params.weight_exponent != exponent {
            self.params.weight_exponent = exponent;
            self.stamps.score = self.bump();
        }
    }

    pub fn set_harshness(&mut self, harshness: f64) {
        if self.params.harshness != harshness {
            self.params.harshness = harshness;
            self.stamps.cull = self.bump();
        }
    }

    pub fn set_cluster_params(&mut self, cluster: crate::cluster::ClusterParams) {
        self.params.cluster = cluster;
        self.stamps.cluster = self.bump();
    }

    pub fn set_corner_params(&mut self, corner: crate::geometry::CornerParams) {
        self.params.corner = corner;
        self.stamps.corner = self.bump();
    }

    pub fn set_warp_params(&mut self, warp: crate::params::WarpParams) {
        if self.params.warp != warp {
            self.params.warp = warp;
            self.stamps.warp = self.bump();
        }
    }

    /// Binarized image of the last run, if that stage has produced one.
    pub fn binarized(&self) -> Option<&GrayImage> {
        self.binarized.as_ref().map(|s| &s.value)
    }

    /// Horizontal and vertical finder lines of the last run.
    pub fn finder_lines(&self) -> Option<(&[FinderLine], &[FinderLine])> {
        self.finder_lines
            .as_ref()
            .map(|s| (s.value.0.as_slice(), s.value.1.as_slice()))
    }

    /// Candidates after density weighting, before culling.
    pub fn candidates(&self) -> Option<&[Candidate]> {
        self.candidates.as_ref().map(|s| s.value.as_slice())
    }

    /// Candidates that survived outlier culling.
    pub fn culled(&self) -> Option<&[Candidate]> {
        self.culled.as_ref().map(|s| s.value.as_slice())
    }

    pub fn clustering(&self) -> Option<&Clustering> {
        self.clustering.as_ref().map(|s| &s.value)
    }

    /// Recompute stale stages and return the localization result.
    ///
    /// On [`LocateError::InsufficientCandidates`] the pipeline halts
    /// after culling: upstream stage outputs stay cached and
    /// accessible, downstream outputs are cleared.
    pub fn run(&mut self) -> Result<&Located, LocateError> {
        let mut trace = StageTrace::default();

        let Some(input) = self.input.as_ref() else {
            self.last_trace = trace;
            return Err(LocateError::MissingInput);
        };
        let input_stamp = input.stamp;
        let passthrough = matches!(input.value, InputImage::Binary(_));

        // grayscale <- input
        let gray_stamp = input_stamp;
        refresh(&mut self.grayscale, gray_stamp, "grayscale", &mut trace, || {
            Ok(match &input.value {
                InputImage::Rgb {
                    width,
                    height,
                    data,
                } => to_grayscale(*width, *height, data),
                InputImage::Gray(image) | InputImage::Binary(image) => image.clone(),
            })
        })?;

        // resize/blur/threshold <- grayscale + preprocess params
        let preprocess_stamp = gray_stamp.max(self.stamps.preprocess);
        let preprocess = self.params.preprocess;

        let gray = stage_value(&self.grayscale);
        refresh(&mut self.resized, preprocess_stamp, "resize", &mut trace, || {
            if passthrough {
                return Ok(gray.clone());
            }
            let (w, h) = fit_to_target(gray.width, gray.height, preprocess.resize_target);
            Ok(resize_bilinear(&gray.as_view(), w, h))
        })?;

        let resized = stage_value(&self.resized);
        refresh(&mut self.blurred, preprocess_stamp, "blur", &mut trace, || {
            if passthrough {
                return Ok(resized.clone());
            }
            Ok(box_blur(&resized.as_view(), preprocess.blur_radius))
        })?;

        let blurred = stage_value(&self.blurred);
        refresh(
            &mut self.binarized,
            preprocess_stamp,
            "threshold",
            &mut trace,
            || {
                if passthrough {
                    return Ok(blurred.clone());
                }
                let block = preprocess.block_size(blurred.width, blurred.height);
                Ok(adaptive_threshold(
                    &blurred.as_view(),
                    block,
                    preprocess.threshold_c,
                ))
            },
        )?;

        // finder search <- binarized + scan threshold
        let scan_stamp = preprocess_stamp.max(self.stamps.scan);
        let scan_threshold = self.params.scan_threshold;
        let binarized = stage_value(&self.binarized);
        refresh(
            &mut self.finder_lines,
            scan_stamp,
            "finder_search",
            &mut trace,
            || {
                let view = binarized.as_view();
                let horizontal = finder_lines_horizontal(&view, scan_threshold);
                // Scan the transposed image once instead of calling the
                // vertical helper, so both directions share the buffer.
                let transposed = transpose(&view);
                let vertical = finder_lines_horizontal(&transposed.as_view(), scan_threshold);
                debug!(
                    "finder search: {} horizontal, {} vertical lines",
                    horizontal.len(),
                    vertical.len()
                );
                Ok((horizontal, vertical))
            },
        )?;

        // candidates <- finder lines + weight exponent
        let score_stamp = scan_stamp.max(self.stamps.score);
        let weight_exponent = self.params.weight_exponent;
        let lines = stage_value(&self.finder_lines);
        refresh(
            &mut self.candidates,
            score_stamp,
            "candidates",
            &mut trace,
            || {
                let mut candidates = intersect_finder_lines(&lines.0, &lines.1);
                apply_density_weighting(&mut candidates, weight_exponent);
                Ok(candidates)
            },
        )?;

        // cull <- candidates + harshness
        let cull_stamp = score_stamp.max(self.stamps.cull);
        let harshness = self.params.harshness;
        let candidates = stage_value(&self.candidates);
        refresh(&mut self.culled, cull_stamp, "cull", &mut trace, || {
            Ok(crate::cull::cull_outliers(candidates, harshness))
        })?;

        let survivors = stage_value(&self.culled).len();
        if survivors < NUM_FINDER_PATTERNS {
            self.clustering = None;
            self.corner = None;
            self.located = None;
            self.last_trace = trace;
            warn!("pipeline halted: {survivors} finder assumptions after culling");
            return Err(LocateError::InsufficientCandidates { found: survivors });
        }

        // clustering <- culled + cluster params
        let cluster_stamp = cull_stamp.max(self.stamps.cluster);
        let cluster_params = self.params.cluster;
        let culled = stage_value(&self.culled);
        refresh(
            &mut self.clustering,
            cluster_stamp,
            "clustering",
            &mut trace,
            || cluster_candidates(culled, &cluster_params),
        )?;

        // fourth corner <- clustering + corner params
        let corner_stamp = cluster_stamp.max(self.stamps.corner);
        let corner_params = self.params.corner;
        let (bin_w, bin_h) = (binarized.width, binarized.height);
        let clustering = stage_value(&self.clustering);
        refresh(
            &mut self.corner,
            corner_stamp,
            "fourth_corner",
            &mut trace,
            || {
                let triple = order_cyclic([
                    clustering.centroids[0].position,
                    clustering.centroids[1].position,
                    clustering.centroids[2].position,
                ]);
                let estimate = estimate_fourth_corner(&triple, &corner_params, bin_w, bin_h);
                Ok((triple, estimate))
            },
        )?;

        // reprojection <- binarized + corner + warp params
        let warp_stamp = preprocess_stamp
            .max(corner_stamp)
            .max(self.stamps.warp);
        let warp = self.params.warp;
        let (triple, estimate) = stage_value(&self.corner);
        let (triple, estimate) = (*triple, *estimate);
        refresh(
            &mut self.located,
            warp_stamp,
            "reprojection",
            &mut trace,
            || {
                let side = warp.side as f64;
                let margin = warp.margin as f64;
                let out = warp.output_size();

                let source_quad = [triple.a, triple.b, triple.c, estimate.point];
                let dest_quad = [
                    Point2::new(margin, margin + side),
                    Point2::new(margin, margin),
                    Point2::new(margin + side, margin),
                    Point2::new(margin + side, margin + side),
                ];

                let rectified =
                    warp_perspective(&binarized.as_view(), &source_quad, &dest_quad, out, out)
                        .ok_or(LocateError::WarpFailed)?;

                Ok(Located {
                    triple,
                    corner: estimate,
                    source_quad,
                    dest_quad,
                    rectified,
                })
            },
        )?;

        self.last_trace = trace;
        Ok(stage_value(&self.located))
    }
}

/// Recompute a stage when its dependency stamp changed, otherwise keep
/// the cached value; either way record a trace entry.
fn refresh<'a, T>(
    slot: &'a mut Option<Stage<T>>,
    stamp: u64,
    name: &'static str,
    trace: &mut StageTrace,
    compute: impl FnOnce() -> Result<T, LocateError>,
) -> Result<&'a T, LocateError> {
    if matches!(slot, Some(stage) if stage.stamp == stamp) {
        trace.entries.push(StageTiming {
            stage: name,
            duration: Duration::ZERO,
            recomputed: false,
        });
        Ok(&slot.as_ref().unwrap().value)
    } else {
        let started = Instant::now();
        let value = compute()?;
        trace.entries.push(StageTiming {
            stage: name,
            duration: started.elapsed(),
            recomputed: true,
        });
        Ok(&slot.insert(Stage { value, stamp }).value)
    }
}

/// Value of a stage that the current `run` has already refreshed.
fn stage_value<T>(slot: &Option<Stage<T>>) -> &T {
    match slot {
        Some(stage) => &stage.value,
        // refresh() always fills the slot before this is reachable.
        None => unreachable!("stage read before refresh"),
    }
}
