//! Candidate finder centers from crossing scanline detections.
//!
//! A horizontal and a vertical [`FinderLine`] vote for a common center
//! when each one's span contains the other's scan index. The crossing
//! point becomes a weighted candidate; a second pass amplifies
//! candidates that sit in dense neighborhoods and starves isolated
//! spurious crossings.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::scanline::FinderLine;

/// One possible finder-pattern center.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub position: Point2<f64>,
    /// Unitless relative confidence, non-negative. Not a probability.
    pub weight: f64,
    /// Length of the matched horizontal window.
    pub matched_width: f64,
    /// Length of the matched vertical window.
    pub matched_height: f64,
}

/// Symmetric relative similarity of two lengths, 100 for equal inputs.
fn sim_symmetric(x: f64, y: f64) -> f64 {
    100.0 - (x - y).abs() / (x + y) * 50.0
}

/// How close `cross` sits to the middle of `span`, 1 at the center and
/// 0 at either edge.
fn centrality(cross: f64, span: [usize; 2]) -> f64 {
    let mid = (span[0] + span[1]) as f64 / 2.0;
    let half = (span[1] - span[0]) as f64 / 2.0;
    if half <= 0.0 {
        return 0.0;
    }
    (1.0 - (cross - mid).abs() / half).max(0.0)
}

/// Intersect horizontal and vertical finder lines into weighted
/// candidates.
///
/// The base weight combines the symmetric similarity of the two matched
/// lengths with the centrality of the crossing inside each span, so a
/// crossing near the middle of two equally long windows scores close
/// to 100.
pub fn intersect_finder_lines(
    horizontal: &[FinderLine],
    vertical: &[FinderLine],
) -> Vec<Candidate> {
    let mut out = Vec::new();

    for h in horizontal {
        let y = h.index;
        for v in vertical {
            let x = v.index;
            let crosses = h.span[0] <= x && x <= h.span[1] && v.span[0] <= y && y <= v.span[1];
            if !crosses {
                continue;
            }

            let width = (h.span[1] - h.span[0]) as f64;
            let height = (v.span[1] - v.span[0]) as f64;
            let weight = sim_symmetric(width, height)
                * centrality(x as f64, h.span)
                * centrality(y as f64, v.span);

            out.push(Candidate {
                position: Point2::new(x as f64, y as f64),
                weight,
                matched_width: width,
                matched_height: height,
            });
        }
    }

    out
}

/// Rescale every weight by the candidate's neighborhood density:
/// `(weight * sum_j 1/(d²_ij + 1))^exponent` over all other candidates.
///
/// Full pairwise distances, O(n²); candidate counts stay in the tens to
/// low hundreds.
pub fn apply_density_weighting(candidates: &mut [Candidate], exponent: f64) {
    let positions: Vec<Point2<f64>> = candidates.iter().map(|c| c.position).collect();

    for (i, candidate) in candidates.iter_mut().enumerate() {
        let mut density = 0.0;
        for (j, other) in positions.iter().enumerate() {
            if i == j {
                continue;
            }
            let d2 = (candidate.position - other).norm_squared();
            density += 1.0 / (d2 + 1.0);
        }
        candidate.weight = (candidate.weight * density).powf(exponent);
    }
}
