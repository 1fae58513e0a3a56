//! Cyclic ordering of the three finder centers and fourth-corner
//! reconstruction.
//!
//! The three detected centers are assigned fixed roles: `a` and `c`
//! span the long diagonal of the symbol, `b` is the elbow between
//! them. The missing fourth corner is completed either by the
//! parallelogram law or by reconstructing the centers as a square under
//! a pinhole camera, which reduces to a quartic in one unknown depth.

use log::warn;
use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

use qr_locate_core::{find_real_roots, RootScanParams};

/// The three finder centers with fixed cyclic roles.
///
/// `a -> c` is the long diagonal; `b` is the elbow. The assignment is
/// rotation-stable: the same physical arrangement always produces the
/// same roles.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OrderedTriple {
    pub a: Point2<f64>,
    pub b: Point2<f64>,
    pub c: Point2<f64>,
    /// Set when the largest-angle tie-break could not single out an
    /// elbow; the pre-ordering is kept in that case.
    pub degenerate: bool,
}

/// Pinhole model for the perspective corner solve.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CameraParams {
    /// Horizontal field of view, degrees.
    pub fov_h_deg: f64,
    /// Vertical field of view, degrees.
    pub fov_v_deg: f64,
    /// Assumed relative depth of the elbow center.
    pub zb: f64,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            fov_h_deg: 60.0,
            fov_v_deg: 60.0,
            zb: 1.0,
        }
    }
}

/// Fourth-corner strategy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CornerMethod {
    /// Parallelogram completion `d = a + c - b`.
    Naive,
    /// Pinhole-camera square reconstruction, falling back to naive
    /// when the depth quartic has no root in range.
    Perspective,
}

/// Corner-solver settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CornerParams {
    pub method: CornerMethod,
    #[serde(default)]
    pub camera: CameraParams,
}

impl Default for CornerParams {
    fn default() -> Self {
        Self {
            method: CornerMethod::Naive,
            camera: CameraParams::default(),
        }
    }
}

/// Relative tolerance for accepting a reconstructed triple as a
/// genuine square (equal sides, right angle at the elbow).
const SQUARE_MATCH_TOL: f64 = 1e-4;

/// The reconstructed fourth corner.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CornerEstimate {
    pub point: Point2<f64>,
    /// Method that actually produced the point.
    pub method: CornerMethod,
    /// Set when the requested method had to fall back.
    pub degraded: bool,
}

/// Assign cyclic roles to three centers.
///
/// The centers are sorted by polar angle around their common centroid,
/// then re-rooted so the vertex with the strictly largest interior
/// angle becomes the elbow. Exact angle ties cannot name an elbow; the
/// angular pre-ordering is returned with the `degenerate` flag set.
pub fn order_cyclic(points: [Point2<f64>; 3]) -> OrderedTriple {
    let centroid = Point2::new(
        (points[0].x + points[1].x + points[2].x) / 3.0,
        (points[0].y + points[1].y + points[2].y) / 3.0,
    );

    let mut sorted = points;
    sorted.sort_by(|p, q| {
        let pa = (p.y - centroid.y).atan2(p.x - centroid.x);
        let qa = (q.y - centroid.y).atan2(q.x - centroid.x);
        pa.partial_cmp(&qa).unwrap_or(std::cmp::Ordering::Equal)
    });

    let angles = [
        interior_angle(sorted[0], sorted[1], sorted[2]),
        interior_angle(sorted[1], sorted[2], sorted[0]),
        interior_angle(sorted[2], sorted[0], sorted[1]),
    ];

    // Strict comparisons on purpose: an exact tie is degenerate, not an
    // arbitrary winner.
    let elbow = if angles[0] > angles[1] && angles[0] > angles[2] {
        Some(0)
    } else if angles[1] > angles[0] && angles[1] > angles[2] {
        Some(1)
    } else if angles[2] > angles[0] && angles[2] > angles[1] {
        Some(2)
    } else {
        None
    };

    match elbow {
        Some(e) => OrderedTriple {
            a: sorted[(e + 2) % 3],
            b: sorted[e],
            c: sorted[(e + 1) % 3],
            degenerate: false,
        },
        None => {
            warn!("interior-angle tie, keeping angular pre-ordering");
            OrderedTriple {
                a: sorted[0],
                b: sorted[1],
                c: sorted[2],
                degenerate: true,
            }
        }
    }
}

/// Interior angle at `vertex` spanned by rays to the other two points.
fn interior_angle(vertex: Point2<f64>, p: Point2<f64>, q: Point2<f64>) -> f64 {
    let u = p - vertex;
    let v = q - vertex;
    let norms = u.norm() * v.norm();
    if norms < f64::EPSILON {
        return 0.0;
    }
    (u.dot(&v) / norms).clamp(-1.0, 1.0).acos()
}

/// Parallelogram completion: `d = a + c - b`. Always computable; the
/// anchor for the perspective root selection.
pub fn naive_fourth_corner(triple: &OrderedTriple) -> Point2<f64> {
    Point2::new(
        triple.a.x + triple.c.x - triple.b.x,
        triple.a.y + triple.c.y - triple.b.y,
    )
}

/// Perspective-corrected fourth corner.
///
/// The three centers are treated as projections of a square under a
/// pinhole camera with the elbow at depth `zb`. The right-angle and
/// equal-sides constraints reduce to a quartic in the depth `za` of
/// role `a`; each real root is reconstructed in 3-D, parallelogram
/// completed, and re-projected. The root whose re-projection lands
/// closest to the naive corner wins — an empirical tie-break, not a
/// correctness proof. `None` when no root is found in range.
pub fn perspective_fourth_corner(
    triple: &OrderedTriple,
    camera: &CameraParams,
    image_width: usize,
    image_height: usize,
) -> Option<Point2<f64>> {
    let fx = (camera.fov_h_deg.to_radians() / 2.0).tan() * image_width as f64 / 2.0;
    let fy = (camera.fov_v_deg.to_radians() / 2.0).tan() * image_height as f64 / 2.0;
    if fx.abs() < f64::EPSILON || fy.abs() < f64::EPSILON {
        return None;
    }
    let cx = image_width as f64 / 2.0;
    let cy = image_height as f64 / 2.0;

    let ray = |p: Point2<f64>| Vector3::new((p.x - cx) / fx, (p.y - cy) / fy, 1.0);
    let ray_a = ray(triple.a);
    let ray_b = ray(triple.b);
    let ray_c = ray(triple.c);

    let aa = ray_a.dot(&ray_a);
    let ab = ray_a.dot(&ray_b);
    let ac = ray_a.dot(&ray_c);
    let bb = ray_b.dot(&ray_b);
    let bc = ray_b.dot(&ray_c);
    let cc = ray_c.dot(&ray_c);
    let zb = camera.zb;

    // With A = za*ray_a, B = zb*ray_b, C = zc*ray_c, the right angle at
    // B gives zc as a rational function of za; substituting it into the
    // equal-sides constraint |A-B|² = |C-B|² clears to this quartic.
    let coeffs = [
        aa * ac * ac,
        -2.0 * zb * ac * (aa * bc + ab * ac),
        zb * zb * (aa * bc * bc + 6.0 * ab * ac * bc - cc * ab * ab),
        zb.powi(3) * (2.0 * cc * ab * bb - 4.0 * ab * bc * bc - 2.0 * bb * ac * bc),
        zb.powi(4) * (2.0 * bb * bc * bc - cc * bb * bb),
    ];

    let roots = find_real_roots(&coeffs, &RootScanParams::default());
    if roots.is_empty() {
        return None;
    }

    let naive = naive_fourth_corner(triple);
    let mut best: Option<(f64, Point2<f64>)> = None;

    for za in roots {
        let Some(zc) = depth_of_c(za, zb, aa, ab, ac, bb, bc, cc) else {
            continue;
        };

        let a3 = ray_a * za;
        let b3 = ray_b * zb;
        let c3 = ray_c * zc;

        // Near-multiple roots can slip through the elimination with a
        // depth that is no square at all; only reconstructions that
        // actually satisfy both square constraints may compete.
        let ba = a3 - b3;
        let bc3 = c3 - b3;
        let (la, lc) = (ba.norm_squared(), bc3.norm_squared());
        if (la - lc).abs() > SQUARE_MATCH_TOL * la.max(lc) {
            continue;
        }
        if ba.dot(&bc3).abs() > SQUARE_MATCH_TOL * (la * lc).sqrt() {
            continue;
        }

        let d3 = a3 + c3 - b3;
        if d3.z.abs() < f64::EPSILON {
            continue;
        }

        let projected = Point2::new(d3.x / d3.z * fx + cx, d3.y / d3.z * fy + cy);
        if !projected.x.is_finite() || !projected.y.is_finite() {
            continue;
        }

        let dist = (projected - naive).norm_squared();
        if best.map_or(true, |(d, _)| dist < d) {
            best = Some((dist, projected));
        }
    }

    best.map(|(_, p)| p)
}

/// Depth of role `c` for a given `za`, from the right angle at `b`.
///
/// The elimination divides by `ac*za - bc*zb`, which vanishes for
/// straight-on captures with the elbow near the principal point; the
/// equal-sides quadratic pins `zc` directly in that case, preferring
/// the solution nearer `zb`.
#[allow(clippy::too_many_arguments)]
fn depth_of_c(
    za: f64,
    zb: f64,
    aa: f64,
    ab: f64,
    ac: f64,
    bb: f64,
    bc: f64,
    cc: f64,
) -> Option<f64> {
    let denom = ac * za - bc * zb;
    if denom.abs() > 1e-9 {
        return Some(zb * (ab * za - bb * zb) / denom);
    }

    // |C-B|² = |A-B|²  =>  cc*zc² - 2*bc*zb*zc - (aa*za² - 2*ab*zb*za) = 0
    let rhs = aa * za * za - 2.0 * ab * zb * za;
    let half_p = bc * zb; // cc*zc² - 2*half_p*zc - rhs = 0
    let disc = half_p * half_p + cc * rhs;
    if disc < 0.0 || cc.abs() < f64::EPSILON {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let z1 = (half_p + sqrt_disc) / cc;
    let z2 = (half_p - sqrt_disc) / cc;
    Some(if (z1 - zb).abs() <= (z2 - zb).abs() {
        z1
    } else {
        z2
    })
}

/// Run the configured corner strategy, falling back to the naive
/// corner (with the `degraded` flag and a warning) when the quartic
/// has no usable root.
pub fn estimate_fourth_corner(
    triple: &OrderedTriple,
    params: &CornerParams,
    image_width: usize,
    image_height: usize,
) -> CornerEstimate {
    match params.method {
        CornerMethod::Naive => CornerEstimate {
            point: naive_fourth_corner(triple),
            method: CornerMethod::Naive,
            degraded: false,
        },
        CornerMethod::Perspective => {
            match perspective_fourth_corner(triple, &params.camera, image_width, image_height) {
                Some(point) => CornerEstimate {
                    point,
                    method: CornerMethod::Perspective,
                    degraded: false,
                },
                None => {
                    warn!("depth quartic has no root in range, using parallelogram corner");
                    CornerEstimate {
                        point: naive_fourth_corner(triple),
                        method: CornerMethod::Naive,
                        degraded: true,
                    }
                }
            }
        }
    }
}
