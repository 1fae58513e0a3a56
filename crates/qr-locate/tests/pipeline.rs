//! End-to-end pipeline tests over synthetic binary images.

use qr_locate::core::{GrayImage, BLACK, WHITE};
use qr_locate::{
    CameraParams, ClusterParams, CornerMethod, CornerParams, LocateError, LocateParams,
    LocatePipeline,
};

/// Paint a filled, axis-aligned square centered on `(cx, cy)`.
fn fill_centered_square(img: &mut GrayImage, cx: usize, cy: usize, size: usize, value: u8) {
    let half = size / 2;
    for y in (cy - half)..(cy + half) {
        for x in (cx - half)..(cx + half) {
            img.data[y * img.width + x] = value;
        }
    }
}

/// Paint a 7x7-module finder pattern (black ring, white ring, black
/// core) centered on `(cx, cy)`.
fn draw_finder(img: &mut GrayImage, cx: usize, cy: usize, module: usize) {
    fill_centered_square(img, cx, cy, 7 * module, BLACK);
    fill_centered_square(img, cx, cy, 5 * module, WHITE);
    fill_centered_square(img, cx, cy, 3 * module, BLACK);
}

/// Three finder patterns on white, no marker at bottom-right.
fn three_marker_image() -> GrayImage {
    let mut img = GrayImage::filled(400, 400, WHITE);
    draw_finder(&mut img, 50, 50, 10);
    draw_finder(&mut img, 50, 350, 10);
    draw_finder(&mut img, 350, 50, 10);
    img
}

fn test_params() -> LocateParams {
    LocateParams {
        cluster: ClusterParams {
            max_tries: 32,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn locates_the_missing_corner_naively() {
    let mut pipeline = LocatePipeline::new(test_params());
    pipeline
        .set_input_binary(three_marker_image())
        .expect("input");
    let located = pipeline.run().expect("locate").clone();

    // Elbow at the top-left marker, diagonal between the other two.
    assert!((located.triple.b.x - 50.0).abs() < 3.0);
    assert!((located.triple.b.y - 50.0).abs() < 3.0);

    let d = located.corner.point;
    assert_eq!(located.corner.method, CornerMethod::Naive);
    assert!(!located.corner.degraded);
    assert!(
        (d.x - 350.0).abs() < 3.0 && (d.y - 350.0).abs() < 3.0,
        "fourth corner at ({:.2}, {:.2})",
        d.x,
        d.y
    );

    let out = pipeline.params().warp.output_size();
    let located = pipeline.run().expect("re-run");
    assert_eq!(located.rectified.width, out);
    assert_eq!(located.rectified.height, out);
}

#[test]
fn perspective_method_agrees_on_a_fronto_parallel_scene() {
    let mut params = test_params();
    params.corner = CornerParams {
        method: CornerMethod::Perspective,
        camera: CameraParams::default(),
    };

    let mut pipeline = LocatePipeline::new(params);
    pipeline
        .set_input_binary(three_marker_image())
        .expect("input");
    let located = pipeline.run().expect("locate");

    // A straight-on capture is its own parallelogram; the depth solve
    // must agree with the naive corner instead of degrading.
    assert_eq!(located.corner.method, CornerMethod::Perspective);
    assert!(!located.corner.degraded);
    let d = located.corner.point;
    assert!(
        (d.x - 350.0).abs() < 3.0 && (d.y - 350.0).abs() < 3.0,
        "fourth corner at ({:.2}, {:.2})",
        d.x,
        d.y
    );
}

#[test]
fn rectified_output_is_binarized_content() {
    let mut pipeline = LocatePipeline::new(test_params());
    pipeline
        .set_input_binary(three_marker_image())
        .expect("input");
    let located = pipeline.run().expect("locate");

    // The warp samples a black/white source; the output must stay
    // essentially bimodal (bilinear edges may blend).
    let extremes = located
        .rectified
        .data
        .iter()
        .filter(|&&v| v < 32 || v > 224)
        .count();
    assert!(extremes * 10 > located.rectified.data.len() * 9);
}

#[test]
fn unchanged_inputs_are_served_from_cache() {
    let mut pipeline = LocatePipeline::new(test_params());
    pipeline
        .set_input_binary(three_marker_image())
        .expect("input");
    pipeline.run().expect("first run");
    assert!(pipeline.trace().entries.iter().all(|e| e.recomputed));

    pipeline.run().expect("second run");
    assert!(pipeline.trace().entries.iter().all(|e| !e.recomputed));
}

#[test]
fn parameter_changes_invalidate_only_downstream_stages() {
    let mut pipeline = LocatePipeline::new(test_params());
    pipeline
        .set_input_binary(three_marker_image())
        .expect("input");
    pipeline.run().expect("first run");

    pipeline.set_harshness(60.0);
    pipeline.run().expect("second run");

    let trace = pipeline.trace();
    assert!(!trace.recomputed("finder_search"));
    assert!(!trace.recomputed("candidates"));
    assert!(trace.recomputed("cull"));
    assert!(trace.recomputed("clustering"));
    assert!(trace.recomputed("reprojection"));

    // Setting the same value again is a no-op.
    pipeline.set_harshness(60.0);
    pipeline.run().expect("third run");
    assert!(!pipeline.trace().recomputed("cull"));
}

#[test]
fn blank_image_halts_after_culling_with_upstream_intact() {
    let mut pipeline = LocatePipeline::new(test_params());
    pipeline
        .set_input_binary(GrayImage::filled(400, 400, WHITE))
        .expect("input");

    let err = pipeline.run();
    assert!(matches!(
        err,
        Err(LocateError::InsufficientCandidates { found: 0 })
    ));

    // Upstream stages stay inspectable; downstream ones are cleared.
    assert!(pipeline.binarized().is_some());
    assert!(pipeline.candidates().is_some());
    assert!(pipeline.clustering().is_none());
}

#[test]
fn missing_input_is_reported() {
    let mut pipeline = LocatePipeline::new(test_params());
    assert!(matches!(pipeline.run(), Err(LocateError::MissingInput)));
}
