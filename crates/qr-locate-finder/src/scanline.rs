//! Row-wise 1:1:3:1:1 finder-pattern search on a binarized image.
//!
//! Each row is run-length encoded into alternating black/white run
//! counts and scanned with a five-run window. A window is accepted when
//! the product of its per-run similarity scores clears a power
//! threshold, so one badly mismatched run sinks the whole window even
//! if the other four are perfect.

use qr_locate_core::{transpose, GrayImageView, BLACK_SPLIT};
use serde::{Deserialize, Serialize};

/// One detected finder signature along a single scanline.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FinderLine {
    /// Row index for horizontal scans, column index for vertical scans.
    pub index: usize,
    /// Start/end pixel offsets of the matched five-run window.
    pub span: [usize; 2],
}

/// Run-length encode a scanline into alternating black/white counts.
///
/// The sequence always starts with a black run; a leading zero is
/// inserted when the line opens white so window parity stays fixed.
pub(crate) fn run_length_encode(line: &[u8]) -> Vec<usize> {
    let mut runs = Vec::new();
    let Some(&first) = line.first() else {
        return runs;
    };

    let mut current_black = first < BLACK_SPLIT;
    if !current_black {
        runs.push(0);
    }

    let mut count = 0usize;
    for &px in line {
        let black = px < BLACK_SPLIT;
        if black == current_black {
            count += 1;
        } else {
            runs.push(count);
            current_black = black;
            count = 1;
        }
    }
    runs.push(count);
    runs
}

/// Multiplicative fit of a five-run window against the 1:1:3:1:1
/// finder ratio. A perfect window scores `100^5`.
///
/// Per-run similarity is `100 - |x - expected| / expected * 100`,
/// clamped at zero so one hopeless run cannot be cancelled by another.
pub fn composite_fit(window: [usize; 5]) -> f64 {
    let [a, b, c, d, e] = window;
    let average = (a + b + c + d + e) as f64 / 7.0; // 1+1+3+1+1 units

    let sim = |x: usize, expected: f64| -> f64 {
        (100.0 - (x as f64 - expected).abs() / expected * 100.0).max(0.0)
    };

    sim(a, average)
        * sim(b, average)
        * sim(c, 3.0 * average)
        * sim(d, average)
        * sim(e, average)
}

/// Scan one encoded line for finder windows. `index` tags the results.
fn scan_encoded_line(
    runs: &[usize],
    index: usize,
    threshold: f64,
    out: &mut Vec<FinderLine>,
) {
    let accept_above = (100.0 - threshold).powi(5);

    let mut offset = 0usize;
    let mut i = 0usize;
    while i + 4 < runs.len() {
        let window = [runs[i], runs[i + 1], runs[i + 2], runs[i + 3], runs[i + 4]];

        // A zero-length leading black run is parity filler, not a run.
        if window[0] > 0 && composite_fit(window) > accept_above {
            let len: usize = window.iter().sum();
            out.push(FinderLine {
                index,
                span: [offset, offset + len],
            });
        }

        // Advance one black/white pair so the window stays on black runs.
        offset += runs[i] + runs[i + 1];
        i += 2;
    }
}

/// Find 1:1:3:1:1 signatures along every row.
///
/// `threshold` is a percentage (0-100); higher accepts sloppier runs.
/// Rows are independent: the scan is a pure function of each row slice.
pub fn finder_lines_horizontal(image: &GrayImageView<'_>, threshold: f64) -> Vec<FinderLine> {
    let mut out = Vec::new();
    for y in 0..image.height {
        let runs = run_length_encode(image.row(y));
        scan_encoded_line(&runs, y, threshold, &mut out);
    }
    out
}

/// Find 1:1:3:1:1 signatures along every column by scanning the
/// transposed image; `index` is the column, spans are row offsets.
pub fn finder_lines_vertical(image: &GrayImageView<'_>, threshold: f64) -> Vec<FinderLine> {
    let transposed = transpose(image);
    finder_lines_horizontal(&transposed.as_view(), threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use qr_locate_core::{GrayImage, BLACK, WHITE};

    fn line_of(runs: &[(usize, u8)]) -> Vec<u8> {
        let mut px = Vec::new();
        for &(len, v) in runs {
            px.extend(std::iter::repeat(v).take(len));
        }
        px
    }

    #[test]
    fn encoding_starts_black_with_zero_filler() {
        let line = line_of(&[(3, WHITE), (2, BLACK), (1, WHITE)]);
        assert_eq!(run_length_encode(&line), vec![0, 3, 2, 1]);

        let line = line_of(&[(2, BLACK), (3, WHITE)]);
        assert_eq!(run_length_encode(&line), vec![2, 3]);
    }

    #[test]
    fn perfect_window_scores_maximum() {
        for unit in [1usize, 4, 10, 37] {
            let fit = composite_fit([unit, unit, 3 * unit, unit, unit]);
            assert_relative_eq!(fit, 100f64.powi(5));
        }
    }

    #[test]
    fn exact_pattern_yields_one_line_over_its_runs() {
        // 10-10-30-10-10 pattern inside white padding.
        let line = line_of(&[
            (15, WHITE),
            (10, BLACK),
            (10, WHITE),
            (30, BLACK),
            (10, WHITE),
            (10, BLACK),
            (25, WHITE),
        ]);
        let img = GrayImage {
            width: line.len(),
            height: 1,
            data: line,
        };
        let lines = finder_lines_horizontal(&img.as_view(), 25.0);
        assert_eq!(
            lines,
            vec![FinderLine {
                index: 0,
                span: [15, 85],
            }]
        );
    }

    #[test]
    fn distorted_pattern_needs_a_looser_threshold() {
        // Center run 25% long: 10-10-36-10-10.
        let line = line_of(&[
            (4, WHITE),
            (10, BLACK),
            (10, WHITE),
            (36, BLACK),
            (10, WHITE),
            (10, BLACK),
            (4, WHITE),
        ]);
        let img = GrayImage {
            width: line.len(),
            height: 1,
            data: line,
        };
        assert!(finder_lines_horizontal(&img.as_view(), 5.0).is_empty());
        assert_eq!(finder_lines_horizontal(&img.as_view(), 40.0).len(), 1);
    }

    #[test]
    fn blank_rows_produce_nothing() {
        let img = GrayImage::filled(64, 4, WHITE);
        assert!(finder_lines_horizontal(&img.as_view(), 50.0).is_empty());
        let img = GrayImage::filled(64, 4, BLACK);
        assert!(finder_lines_horizontal(&img.as_view(), 50.0).is_empty());
    }

    #[test]
    fn vertical_scan_reports_column_spans() {
        // Vertical 2-2-6-2-2 pattern in column 3.
        let mut img = GrayImage::filled(8, 20, WHITE);
        let column: Vec<u8> = line_of(&[
            (3, WHITE),
            (2, BLACK),
            (2, WHITE),
            (6, BLACK),
            (2, WHITE),
            (2, BLACK),
            (3, WHITE),
        ]);
        for (y, &v) in column.iter().enumerate() {
            img.data[y * 8 + 3] = v;
        }
        let lines = finder_lines_vertical(&img.as_view(), 25.0);
        assert_eq!(
            lines,
            vec![FinderLine {
                index: 3,
                span: [3, 17],
            }]
        );
    }
}
