//! Statistical outlier culling of weighted candidates.

use log::debug;

use crate::candidate::Candidate;

/// Mean and population standard deviation of the candidate weights.
fn weight_stats(candidates: &[Candidate]) -> Option<(f64, f64)> {
    if candidates.is_empty() {
        return None;
    }
    let n = candidates.len() as f64;
    let mean = candidates.iter().map(|c| c.weight).sum::<f64>() / n;
    let variance = candidates
        .iter()
        .map(|c| {
            let d = c.weight - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some((mean, variance.sqrt()))
}

/// Drop candidates whose weight falls strictly below
/// `mean - ((100 - harshness) / 100) * stddev`.
///
/// `harshness` is a strictness dial in 0-100: at 0 the threshold sits a
/// full standard deviation under the mean, at 100 it sits on the mean
/// itself. The polarity is part of the tuning surface; keep it.
pub fn cull_outliers(candidates: &[Candidate], harshness: f64) -> Vec<Candidate> {
    let Some((mean, stddev)) = weight_stats(candidates) else {
        return Vec::new();
    };

    let threshold = mean - (100.0 - harshness) / 100.0 * stddev;
    let kept: Vec<Candidate> = candidates
        .iter()
        .filter(|c| c.weight >= threshold)
        .copied()
        .collect();

    debug!(
        "culled {} of {} candidates (mean {mean:.3}, stddev {stddev:.3}, threshold {threshold:.3})",
        candidates.len() - kept.len(),
        candidates.len(),
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn with_weights(weights: &[f64]) -> Vec<Candidate> {
        weights
            .iter()
            .enumerate()
            .map(|(i, &w)| Candidate {
                position: Point2::new(i as f64, 0.0),
                weight: w,
                matched_width: 10.0,
                matched_height: 10.0,
            })
            .collect()
    }

    fn weights_of(candidates: &[Candidate]) -> Vec<f64> {
        candidates.iter().map(|c| c.weight).collect()
    }

    #[test]
    fn drops_the_stray_low_weight() {
        let mut weights = vec![1.0];
        weights.extend(std::iter::repeat(100.0).take(10));
        let culled = cull_outliers(&with_weights(&weights), 0.0);
        assert_eq!(weights_of(&culled), vec![100.0; 10]);
    }

    #[test]
    fn culling_a_culled_list_is_a_fixed_point() {
        let mut weights = vec![1.0];
        weights.extend(std::iter::repeat(100.0).take(10));

        let once = cull_outliers(&with_weights(&weights), 40.0);
        let twice = cull_outliers(&once, 40.0);
        assert_eq!(weights_of(&once), weights_of(&twice));
    }

    #[test]
    fn higher_harshness_drops_at_least_as_much() {
        let candidates = with_weights(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
        let permissive = cull_outliers(&candidates, 0.0);
        let strict = cull_outliers(&candidates, 100.0);
        assert!(strict.len() <= permissive.len());
        assert_eq!(permissive.len(), 5); // mean - stddev only sheds the lowest
        assert_eq!(strict.len(), 3); // threshold on the mean halves it
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(cull_outliers(&[], 50.0).is_empty());
    }

    #[test]
    fn uniform_weights_survive_any_harshness() {
        let candidates = with_weights(&[42.0; 8]);
        for harshness in [0.0, 50.0, 100.0] {
            assert_eq!(cull_outliers(&candidates, harshness).len(), 8);
        }
    }
}
