//! Split-conformal uncertainty quantification.

use crate::error::MatchError;
use std::collections::HashMap;

/// A symmetric prediction interval at the requested coverage.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    pub coverage: f64,
}

/// Conservative, coverage-valid quantile: sort ascending, take index
/// `ceil((n+1)(1-alpha)) - 1` clamped to `[0, n-1]`. Fails on an empty
/// input.
pub fn calibrate(scores: &[f64], alpha: f64) -> Result<f64, MatchError> {
    if scores.is_empty() {
        return Err(MatchError::EmptyInput);
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let raw_idx = ((n as f64 + 1.0) * (1.0 - alpha)).ceil() as i64 - 1;
    let idx = raw_idx.clamp(0, n as i64 - 1) as usize;
    Ok(sorted[idx])
}

/// `{ pred - q, pred + q, 1 - alpha }`.
pub fn interval(pred: f64, q: f64, alpha: f64) -> Interval {
    Interval {
        lower: pred - q,
        upper: pred + q,
        coverage: 1.0 - alpha,
    }
}

/// Every label whose score does not exceed `calibrate(calib_scores, alpha)`.
pub fn prediction_set(
    label_scores: &HashMap<String, f64>,
    calib_scores: &[f64],
    alpha: f64,
) -> Result<Vec<String>, MatchError> {
    let q = calibrate(calib_scores, alpha)?;
    Ok(label_scores
        .iter()
        .filter(|(_, &score)| score <= q)
        .map(|(label, _)| label.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_scores_fail() {
        assert_eq!(calibrate(&[], 0.1).unwrap_err(), MatchError::EmptyInput);
    }

    #[test]
    fn scenario_6_quantile_and_interval() {
        let scores = vec![0.10, 0.15, 0.18, 0.20, 0.25, 0.30];
        let q = calibrate(&scores, 0.1).unwrap();
        assert!((q - 0.30).abs() < 1e-9);

        let iv = interval(0.5, q, 0.1);
        assert!((iv.lower - 0.20).abs() < 1e-9);
        assert!((iv.upper - 0.80).abs() < 1e-9);
        assert!((iv.coverage - 0.9).abs() < 1e-9);
    }

    #[test]
    fn calibrate_returns_an_element_of_scores() {
        let scores = vec![0.3, 0.1, 0.9, 0.5, 0.2];
        for alpha in [0.01, 0.1, 0.5, 0.9] {
            let q = calibrate(&scores, alpha).unwrap();
            assert!(scores.iter().any(|&s| (s - q).abs() < 1e-12));
        }
    }

    #[test]
    fn prediction_set_includes_only_scores_at_or_below_quantile() {
        let mut label_scores = HashMap::new();
        label_scores.insert("a".to_string(), 0.1);
        label_scores.insert("b".to_string(), 0.9);
        let calib = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let set = prediction_set(&label_scores, &calib, 0.2).unwrap();
        assert!(set.contains(&"a".to_string()));
    }
}
