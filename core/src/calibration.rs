//! Platt scaling: logistic calibration from raw scores to probabilities.

const LEARNING_RATE: f64 = 0.01;
const MAX_ITERATIONS: usize = 100;
const CONVERGENCE_EPSILON: f64 = 1e-6;

/// The fitted `(a, b)` pair. `(-1, 0)` is both the fallback for degenerate
/// fits and the gradient descent starting point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlattModel {
    pub a: f64,
    pub b: f64,
}

impl Default for PlattModel {
    fn default() -> Self {
        Self { a: -1.0, b: 0.0 }
    }
}

impl PlattModel {
    /// `1 / (1 + exp(a*s + b))`.
    pub fn apply(&self, s: f64) -> f64 {
        1.0 / (1.0 + (self.a * s + self.b).exp())
    }

    /// Gradient-descent fit of Platt's smoothed targets. Returns the
    /// initial model unfitted when either class is absent, rather than
    /// failing.
    pub fn fit(scores: &[f64], labels: &[f64]) -> PlattModel {
        let n_pos = labels.iter().filter(|&&l| l >= 0.5).count();
        let n_neg = labels.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return PlattModel::default();
        }

        let t_pos = (n_pos as f64 + 1.0) / (n_pos as f64 + 2.0);
        let t_neg = 1.0 / (n_neg as f64 + 2.0);
        let targets: Vec<f64> = labels
            .iter()
            .map(|&l| if l >= 0.5 { t_pos } else { t_neg })
            .collect();

        let mut model = PlattModel::default();
        for _ in 0..MAX_ITERATIONS {
            let mut grad_a = 0.0;
            let mut grad_b = 0.0;
            for (&s, &target) in scores.iter().zip(targets.iter()) {
                let pred = model.apply(s);
                grad_a += (pred - target) * s;
                grad_b += pred - target;
            }
            let delta_a = LEARNING_RATE * grad_a;
            let delta_b = LEARNING_RATE * grad_b;
            model.a -= delta_a;
            model.b -= delta_b;
            if delta_a.abs() + delta_b.abs() < CONVERGENCE_EPSILON {
                break;
            }
        }
        model
    }
}

/// `apply(raw, model) * 100` when a model is supplied; otherwise `raw`
/// clamped to `[0, 100]`.
pub fn calibrate_confidence(raw: f64, model: Option<&PlattModel>) -> f64 {
    match model {
        Some(m) => m.apply(raw) * 100.0,
        None => raw.clamp(0.0, 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn degenerate_single_class_returns_initial_model() {
        let model = PlattModel::fit(&[0.1, 0.2, 0.3], &[0.0, 0.0, 0.0]);
        assert_eq!(model, PlattModel::default());
    }

    #[test]
    fn apply_is_in_open_unit_interval() {
        let model = PlattModel { a: 2.0, b: -1.0 };
        for s in [-5.0, -1.0, 0.0, 1.0, 5.0] {
            let p = model.apply(s);
            assert!(p > 0.0 && p < 1.0, "{p} out of (0,1) for s={s}");
        }
    }

    #[test]
    fn fit_produces_monotonic_scores_scenario_5() {
        let scores = vec![0.1, 0.3, 0.5, 0.7, 0.9];
        let labels = vec![0.0, 0.0, 1.0, 1.0, 1.0];
        let model = PlattModel::fit(&scores, &labels);

        assert!(model.apply(0.1) < model.apply(0.5));
        assert!(model.apply(0.5) < model.apply(0.9));
        let mid = model.apply(0.6);
        assert!(mid > 0.5 && mid < 1.0, "apply(0.6)={mid}");
    }

    #[test]
    fn clamp_without_model() {
        assert_eq!(calibrate_confidence(150.0, None), 100.0);
        assert_eq!(calibrate_confidence(-10.0, None), 0.0);
        assert_eq!(calibrate_confidence(42.0, None), 42.0);
    }
}
