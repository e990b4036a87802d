//! Offline fitting of the ridge ensemble.
//!
//! Member `m` of `K` trains on the first `n - (K - 1 - m) * fold` samples,
//! with `fold = n / (K + 1)`: expanding prefixes in time order, the last
//! member seeing the full history. Each member standardises its columns with
//! its own training mean and standard deviation, solves the ridge normal
//! equations by Cholesky, and folds the scaling back into raw-space weights.

use super::flatten_window;
use super::ridge::RidgeMember;
use crate::error::ForecastError;
use crate::features::FeatureVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub name: String,
    /// L2 penalty on standardised weights.
    pub alpha: f64,
    pub members: usize,
    pub window_len: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            name: "ridge".to_string(),
            alpha: 1.0,
            members: 5,
            window_len: 5,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "alpha must be positive, got {}",
                self.alpha
            )));
        }
        if self.members == 0 {
            return Err(ForecastError::InvalidConfig("members must be >= 1".into()));
        }
        if self.window_len == 0 {
            return Err(ForecastError::InvalidConfig("window_len must be >= 1".into()));
        }
        if self.name.is_empty() || self.name.contains(char::is_whitespace) {
            return Err(ForecastError::InvalidConfig(format!(
                "model name {:?} must be non-empty without whitespace",
                self.name
            )));
        }
        Ok(())
    }

    /// Smallest sample count `fit_ridge_ensemble` accepts.
    pub fn min_samples(&self) -> usize {
        2 * (self.members + 1)
    }
}

/// Build (flattened window, target) samples. Sample `t` uses the window ending
/// at vector `t` and the realized return after it; vectors without a target
/// are skipped.
pub fn training_set(
    vectors: &[FeatureVector],
    targets: &[Option<f64>],
    window_len: usize,
) -> Result<(Vec<Vec<f64>>, Vec<f64>), ForecastError> {
    if targets.len() != vectors.len() {
        return Err(ForecastError::InvalidInputShape {
            what: "targets",
            expected: vectors.len(),
            actual: targets.len(),
        });
    }
    let Some(first) = vectors.first() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let width = first.len();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for end in window_len.saturating_sub(1)..vectors.len() {
        if let Some(y) = targets[end] {
            let window = &vectors[end + 1 - window_len..=end];
            xs.push(flatten_window(window, window_len, width, Some(first.schema_version))?);
            ys.push(y);
        }
    }
    Ok((xs, ys))
}

/// Fit `config.members` ridge regressions on expanding prefixes of `(xs, ys)`.
pub fn fit_ridge_ensemble(
    xs: &[Vec<f64>],
    ys: &[f64],
    config: &FitConfig,
) -> Result<Vec<RidgeMember>, ForecastError> {
    config.validate()?;
    if xs.len() != ys.len() {
        return Err(ForecastError::InvalidInputShape {
            what: "training targets",
            expected: xs.len(),
            actual: ys.len(),
        });
    }
    let n = ys.len();
    if n < config.min_samples() {
        return Err(ForecastError::InsufficientData {
            what: "training samples",
            required: config.min_samples(),
            available: n,
        });
    }
    let width = xs[0].len();
    if let Some(bad) = xs.iter().find(|row| row.len() != width) {
        return Err(ForecastError::InvalidInputShape {
            what: "training row width",
            expected: width,
            actual: bad.len(),
        });
    }
    if xs.iter().flatten().chain(ys).any(|v| !v.is_finite()) {
        return Err(ForecastError::NonFinite {
            what: "training data",
        });
    }

    let k = config.members;
    let fold = n / (k + 1);
    let members = (0..k)
        .into_par_iter()
        .map(|m| {
            let end = n - (k - 1 - m) * fold;
            fit_ridge(&xs[..end], &ys[..end], config.alpha)
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        samples = n,
        width,
        members = k,
        alpha = config.alpha,
        "fitted ridge ensemble"
    );
    Ok(members)
}

/// Single ridge regression with standardised columns and an unpenalised intercept.
pub fn fit_ridge(xs: &[Vec<f64>], ys: &[f64], alpha: f64) -> Result<RidgeMember, ForecastError> {
    let n = ys.len();
    if n == 0 {
        return Err(ForecastError::InsufficientData {
            what: "ridge samples",
            required: 1,
            available: 0,
        });
    }
    let p = xs[0].len();
    let nf = n as f64;

    let means: Vec<f64> = (0..p)
        .map(|j| xs.iter().map(|row| row[j]).sum::<f64>() / nf)
        .collect();
    let scales: Vec<f64> = (0..p)
        .map(|j| {
            let var = xs.iter().map(|row| (row[j] - means[j]).powi(2)).sum::<f64>() / nf;
            let sd = var.sqrt();
            if sd < 1e-12 {
                1.0
            } else {
                sd
            }
        })
        .collect();
    let y_mean = ys.iter().sum::<f64>() / nf;

    // Normal equations on standardised columns: (Z'Z + alpha I) beta = Z'(y - y_mean)
    let mut gram = vec![0.0; p * p];
    let mut rhs = vec![0.0; p];
    let mut z = vec![0.0; p];
    for (row, &y) in xs.iter().zip(ys) {
        for j in 0..p {
            z[j] = (row[j] - means[j]) / scales[j];
        }
        let yc = y - y_mean;
        for a in 0..p {
            rhs[a] += z[a] * yc;
            for b in 0..=a {
                gram[a * p + b] += z[a] * z[b];
            }
        }
    }
    for a in 0..p {
        gram[a * p + a] += alpha;
        for b in 0..a {
            gram[b * p + a] = gram[a * p + b];
        }
    }

    let beta = cholesky_solve(&gram, &rhs, p)?;
    let weights: Vec<f64> = beta.iter().zip(&scales).map(|(b, s)| b / s).collect();
    let intercept = y_mean - weights.iter().zip(&means).map(|(w, m)| w * m).sum::<f64>();
    Ok(RidgeMember { intercept, weights })
}

/// Solve `A x = b` for symmetric positive-definite `A` (row-major, `p x p`).
fn cholesky_solve(a: &[f64], b: &[f64], p: usize) -> Result<Vec<f64>, ForecastError> {
    let mut l = vec![0.0; p * p];
    for i in 0..p {
        for j in 0..=i {
            let mut sum = a[i * p + j];
            for k in 0..j {
                sum -= l[i * p + k] * l[j * p + k];
            }
            if i == j {
                if !sum.is_finite() || sum <= 0.0 {
                    return Err(ForecastError::NonFinite {
                        what: "ridge normal equations",
                    });
                }
                l[i * p + i] = sum.sqrt();
            } else {
                l[i * p + j] = sum / l[j * p + j];
            }
        }
    }
    // Forward: L y = b
    let mut y = vec![0.0; p];
    for i in 0..p {
        let s: f64 = (0..i).map(|k| l[i * p + k] * y[k]).sum();
        y[i] = (b[i] - s) / l[i * p + i];
    }
    // Backward: L' x = y
    let mut x = vec![0.0; p];
    for i in (0..p).rev() {
        let s: f64 = (i + 1..p).map(|k| l[k * p + i] * x[k]).sum();
        x[i] = (y[i] - s) / l[i * p + i];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::vectors;

    #[test]
    fn cholesky_solves_small_system() {
        // [[4, 2], [2, 3]] x = [2, 1] → x = [0.5, 0]
        let x = cholesky_solve(&[4.0, 2.0, 2.0, 3.0], &[2.0, 1.0], 2).unwrap();
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn cholesky_rejects_indefinite() {
        assert!(cholesky_solve(&[0.0, 0.0, 0.0, 0.0], &[1.0, 1.0], 2).is_err());
    }

    #[test]
    fn ridge_recovers_linear_relation_with_small_alpha() {
        let xs: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64 * 0.1, ((i * 7) % 5) as f64]).collect();
        let ys: Vec<f64> = xs.iter().map(|r| 0.5 + 2.0 * r[0] - 1.0 * r[1]).collect();
        let m = fit_ridge(&xs, &ys, 1e-9).unwrap();
        assert!((m.weights[0] - 2.0).abs() < 1e-5);
        assert!((m.weights[1] + 1.0).abs() < 1e-5);
        assert!((m.intercept - 0.5).abs() < 1e-5);
    }

    #[test]
    fn constant_column_gets_zero_weight() {
        let xs: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 3.0]).collect();
        let ys: Vec<f64> = xs.iter().map(|r| r[0]).collect();
        let m = fit_ridge(&xs, &ys, 1.0).unwrap();
        assert_eq!(m.weights[1], 0.0);
    }

    #[test]
    fn larger_alpha_shrinks_weights() {
        let xs: Vec<Vec<f64>> = (0..30).map(|i| vec![(i as f64).sin()]).collect();
        let ys: Vec<f64> = xs.iter().map(|r| 3.0 * r[0]).collect();
        let loose = fit_ridge(&xs, &ys, 0.01).unwrap();
        let tight = fit_ridge(&xs, &ys, 100.0).unwrap();
        assert!(tight.weights[0].abs() < loose.weights[0].abs());
    }

    #[test]
    fn ensemble_members_use_expanding_prefixes() {
        // Regime change half way: the newest member sees it, the oldest doesn't.
        let xs: Vec<Vec<f64>> = (0..60).map(|i| vec![(i % 10) as f64]).collect();
        let ys: Vec<f64> = xs
            .iter()
            .enumerate()
            .map(|(i, r)| if i < 30 { r[0] } else { -r[0] })
            .collect();
        let config = FitConfig { members: 3, alpha: 1e-6, ..FitConfig::default() };
        let members = fit_ridge_ensemble(&xs, &ys, &config).unwrap();
        assert_eq!(members.len(), 3);
        // fold = 15: members train on 30, 45, 60 samples
        assert!((members[0].weights[0] - 1.0).abs() < 1e-4);
        assert!(members[2].weights[0].abs() < members[0].weights[0].abs());
    }

    #[test]
    fn ensemble_needs_enough_samples() {
        let xs = vec![vec![1.0]; 5];
        let ys = vec![0.0; 5];
        let err = fit_ridge_ensemble(&xs, &ys, &FitConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData { required: 12, available: 5, .. }
        ));
    }

    #[test]
    fn config_validation() {
        assert!(FitConfig::default().validate().is_ok());
        assert!(FitConfig { alpha: 0.0, ..FitConfig::default() }.validate().is_err());
        assert!(FitConfig { members: 0, ..FitConfig::default() }.validate().is_err());
        assert!(FitConfig { name: "a b".into(), ..FitConfig::default() }.validate().is_err());
    }

    #[test]
    fn training_set_skips_missing_targets() {
        let vs = vectors(&[&[1.0], &[2.0], &[3.0], &[4.0]]);
        let targets = vec![Some(0.1), Some(0.2), Some(0.3), None];
        let (xs, ys) = training_set(&vs, &targets, 2).unwrap();
        assert_eq!(xs, vec![vec![1.0, 2.0], vec![2.0, 3.0]]);
        assert_eq!(ys, vec![0.2, 0.3]);
    }

    #[test]
    fn training_set_rejects_length_mismatch() {
        let vs = vectors(&[&[1.0], &[2.0]]);
        assert!(training_set(&vs, &[None], 1).is_err());
    }
}
