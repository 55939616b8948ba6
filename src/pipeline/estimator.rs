//! Quality estimation: ridge regression from band vectors to dry matter, and
//! the freshness tiers derived from a dry-matter value.
//!
//! Spoilage risk and pesticide status are *labels* carried by each sample.
//! Nothing here predicts them; [`label_counts`] only tallies them.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::model::{PesticideStatus, SampleSet, SpoilageRisk};
use crate::error::PipelineError;

/// Singular values below this fraction of the largest are treated as zero.
const SVD_RELATIVE_EPS: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

/// Goodness of fit of a model against a sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    /// Coefficient of determination.
    pub r2: f64,
    pub rmse: f64,
    pub n: usize,
}

/// Linear map from band vector to dry matter, with its in-sample fit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// L2 regularization strength the model was fitted with.
    pub alpha: f64,
    /// Fit against the training rows themselves.
    pub training_fit: FitReport,
}

/// Fit an L2-regularized linear regression of dry matter on band readings.
///
/// The intercept is not penalized: features and target are centered before
/// the solve. When there are more rows than bands the normal equations are
/// solved directly, otherwise the dual (kernel) form is used. Regularized
/// systems go through a Cholesky factorization; `alpha == 0` (or a failed
/// factorization) uses an SVD pseudo-inverse, giving the minimum-norm solution.
pub fn train(samples: &SampleSet, alpha: f64) -> Result<TrainedModel, PipelineError> {
    if samples.is_empty() {
        return Err(PipelineError::EmptySampleSet);
    }
    if !(alpha.is_finite() && alpha >= 0.0) {
        return Err(PipelineError::ModelUnavailable(format!(
            "regularization strength must be a non-negative number, got {alpha}"
        )));
    }
    let n = samples.len();
    if n < 2 {
        return Err(PipelineError::ModelUnavailable(format!(
            "need at least 2 samples to fit, got {n}"
        )));
    }

    let x = samples.band_matrix();
    let y = samples.dry_matter();
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(PipelineError::ModelUnavailable(
            "training data contains non-finite values".into(),
        ));
    }

    let p = x.ncols();
    let x_mean = DVector::from_fn(p, |j, _| x.column(j).mean());
    let mut xc = x;
    for j in 0..p {
        xc.column_mut(j).add_scalar_mut(-x_mean[j]);
    }
    let y_mean = y.mean();
    let yc = y.add_scalar(-y_mean);

    let weights = if n > p {
        let gram = xc.transpose() * &xc + DMatrix::<f64>::identity(p, p) * alpha;
        let rhs = xc.transpose() * &yc;
        solve_symmetric(gram, &rhs, alpha)
    } else {
        let kernel = &xc * xc.transpose() + DMatrix::<f64>::identity(n, n) * alpha;
        solve_symmetric(kernel, &yc, alpha).map(|dual| xc.transpose() * dual)
    };

    let weights = weights
        .filter(|w| w.iter().all(|v| v.is_finite()))
        .ok_or_else(|| PipelineError::ModelUnavailable("regression system is singular".into()))?;

    let intercept = y_mean - x_mean.dot(&weights);
    let mut model = TrainedModel {
        coefficients: weights.iter().copied().collect(),
        intercept,
        alpha,
        training_fit: FitReport {
            r2: 0.0,
            rmse: 0.0,
            n,
        },
    };
    model.training_fit = evaluate(&model, samples)?;

    log::debug!(
        "ridge fit on {n} samples x {p} bands (alpha={alpha}): R2={:.3}, RMSE={:.3}",
        model.training_fit.r2,
        model.training_fit.rmse
    );
    Ok(model)
}

fn solve_symmetric(a: DMatrix<f64>, b: &DVector<f64>, alpha: f64) -> Option<DVector<f64>> {
    // positive definite only when regularized
    if alpha > 0.0 {
        if let Some(chol) = a.clone().cholesky() {
            return Some(chol.solve(b));
        }
        log::debug!("cholesky failed, falling back to SVD solve");
    }
    let svd = a.svd(true, true);
    let eps = svd.singular_values.max() * SVD_RELATIVE_EPS;
    svd.solve(b, eps).ok()
}

/// Dry-matter estimate for one band vector.
pub fn predict(model: &TrainedModel, bands: &[f64]) -> Result<f64, PipelineError> {
    if bands.len() != model.coefficients.len() {
        return Err(PipelineError::DimensionMismatch {
            expected: model.coefficients.len(),
            actual: bands.len(),
        });
    }
    Ok(model
        .coefficients
        .iter()
        .zip(bands)
        .map(|(c, b)| c * b)
        .sum::<f64>()
        + model.intercept)
}

/// Estimates for every sample, in order.
pub fn predict_all(model: &TrainedModel, samples: &SampleSet) -> Result<Vec<f64>, PipelineError> {
    samples
        .samples()
        .iter()
        .map(|s| predict(model, &s.bands))
        .collect()
}

/// R² and RMSE of `model` against the dry matter stored in `samples`.
///
/// A constant target scores 1 for a perfect fit and 0 otherwise.
pub fn evaluate(model: &TrainedModel, samples: &SampleSet) -> Result<FitReport, PipelineError> {
    if samples.is_empty() {
        return Err(PipelineError::EmptySampleSet);
    }
    let predictions = predict_all(model, samples)?;
    let n = samples.len();
    let mean = samples.samples().iter().map(|s| s.dry_matter).sum::<f64>() / n as f64;

    let (ss_res, ss_tot) = samples
        .samples()
        .iter()
        .zip(&predictions)
        .fold((0.0, 0.0), |(res, tot), (s, p)| {
            (
                res + (s.dry_matter - p).powi(2),
                tot + (s.dry_matter - mean).powi(2),
            )
        });

    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };
    Ok(FitReport {
        r2,
        rmse: (ss_res / n as f64).sqrt(),
        n,
    })
}

/// Shuffle with `seed` and split off `fraction` of the rows as a test set.
///
/// Returns `(train, test)`. The training part keeps at least two rows.
pub fn holdout_split(
    samples: &SampleSet,
    fraction: f64,
    seed: u64,
) -> Result<(SampleSet, SampleSet), PipelineError> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(PipelineError::InvalidParameter(format!(
            "holdout fraction must lie in (0, 1), got {fraction}"
        )));
    }
    if samples.is_empty() {
        return Err(PipelineError::EmptySampleSet);
    }
    let n = samples.len();
    let n_test = ((n as f64 * fraction).round() as usize).max(1);
    if n < n_test + 2 {
        return Err(PipelineError::InsufficientSamples {
            needed: n_test + 2,
            actual: n,
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test, train) = order.split_at(n_test);
    Ok((samples.subset(train), samples.subset(test)))
}

// ---------------------------------------------------------------------------
// Freshness
// ---------------------------------------------------------------------------

/// Ordered from worst to best, so `Low < Moderate < Fresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FreshnessTier {
    Low,
    Moderate,
    Fresh,
}

impl FreshnessTier {
    pub const ALL: [FreshnessTier; 3] = [
        FreshnessTier::Fresh,
        FreshnessTier::Moderate,
        FreshnessTier::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FreshnessTier::Fresh => "Fresh",
            FreshnessTier::Moderate => "Moderate",
            FreshnessTier::Low => "Low",
        }
    }
}

impl fmt::Display for FreshnessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunable constants of the dry-matter → freshness mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessPolicy {
    /// Freshness percent per percent of dry matter.
    pub multiplier: f64,
    /// Fraction of the threshold at which `Moderate` starts.
    pub moderate_ratio: f64,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            multiplier: 5.0,
            moderate_ratio: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Freshness {
    /// Clamped to `0..=100`.
    pub percent: f64,
    pub tier: FreshnessTier,
}

/// Map a dry-matter value to a freshness percent and tier.
///
/// `percent >= threshold` is `Fresh`, `percent >= moderate_ratio * threshold`
/// is `Moderate`, anything else is `Low`.
pub fn classify_freshness(dry_matter: f64, threshold: f64, policy: &FreshnessPolicy) -> Freshness {
    let percent = (dry_matter * policy.multiplier).clamp(0.0, 100.0);
    let tier = if percent >= threshold {
        FreshnessTier::Fresh
    } else if percent >= threshold * policy.moderate_ratio {
        FreshnessTier::Moderate
    } else {
        FreshnessTier::Low
    };
    Freshness { percent, tier }
}

// ---------------------------------------------------------------------------
// Stored labels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelCounts {
    pub spoilage_risk: BTreeMap<SpoilageRisk, usize>,
    pub pesticide_status: BTreeMap<PesticideStatus, usize>,
}

/// Tally the stored categorical labels. Every category appears, zero or not.
pub fn label_counts(samples: &SampleSet) -> LabelCounts {
    let mut counts = LabelCounts {
        spoilage_risk: SpoilageRisk::ALL.iter().map(|r| (*r, 0)).collect(),
        pesticide_status: PesticideStatus::ALL.iter().map(|p| (*p, 0)).collect(),
    };
    for s in samples.samples() {
        *counts.spoilage_risk.entry(s.spoilage_risk).or_default() += 1;
        *counts.pesticide_status.entry(s.pesticide_status).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{BandSchema, Sample};

    fn set(rows: &[(Vec<f64>, f64)]) -> SampleSet {
        let n_bands = rows[0].0.len();
        let schema = BandSchema::linear(400.0, 900.0, n_bands).unwrap();
        let samples = rows
            .iter()
            .enumerate()
            .map(|(i, (bands, dm))| Sample {
                id: format!("Sample {}", i + 1),
                bands: bands.clone(),
                dry_matter: *dm,
                spoilage_risk: SpoilageRisk::ALL[i % 3],
                pesticide_status: PesticideStatus::ALL[i % 3],
                confidence: 0.0,
            })
            .collect();
        SampleSet::new(schema, samples).unwrap()
    }

    #[test]
    fn near_zero_alpha_reproduces_training_targets() {
        let rows: Vec<(Vec<f64>, f64)> = (0..4)
            .map(|i| {
                let bands = (0..18).map(|b| ((i * 7 + b * 3) % 23) as f64 * 4.0).collect();
                (bands, 5.0 + 3.0 * i as f64)
            })
            .collect();
        let samples = set(&rows);
        let model = train(&samples, 1e-8).unwrap();
        for s in samples.samples() {
            let p = predict(&model, &s.bands).unwrap();
            assert!((p - s.dry_matter).abs() < 1e-3, "{p} vs {}", s.dry_matter);
        }
        assert!(model.training_fit.r2 > 0.999);
    }

    #[test]
    fn recovers_exact_linear_relation_with_many_rows() {
        // dm = 0.1 * b0 - 0.05 * b1 + 2 on 3 bands
        let rows: Vec<(Vec<f64>, f64)> = (0..30)
            .map(|i| {
                let b0 = (i * 13 % 97) as f64;
                let b1 = (i * 29 % 89) as f64;
                let b2 = (i * 5 % 31) as f64;
                (vec![b0, b1, b2], 0.1 * b0 - 0.05 * b1 + 2.0)
            })
            .collect();
        let model = train(&set(&rows), 0.0).unwrap();
        assert!((model.coefficients[0] - 0.1).abs() < 1e-9);
        assert!((model.coefficients[1] + 0.05).abs() < 1e-9);
        assert!(model.coefficients[2].abs() < 1e-9);
        assert!((model.intercept - 2.0).abs() < 1e-9);
    }

    #[test]
    fn constant_bands_fit_poorly_but_do_not_fail() {
        let rows = vec![
            (vec![10.0; 18], 5.0),
            (vec![10.0; 18], 10.0),
            (vec![10.0; 18], 15.0),
        ];
        let model = train(&set(&rows), 1.0).unwrap();
        assert!(model.coefficients.iter().all(|c| c.abs() < 1e-12));
        assert!((model.intercept - 10.0).abs() < 1e-12);
        assert!(model.training_fit.r2.abs() < 1e-12);
    }

    #[test]
    fn unregularized_singular_system_still_solves() {
        // duplicate columns make XtX singular; the SVD fallback handles it
        let rows: Vec<(Vec<f64>, f64)> = (0..10)
            .map(|i| (vec![i as f64, i as f64], 2.0 * i as f64))
            .collect();
        let model = train(&set(&rows), 0.0).unwrap();
        let p = predict(&model, &[4.0, 4.0]).unwrap();
        assert!((p - 8.0).abs() < 1e-6);
    }

    #[test]
    fn ridge_shrinks_coefficients() {
        let rows: Vec<(Vec<f64>, f64)> = (0..20)
            .map(|i| (vec![i as f64, (i * i % 7) as f64], 0.5 * i as f64))
            .collect();
        let samples = set(&rows);
        let loose = train(&samples, 0.0).unwrap();
        let tight = train(&samples, 1000.0).unwrap();
        assert!(tight.coefficients[0].abs() < loose.coefficients[0].abs());
    }

    #[test]
    fn training_errors() {
        let schema = BandSchema::as7265x();
        assert_eq!(
            train(&SampleSet::empty(schema), 1.0).unwrap_err(),
            PipelineError::EmptySampleSet
        );
        let one = set(&[(vec![1.0; 18], 3.0)]);
        assert!(matches!(
            train(&one, 1.0),
            Err(PipelineError::ModelUnavailable(_))
        ));
        let two = set(&[(vec![1.0; 18], 3.0), (vec![2.0; 18], 4.0)]);
        assert!(matches!(
            train(&two, -1.0),
            Err(PipelineError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn predict_rejects_wrong_length() {
        let two = set(&[(vec![1.0; 18], 3.0), (vec![2.0; 18], 4.0)]);
        let model = train(&two, 1.0).unwrap();
        assert_eq!(
            predict(&model, &[1.0; 5]).unwrap_err(),
            PipelineError::DimensionMismatch {
                expected: 18,
                actual: 5
            }
        );
    }

    #[test]
    fn holdout_split_is_deterministic_and_disjoint() {
        let rows: Vec<(Vec<f64>, f64)> = (0..10).map(|i| (vec![i as f64], i as f64)).collect();
        let samples = set(&rows);
        let (train_a, test_a) = holdout_split(&samples, 0.3, 7).unwrap();
        let (train_b, test_b) = holdout_split(&samples, 0.3, 7).unwrap();
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(test_a.len(), 3);
        assert_eq!(train_a.len(), 7);
        for t in test_a.samples() {
            assert!(!train_a.samples().iter().any(|s| s.id == t.id));
        }
        assert!(holdout_split(&samples, 1.0, 7).is_err());
    }

    #[test]
    fn freshness_examples() {
        let policy = FreshnessPolicy::default();
        let f = classify_freshness(14.0, 70.0, &policy);
        assert_eq!(f.percent, 70.0);
        assert_eq!(f.tier, FreshnessTier::Fresh);

        let f = classify_freshness(0.7 * 70.0 / 5.0, 70.0, &policy);
        assert_eq!(f.percent, 49.0);
        assert_eq!(f.tier, FreshnessTier::Moderate);

        assert_eq!(classify_freshness(14.0, 100.0, &policy).tier, FreshnessTier::Moderate);
        assert_eq!(classify_freshness(9.0, 70.0, &policy).tier, FreshnessTier::Low);
        assert_eq!(classify_freshness(40.0, 70.0, &policy).percent, 100.0);
        assert_eq!(classify_freshness(-3.0, 70.0, &policy).percent, 0.0);
    }

    #[test]
    fn label_counts_cover_every_category() {
        let rows: Vec<(Vec<f64>, f64)> = (0..4).map(|i| (vec![i as f64], 1.0)).collect();
        let counts = label_counts(&set(&rows));
        assert_eq!(counts.spoilage_risk[&SpoilageRisk::Low], 2);
        assert_eq!(counts.spoilage_risk[&SpoilageRisk::High], 1);
        assert_eq!(counts.pesticide_status.values().sum::<usize>(), 4);
    }
}
