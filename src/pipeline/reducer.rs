//! Exploratory summaries over a whole sample set: grouped histograms and a
//! principal component projection of the standardized band matrix.

use std::fmt;

use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::data::model::{PesticideStatus, Sample, SampleSet, SpoilageRisk};
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Continuous sample attribute to bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueField {
    DryMatter,
    Confidence,
}

impl ValueField {
    fn value(self, sample: &Sample) -> f64 {
        match self {
            ValueField::DryMatter => sample.dry_matter,
            ValueField::Confidence => sample.confidence,
        }
    }
}

impl fmt::Display for ValueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueField::DryMatter => "Dry matter (%)",
            ValueField::Confidence => "Confidence (%)",
        })
    }
}

/// Categorical attribute that splits a histogram into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupField {
    SpoilageRisk,
    PesticideStatus,
}

impl GroupField {
    /// Group labels in enum order.
    pub fn labels(self) -> Vec<&'static str> {
        match self {
            GroupField::SpoilageRisk => SpoilageRisk::ALL.iter().map(|r| r.as_str()).collect(),
            GroupField::PesticideStatus => {
                PesticideStatus::ALL.iter().map(|p| p.as_str()).collect()
            }
        }
    }

    fn group_index(self, sample: &Sample) -> usize {
        match self {
            GroupField::SpoilageRisk => sample.spoilage_risk as usize,
            GroupField::PesticideStatus => sample.pesticide_status as usize,
        }
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupField::SpoilageRisk => "Spoilage risk",
            GroupField::PesticideStatus => "Pesticide status",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramGroup {
    pub label: String,
    /// One count per bin.
    pub counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub field: ValueField,
    pub group_by: Option<GroupField>,
    /// `bins + 1` ascending edges; the last bin is closed on the right.
    pub edges: Vec<f64>,
    pub groups: Vec<HistogramGroup>,
}

impl Histogram {
    pub fn bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }

    pub fn bin_centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
    }

    pub fn total(&self) -> usize {
        self.groups.iter().flat_map(|g| &g.counts).sum()
    }
}

/// Bucket `field` into `bins` equal-width bins over its observed range.
///
/// With `group_by` every category gets its own count row (in enum order,
/// empty categories included); without it there is one row labelled `"all"`.
pub fn histogram(
    samples: &SampleSet,
    field: ValueField,
    group_by: Option<GroupField>,
    bins: usize,
) -> Result<Histogram, PipelineError> {
    if samples.is_empty() {
        return Err(PipelineError::EmptySampleSet);
    }
    if bins == 0 {
        return Err(PipelineError::InvalidParameter(
            "histogram needs at least one bin".into(),
        ));
    }

    let values: Vec<f64> = samples.samples().iter().map(|s| field.value(s)).collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::InvalidParameter(format!(
            "{field} contains non-finite values"
        )));
    }
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if hi - lo == 0.0 {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| lo + width * i as f64).collect();
    edges.push(hi);

    let labels = match group_by {
        Some(g) => g.labels(),
        None => vec!["all"],
    };
    let mut groups: Vec<HistogramGroup> = labels
        .into_iter()
        .map(|label| HistogramGroup {
            label: label.to_string(),
            counts: vec![0; bins],
        })
        .collect();

    for (sample, v) in samples.samples().iter().zip(&values) {
        let mut bin = (((v - lo) / width).floor() as usize).min(bins - 1);
        // the division can round across an edge; the reported edges decide
        while bin + 1 < bins && *v >= edges[bin + 1] {
            bin += 1;
        }
        while bin > 0 && *v < edges[bin] {
            bin -= 1;
        }
        let group = group_by.map_or(0, |g| g.group_index(sample));
        groups[group].counts[bin] += 1;
    }

    Ok(Histogram {
        field,
        group_by,
        edges,
        groups,
    })
}

// ---------------------------------------------------------------------------
// Standardization
// ---------------------------------------------------------------------------

/// Per-column z-scoring with population statistics (divisor n).
///
/// Columns whose standard deviation falls below `epsilon` keep scale 1, so
/// a constant column maps to all zeros instead of dividing by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl Standardizer {
    pub fn fit(matrix: &DMatrix<f64>, epsilon: f64) -> Result<Self, PipelineError> {
        let n = matrix.nrows();
        if n == 0 {
            return Err(PipelineError::EmptySampleSet);
        }
        let mut means = Vec::with_capacity(matrix.ncols());
        let mut scales = Vec::with_capacity(matrix.ncols());
        for column in matrix.column_iter() {
            let mean = column.mean();
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            let sd = var.sqrt();
            means.push(mean);
            scales.push(if sd < epsilon { 1.0 } else { sd });
        }
        Ok(Standardizer { means, scales })
    }

    pub fn transform(&self, matrix: &DMatrix<f64>) -> Result<DMatrix<f64>, PipelineError> {
        if matrix.ncols() != self.means.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.means.len(),
                actual: matrix.ncols(),
            });
        }
        Ok(DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |r, c| {
            (matrix[(r, c)] - self.means[c]) / self.scales[c]
        }))
    }
}

// ---------------------------------------------------------------------------
// Principal component projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionResult {
    /// One row per sample, one column per component.
    pub coordinates: Vec<Vec<f64>>,
    /// Variance along each component (eigenvalue of the covariance).
    pub explained_variance: Vec<f64>,
    /// Share of total variance per component.
    pub explained_variance_ratio: Vec<f64>,
    /// Unit direction per component, in band space.
    pub loadings: Vec<Vec<f64>>,
}

impl ProjectionResult {
    pub fn components(&self) -> usize {
        self.loadings.len()
    }

    /// Column `component` of the coordinates.
    pub fn component(&self, component: usize) -> Vec<f64> {
        self.coordinates.iter().map(|row| row[component]).collect()
    }
}

/// Standardize the band matrix and project it onto its top `components`
/// principal directions.
///
/// Each direction is sign-normalized so its largest-magnitude loading is
/// positive, so repeated calls on the same data give identical output.
pub fn reduce(
    samples: &SampleSet,
    components: usize,
    epsilon: f64,
) -> Result<ProjectionResult, PipelineError> {
    if samples.is_empty() {
        return Err(PipelineError::EmptySampleSet);
    }
    let n = samples.len();
    if n < 2 {
        return Err(PipelineError::InsufficientSamples {
            needed: 2,
            actual: n,
        });
    }
    let p = samples.n_bands();
    if components == 0 || components > p {
        return Err(PipelineError::InvalidParameter(format!(
            "component count must lie in 1..={p}, got {components}"
        )));
    }

    let x = samples.band_matrix();
    let z = Standardizer::fit(&x, epsilon)?.transform(&x)?;
    let covariance = (z.transpose() * &z) / (n - 1) as f64;
    let eigen = SymmetricEigen::new(covariance);

    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();

    let mut loadings = Vec::with_capacity(components);
    let mut explained_variance = Vec::with_capacity(components);
    let mut explained_variance_ratio = Vec::with_capacity(components);
    for &idx in order.iter().take(components) {
        let mut direction: Vec<f64> = eigen.eigenvectors.column(idx).iter().copied().collect();
        let pivot = direction
            .iter()
            .enumerate()
            .fold(0, |best, (i, v)| if v.abs() > direction[best].abs() { i } else { best });
        if direction[pivot] < 0.0 {
            direction.iter_mut().for_each(|v| *v = -*v);
        }
        let variance = eigen.eigenvalues[idx].max(0.0);
        explained_variance.push(variance);
        explained_variance_ratio.push(if total > 0.0 { variance / total } else { 0.0 });
        loadings.push(direction);
    }

    let coordinates = z
        .row_iter()
        .map(|row| {
            loadings
                .iter()
                .map(|dir| row.iter().zip(dir).map(|(a, b)| a * b).sum::<f64>())
                .collect()
        })
        .collect();

    log::debug!(
        "PCA over {n} samples: explained variance ratio {:?}",
        explained_variance_ratio
    );
    Ok(ProjectionResult {
        coordinates,
        explained_variance,
        explained_variance_ratio,
        loadings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::BandSchema;
    use proptest::prelude::*;

    fn sample(i: usize, bands: Vec<f64>, dry_matter: f64) -> Sample {
        Sample {
            id: format!("Sample {}", i + 1),
            bands,
            dry_matter,
            spoilage_risk: SpoilageRisk::ALL[i % 3],
            pesticide_status: PesticideStatus::ALL[(i + 1) % 3],
            confidence: (i * 10) as f64,
        }
    }

    fn set_from(rows: Vec<(Vec<f64>, f64)>) -> SampleSet {
        let n_bands = rows[0].0.len();
        let schema = BandSchema::linear(410.0, 940.0, n_bands).unwrap();
        let samples = rows
            .into_iter()
            .enumerate()
            .map(|(i, (b, dm))| sample(i, b, dm))
            .collect();
        SampleSet::new(schema, samples).unwrap()
    }

    #[test]
    fn histogram_of_empty_set_fails() {
        let empty = SampleSet::empty(BandSchema::as7265x());
        assert_eq!(
            histogram(&empty, ValueField::DryMatter, Some(GroupField::SpoilageRisk), 20)
                .unwrap_err(),
            PipelineError::EmptySampleSet
        );
    }

    #[test]
    fn histogram_buckets_and_closes_last_bin() {
        let rows = (0..=10).map(|i| (vec![1.0], i as f64)).collect();
        let h = histogram(&set_from(rows), ValueField::DryMatter, None, 5).unwrap();
        assert_eq!(h.bins(), 5);
        assert_eq!(h.edges, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(h.groups.len(), 1);
        assert_eq!(h.groups[0].counts, vec![2, 2, 2, 2, 3]);
        assert_eq!(h.total(), 11);
    }

    #[test]
    fn value_on_interior_edge_counts_in_the_upper_bin() {
        // 33 / 2.2 rounds to just below 15, while edges[15] is exactly 33
        let samples = [0.0, 33.0, 44.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| Sample {
                confidence: c,
                ..sample(i, vec![1.0], 5.0)
            })
            .collect();
        let set = SampleSet::new(BandSchema::new(vec![500.0]).unwrap(), samples).unwrap();
        let h = histogram(&set, ValueField::Confidence, None, 20).unwrap();
        assert_eq!(h.edges[15], 33.0);
        assert_eq!(h.groups[0].counts[14], 0);
        assert_eq!(h.groups[0].counts[15], 1);
        assert_eq!(h.groups[0].counts[19], 1);
    }

    proptest! {
        #[test]
        fn every_value_lands_between_its_edges(
            values in proptest::collection::vec(0.0f64..100.0, 2..40),
            bins in 1usize..30,
        ) {
            let samples = values
                .iter()
                .enumerate()
                .map(|(i, &c)| Sample { confidence: c, ..sample(i, vec![1.0], 5.0) })
                .collect();
            let set = SampleSet::new(BandSchema::new(vec![500.0]).unwrap(), samples).unwrap();
            let h = histogram(&set, ValueField::Confidence, None, bins).unwrap();
            let mut expected = vec![0usize; bins];
            for v in &values {
                let bin = (0..bins)
                    .rev()
                    .find(|&b| *v >= h.edges[b])
                    .unwrap_or(0);
                expected[bin] += 1;
            }
            prop_assert_eq!(&h.groups[0].counts, &expected);
        }
    }

    #[test]
    fn grouped_histogram_keeps_every_category() {
        let rows = (0..4).map(|i| (vec![1.0], i as f64)).collect();
        let h = histogram(
            &set_from(rows),
            ValueField::DryMatter,
            Some(GroupField::SpoilageRisk),
            20,
        )
        .unwrap();
        let labels: Vec<&str> = h.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Low", "Medium", "High"]);
        assert_eq!(h.groups[0].counts.iter().sum::<usize>(), 2);
        assert_eq!(h.total(), 4);
    }

    #[test]
    fn histogram_of_constant_values_widens_range() {
        let rows = (0..3).map(|_| (vec![1.0], 7.0)).collect();
        let h = histogram(&set_from(rows), ValueField::DryMatter, None, 4).unwrap();
        assert_eq!(h.edges[0], 6.5);
        assert_eq!(h.edges[4], 7.5);
        assert_eq!(h.total(), 3);
    }

    #[test]
    fn histogram_is_deterministic() {
        let rows: Vec<_> = (0..30)
            .map(|i| (vec![1.0], (i * 37 % 20) as f64 * 0.97))
            .collect();
        let set = set_from(rows);
        let a = histogram(&set, ValueField::DryMatter, Some(GroupField::PesticideStatus), 20);
        let b = histogram(&set, ValueField::DryMatter, Some(GroupField::PesticideStatus), 20);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_bins_is_invalid() {
        let rows = vec![(vec![1.0], 1.0)];
        assert!(matches!(
            histogram(&set_from(rows), ValueField::Confidence, None, 0),
            Err(PipelineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn constant_column_standardizes_to_zero() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0]);
        let s = Standardizer::fit(&m, 1e-12).unwrap();
        assert_eq!(s.scales[1], 1.0);
        let z = s.transform(&m).unwrap();
        assert!(z.column(1).iter().all(|v| *v == 0.0));
        assert!((z[(0, 0)] + (1.5f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn reduce_finds_dominant_direction() {
        // bands 0 and 1 move together, band 2 is small independent jitter
        let rows = (0..20)
            .map(|i| {
                let t = i as f64;
                (vec![t * 4.0, t * 4.0 + 1.0, (i * 7 % 5) as f64], 1.0)
            })
            .collect();
        let result = reduce(&set_from(rows), 3, 1e-12).unwrap();
        assert_eq!(result.components(), 3);
        assert!(result.explained_variance_ratio[0] > 0.6);
        let ratios = &result.explained_variance_ratio;
        assert!(ratios.windows(2).all(|w| w[0] >= w[1]));
        assert!((ratios.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // sign convention: largest loading positive
        let first = &result.loadings[0];
        let max = first.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = first.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(max >= min.abs());
    }

    #[test]
    fn reduce_is_deterministic() {
        let rows: Vec<_> = (0..25)
            .map(|i| {
                let bands = (0..18).map(|b| ((i * 31 + b * 17) % 101) as f64 * 0.99).collect();
                (bands, i as f64)
            })
            .collect();
        let set = set_from(rows);
        assert_eq!(reduce(&set, 3, 1e-12).unwrap(), reduce(&set, 3, 1e-12).unwrap());
    }

    #[test]
    fn reduce_rejects_bad_input() {
        let empty = SampleSet::empty(BandSchema::as7265x());
        assert_eq!(reduce(&empty, 3, 1e-12).unwrap_err(), PipelineError::EmptySampleSet);
        let one = set_from(vec![(vec![1.0, 2.0, 3.0], 1.0)]);
        assert!(matches!(
            reduce(&one, 3, 1e-12),
            Err(PipelineError::InsufficientSamples { needed: 2, actual: 1 })
        ));
        let two = set_from(vec![(vec![1.0, 2.0], 1.0), (vec![2.0, 1.0], 1.0)]);
        assert!(matches!(
            reduce(&two, 3, 1e-12),
            Err(PipelineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn all_constant_bands_explain_nothing() {
        let rows = (0..5).map(|_| (vec![10.0; 18], 1.0)).collect();
        let result = reduce(&set_from(rows), 3, 1e-12).unwrap();
        assert!(result.explained_variance_ratio.iter().all(|r| *r == 0.0));
        assert!(result.coordinates.iter().flatten().all(|v| *v == 0.0));
    }

    proptest! {
        #[test]
        fn standardized_columns_have_zero_mean_unit_variance(
            rows in prop::collection::vec(prop::collection::vec(0.0f64..100.0, 4), 3..30)
        ) {
            let n = rows.len();
            let flat: Vec<f64> = rows.iter().flatten().copied().collect();
            let m = DMatrix::from_row_slice(n, 4, &flat);
            let s = Standardizer::fit(&m, 1e-12).unwrap();
            let z = s.transform(&m).unwrap();
            for (c, column) in z.column_iter().enumerate() {
                if s.scales[c] == 1.0 {
                    continue;
                }
                let mean = column.mean();
                let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
                prop_assert!(mean.abs() < 1e-9);
                prop_assert!((var - 1.0).abs() < 1e-6);
            }
        }
    }
}
