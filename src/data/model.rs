use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Categorical labels
// ---------------------------------------------------------------------------

/// Labelled spoilage risk. Stored on the sample, never predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpoilageRisk {
    Low,
    Medium,
    High,
}

impl SpoilageRisk {
    pub const ALL: [SpoilageRisk; 3] = [SpoilageRisk::Low, SpoilageRisk::Medium, SpoilageRisk::High];

    pub fn as_str(self) -> &'static str {
        match self {
            SpoilageRisk::Low => "Low",
            SpoilageRisk::Medium => "Medium",
            SpoilageRisk::High => "High",
        }
    }
}

impl fmt::Display for SpoilageRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpoilageRisk {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SpoilageRisk::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PipelineError::UnknownLabel {
                kind: "spoilage risk",
                value: s.to_string(),
            })
    }
}

/// Labelled pesticide residue class. Stored on the sample, never predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PesticideStatus {
    Pure,
    Fungicide,
    Insecticide,
}

impl PesticideStatus {
    pub const ALL: [PesticideStatus; 3] = [
        PesticideStatus::Pure,
        PesticideStatus::Fungicide,
        PesticideStatus::Insecticide,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PesticideStatus::Pure => "Pure",
            PesticideStatus::Fungicide => "Fungicide",
            PesticideStatus::Insecticide => "Insecticide",
        }
    }
}

impl fmt::Display for PesticideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PesticideStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        PesticideStatus::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PipelineError::UnknownLabel {
                kind: "pesticide status",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// BandSchema – which wavelength each band index stands for
// ---------------------------------------------------------------------------

/// AS7265x triad band centers in nm (AS72651 + AS72652 + AS72653).
pub const AS7265X_CENTERS_NM: [f64; 18] = [
    410.0, 435.0, 460.0, 485.0, 510.0, 535.0, 560.0, 585.0, 610.0, 645.0, 680.0, 705.0, 730.0,
    760.0, 810.0, 860.0, 900.0, 940.0,
];

/// Ordered, strictly ascending wavelength centers.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSchema {
    centers_nm: Vec<f64>,
}

impl BandSchema {
    pub fn new(centers_nm: Vec<f64>) -> Result<Self, PipelineError> {
        if centers_nm.is_empty() {
            return Err(PipelineError::InvalidSchema("no band centers".into()));
        }
        if centers_nm.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::InvalidSchema("non-finite band center".into()));
        }
        if centers_nm.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PipelineError::InvalidSchema(
                "band centers must be strictly ascending".into(),
            ));
        }
        Ok(BandSchema { centers_nm })
    }

    /// The 18-channel AS7265x layout used throughout the dashboard.
    pub fn as7265x() -> Self {
        BandSchema {
            centers_nm: AS7265X_CENTERS_NM.to_vec(),
        }
    }

    /// `n` evenly spaced centers from `start` to `end` inclusive.
    pub fn linear(start_nm: f64, end_nm: f64, n: usize) -> Result<Self, PipelineError> {
        let centers = match n {
            0 => Vec::new(),
            1 => vec![start_nm],
            _ => {
                let step = (end_nm - start_nm) / (n - 1) as f64;
                (0..n).map(|i| start_nm + step * i as f64).collect()
            }
        };
        Self::new(centers)
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers_nm
    }

    pub fn len(&self) -> usize {
        self.centers_nm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers_nm.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RawCurve – fine-grained reflectance before emulation
// ---------------------------------------------------------------------------

/// A hyperspectral reflectance curve: wavelength (nm) → reflectance (%).
#[derive(Debug, Clone, PartialEq)]
pub struct RawCurve {
    pub wavelengths: Vec<f64>,
    pub reflectance: Vec<f64>,
}

impl RawCurve {
    pub fn new(wavelengths: Vec<f64>, reflectance: Vec<f64>) -> Result<Self, PipelineError> {
        let curve = RawCurve {
            wavelengths,
            reflectance,
        };
        curve.validate()?;
        Ok(curve)
    }

    /// Check the shape invariants the emulator relies on.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.wavelengths.is_empty() {
            return Err(PipelineError::InvalidCurve("curve has no points".into()));
        }
        if self.wavelengths.len() != self.reflectance.len() {
            return Err(PipelineError::InvalidCurve(format!(
                "{} wavelengths but {} reflectance values",
                self.wavelengths.len(),
                self.reflectance.len()
            )));
        }
        if self
            .wavelengths
            .iter()
            .chain(&self.reflectance)
            .any(|v| !v.is_finite())
        {
            return Err(PipelineError::InvalidCurve("non-finite value".into()));
        }
        if self.wavelengths.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PipelineError::InvalidCurve(
                "wavelengths must be strictly increasing".into(),
            ));
        }
        Ok(())
    }

    /// Covered wavelength range `(min, max)`.
    pub fn range(&self) -> (f64, f64) {
        (
            self.wavelengths[0],
            self.wavelengths[self.wavelengths.len() - 1],
        )
    }
}

/// A raw curve together with the labels of the specimen it was measured on.
#[derive(Debug, Clone)]
pub struct LabeledCurve {
    pub id: String,
    pub curve: RawCurve,
    pub dry_matter: f64,
    pub spoilage_risk: SpoilageRisk,
    pub pesticide_status: PesticideStatus,
    pub confidence: f64,
}

impl LabeledCurve {
    /// Attach emulated band readings, keeping the labels.
    pub fn into_sample(self, bands: Vec<f64>) -> Sample {
        Sample {
            id: self.id,
            bands,
            dry_matter: self.dry_matter,
            spoilage_risk: self.spoilage_risk,
            pesticide_status: self.pesticide_status,
            confidence: self.confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Sample / SampleSet
// ---------------------------------------------------------------------------

/// One specimen: band readings plus its labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    /// Reflectance percentages, one per schema band.
    pub bands: Vec<f64>,
    /// Dry matter, percent.
    pub dry_matter: f64,
    pub spoilage_risk: SpoilageRisk,
    pub pesticide_status: PesticideStatus,
    /// Placeholder percentage; no model reads it.
    pub confidence: f64,
}

/// Samples sharing one band schema. Validated on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    schema: BandSchema,
    samples: Vec<Sample>,
}

impl SampleSet {
    pub fn new(schema: BandSchema, samples: Vec<Sample>) -> Result<Self, PipelineError> {
        for (i, sample) in samples.iter().enumerate() {
            if sample.bands.len() != schema.len() {
                return Err(PipelineError::SchemaMismatch {
                    expected: schema.len(),
                    actual: sample.bands.len(),
                    sample: i,
                });
            }
            if let Some((band, &value)) = sample
                .bands
                .iter()
                .enumerate()
                .find(|(_, v)| !(0.0..=100.0).contains(*v))
            {
                return Err(PipelineError::ReflectanceOutOfRange {
                    sample: i,
                    band,
                    value,
                });
            }
        }
        Ok(SampleSet { schema, samples })
    }

    pub fn empty(schema: BandSchema) -> Self {
        SampleSet {
            schema,
            samples: Vec::new(),
        }
    }

    pub fn schema(&self) -> &BandSchema {
        &self.schema
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn n_bands(&self) -> usize {
        self.schema.len()
    }

    /// Rows are samples, columns are bands.
    pub fn band_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.samples.len(), self.schema.len(), |r, c| {
            self.samples[r].bands[c]
        })
    }

    pub fn dry_matter(&self) -> DVector<f64> {
        DVector::from_iterator(self.samples.len(), self.samples.iter().map(|s| s.dry_matter))
    }

    /// A new set holding the given rows, in the given order.
    pub fn subset(&self, indices: &[usize]) -> SampleSet {
        SampleSet {
            schema: self.schema.clone(),
            samples: indices
                .iter()
                .filter_map(|&i| self.samples.get(i).cloned())
                .collect(),
        }
    }
}
