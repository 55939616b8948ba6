use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::model::{
    BandSchema, LabeledCurve, PesticideStatus, RawCurve, Sample, SampleSet, SpoilageRisk,
};
use super::source::SampleSource;
use crate::config::SyntheticConfig;

// ---------------------------------------------------------------------------
// Flat-random demo data
// ---------------------------------------------------------------------------

/// Uniform random band vectors and labels, reproducible per seed.
///
/// Bands are uniform in `[0, 100)`, dry matter in `[0, 20)`, confidence in
/// `[0, 100)`; risk and status are drawn uniformly. Bands carry no signal
/// about dry matter, so the fitted model is expected to be weak.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub seed: u64,
    pub samples: usize,
    pub schema: BandSchema,
}

impl SyntheticSource {
    pub fn new(config: &SyntheticConfig) -> Self {
        Self {
            seed: config.seed,
            samples: config.samples,
            schema: BandSchema::as7265x(),
        }
    }
}

impl SampleSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("synthetic ({} samples, seed {})", self.samples, self.seed)
    }

    fn load(&self) -> Result<SampleSet> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n_bands = self.schema.len();
        let samples = (0..self.samples)
            .map(|i| Sample {
                id: format!("Sample {}", i + 1),
                bands: (0..n_bands).map(|_| rng.gen_range(0.0..100.0)).collect(),
                dry_matter: rng.gen_range(0.0..20.0),
                spoilage_risk: SpoilageRisk::ALL[rng.gen_range(0..SpoilageRisk::ALL.len())],
                pesticide_status: PesticideStatus::ALL
                    [rng.gen_range(0..PesticideStatus::ALL.len())],
                confidence: rng.gen_range(0.0..100.0),
            })
            .collect();
        let set = SampleSet::new(self.schema.clone(), samples)?;
        log::info!("Generated {} synthetic samples (seed {})", set.len(), self.seed);
        Ok(set)
    }
}

// ---------------------------------------------------------------------------
// Hyperspectral curves with dry-matter signal
// ---------------------------------------------------------------------------

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Apple-like reflectance (%) at `wavelength` for a given dry matter.
///
/// Red edge near 700 nm, chlorophyll dip at 675 nm that fades as dry matter
/// rises, a NIR plateau that grows with dry matter, and a water dip at 970 nm.
pub fn reflectance_model(wavelength: f64, dry_matter: f64) -> f64 {
    let red_edge = 30.0 * sigmoid((wavelength - 700.0) / 15.0);
    let chlorophyll = gaussian(wavelength, 675.0, 18.0, 6.0 * (1.0 - dry_matter / 20.0));
    let plateau = 0.8 * dry_matter * sigmoid((wavelength - 720.0) / 20.0);
    let water = gaussian(wavelength, 970.0, 25.0, 5.0);
    8.0 + red_edge - chlorophyll + plateau - water
}

/// Generate `n` labelled curves on `wavelengths` with uniform noise of
/// amplitude `noise` (percentage points).
pub fn synthetic_curves(
    rng: &mut StdRng,
    n: usize,
    wavelengths: &[f64],
    noise: f64,
) -> Result<Vec<LabeledCurve>> {
    (0..n)
        .map(|i| {
            let dry_matter = rng.gen_range(0.0..20.0);
            let reflectance = wavelengths
                .iter()
                .map(|&w| {
                    let jitter = if noise > 0.0 {
                        rng.gen_range(-noise..noise)
                    } else {
                        0.0
                    };
                    (reflectance_model(w, dry_matter) + jitter).clamp(0.0, 100.0)
                })
                .collect();
            Ok(LabeledCurve {
                id: format!("Sample {}", i + 1),
                curve: RawCurve::new(wavelengths.to_vec(), reflectance)?,
                dry_matter,
                spoilage_risk: SpoilageRisk::ALL[rng.gen_range(0..SpoilageRisk::ALL.len())],
                pesticide_status: PesticideStatus::ALL
                    [rng.gen_range(0..PesticideStatus::ALL.len())],
                confidence: rng.gen_range(0.0..100.0),
            })
        })
        .collect()
}
