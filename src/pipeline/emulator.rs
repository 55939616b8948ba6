//! Band emulation: resample a fine hyperspectral curve onto fixed sensor bands.
//!
//! Each band averages every raw point inside a window around its center.
//! The window comes from [`BandWindow`]; what happens when a window misses
//! the measured range entirely is the caller's choice via [`OutOfRangePolicy`].
//! A window that only partly overlaps the curve averages the covered points
//! and is flagged [`BandQuality::Partial`]; the policy does not apply to it.

use serde::{Deserialize, Serialize};

use crate::data::model::{BandSchema, LabeledCurve, RawCurve, Sample};
use crate::error::PipelineError;

/// Half-width used when a schema has a single band and no spacing to derive from.
const SINGLE_BAND_HALF_WIDTH_NM: f64 = 10.0;

/// How wide each band's averaging window is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BandWindow {
    /// Half the distance to each neighbouring center; edge bands mirror their
    /// only neighbour.
    #[default]
    Adaptive,
    /// Symmetric window of the given half-width in nm.
    HalfWidth(f64),
}

/// What to do with a band whose window lies fully outside the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Use the reflectance of the nearest curve endpoint.
    #[default]
    NearestValue,
    /// Fail with [`PipelineError::BandOutOfRange`].
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulationOptions {
    pub window: BandWindow,
    pub out_of_range: OutOfRangePolicy,
}

/// How a band value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandQuality {
    /// Mean of raw points inside the window.
    Measured,
    /// Window extends past a curve endpoint; mean of the covered points only.
    Partial,
    /// Window overlaps the curve but holds no raw point; interpolated at center.
    Interpolated,
    /// Window outside the curve; nearest endpoint value.
    Extrapolated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmulatedBands {
    pub values: Vec<f64>,
    pub quality: Vec<BandQuality>,
}

impl EmulatedBands {
    pub fn is_fully_measured(&self) -> bool {
        self.quality.iter().all(|q| *q == BandQuality::Measured)
    }

    pub fn count(&self, quality: BandQuality) -> usize {
        self.quality.iter().filter(|q| **q == quality).count()
    }
}

/// Per-band `(low, high)` window bounds in nm.
pub fn band_windows(schema: &BandSchema, window: BandWindow) -> Vec<(f64, f64)> {
    let centers = schema.centers();
    match window {
        BandWindow::HalfWidth(hw) => centers.iter().map(|&c| (c - hw, c + hw)).collect(),
        BandWindow::Adaptive => {
            if centers.len() == 1 {
                let c = centers[0];
                return vec![(c - SINGLE_BAND_HALF_WIDTH_NM, c + SINGLE_BAND_HALF_WIDTH_NM)];
            }
            let last = centers.len() - 1;
            centers
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    let left = if i == 0 {
                        (centers[1] - c) / 2.0
                    } else {
                        (c - centers[i - 1]) / 2.0
                    };
                    let right = if i == last {
                        (c - centers[last - 1]) / 2.0
                    } else {
                        (centers[i + 1] - c) / 2.0
                    };
                    (c - left, c + right)
                })
                .collect()
        }
    }
}

/// Resample `curve` onto `schema`.
pub fn emulate(
    curve: &RawCurve,
    schema: &BandSchema,
    options: &EmulationOptions,
) -> Result<EmulatedBands, PipelineError> {
    curve.validate()?;
    if let BandWindow::HalfWidth(hw) = options.window {
        if !(hw.is_finite() && hw > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "band half-width must be positive, got {hw}"
            )));
        }
    }

    let (lo, hi) = curve.range();
    let windows = band_windows(schema, options.window);
    let mut values = Vec::with_capacity(windows.len());
    let mut quality = Vec::with_capacity(windows.len());

    for (band, (&center, &(w_lo, w_hi))) in schema.centers().iter().zip(&windows).enumerate() {
        if w_hi < lo || w_lo > hi {
            match options.out_of_range {
                OutOfRangePolicy::Error => {
                    return Err(PipelineError::BandOutOfRange {
                        band,
                        center_nm: center,
                    })
                }
                OutOfRangePolicy::NearestValue => {
                    let nearest = if w_hi < lo {
                        curve.reflectance[0]
                    } else {
                        curve.reflectance[curve.reflectance.len() - 1]
                    };
                    values.push(nearest);
                    quality.push(BandQuality::Extrapolated);
                    continue;
                }
            }
        }

        let (sum, n) = curve
            .wavelengths
            .iter()
            .zip(&curve.reflectance)
            .filter(|(w, _)| **w >= w_lo && **w <= w_hi)
            .fold((0.0, 0usize), |(s, n), (_, r)| (s + r, n + 1));

        if n > 0 {
            values.push(sum / n as f64);
            quality.push(if w_lo < lo || w_hi > hi {
                BandQuality::Partial
            } else {
                BandQuality::Measured
            });
        } else {
            values.push(interpolate(curve, center.clamp(lo, hi)));
            quality.push(BandQuality::Interpolated);
        }
    }

    Ok(EmulatedBands { values, quality })
}

/// Linear interpolation of the curve at `x`, which must lie in its range.
fn interpolate(curve: &RawCurve, x: f64) -> f64 {
    let w = &curve.wavelengths;
    let r = &curve.reflectance;
    // first index with w[i] >= x
    let i = w.partition_point(|&v| v < x);
    if i == 0 {
        return r[0];
    }
    if i >= w.len() {
        return r[r.len() - 1];
    }
    let t = (x - w[i - 1]) / (w[i] - w[i - 1]);
    r[i - 1] + t * (r[i] - r[i - 1])
}

/// Emulate a batch of labelled curves into samples.
pub fn emulate_all(
    curves: Vec<LabeledCurve>,
    schema: &BandSchema,
    options: &EmulationOptions,
) -> Result<Vec<Sample>, PipelineError> {
    let mut samples = Vec::with_capacity(curves.len());
    let mut degraded = 0usize;
    for labeled in curves {
        let bands = emulate(&labeled.curve, schema, options)?;
        if !bands.is_fully_measured() {
            degraded += 1;
            log::debug!(
                "{}: {} partial, {} interpolated, {} extrapolated bands",
                labeled.id,
                bands.count(BandQuality::Partial),
                bands.count(BandQuality::Interpolated),
                bands.count(BandQuality::Extrapolated)
            );
        }
        samples.push(labeled.into_sample(bands.values));
    }
    if degraded > 0 {
        log::warn!(
            "{degraded} of {} curves had bands not fully covered by measurements",
            samples.len()
        );
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_curve(from: f64, to: f64, step: f64, value: f64) -> RawCurve {
        let n = ((to - from) / step).round() as usize + 1;
        let wavelengths: Vec<f64> = (0..n).map(|i| from + step * i as f64).collect();
        let reflectance = vec![value; n];
        RawCurve::new(wavelengths, reflectance).unwrap()
    }

    #[test]
    fn adaptive_windows_meet_halfway() {
        let schema = BandSchema::new(vec![400.0, 420.0, 460.0]).unwrap();
        let w = band_windows(&schema, BandWindow::Adaptive);
        assert_eq!(w, vec![(390.0, 410.0), (410.0, 440.0), (440.0, 480.0)]);
    }

    #[test]
    fn fixed_half_width_windows() {
        let schema = BandSchema::new(vec![500.0, 600.0]).unwrap();
        let w = band_windows(&schema, BandWindow::HalfWidth(5.0));
        assert_eq!(w, vec![(495.0, 505.0), (595.0, 605.0)]);
    }

    #[test]
    fn flat_curve_emulates_to_constant_bands() {
        // the 410 nm window starts at 397.5 nm
        let curve = flat_curve(395.0, 1000.0, 1.0, 42.0);
        let bands = emulate(&curve, &BandSchema::as7265x(), &EmulationOptions::default()).unwrap();
        assert_eq!(bands.values.len(), 18);
        assert!(bands.is_fully_measured());
        assert!(bands.values.iter().all(|v| (v - 42.0).abs() < 1e-12));
    }

    #[test]
    fn band_value_is_window_mean() {
        // reflectance = wavelength - 400 on a 1 nm grid
        let wavelengths: Vec<f64> = (0..=200).map(|i| 400.0 + i as f64).collect();
        let reflectance: Vec<f64> = wavelengths.iter().map(|w| w - 400.0).collect();
        let curve = RawCurve::new(wavelengths, reflectance).unwrap();
        let schema = BandSchema::new(vec![500.0]).unwrap();
        let options = EmulationOptions {
            window: BandWindow::HalfWidth(10.0),
            ..Default::default()
        };
        let bands = emulate(&curve, &schema, &options).unwrap();
        assert!((bands.values[0] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn window_straddling_curve_start_is_flagged_partial() {
        let wavelengths: Vec<f64> = (0..=580).map(|i| 420.0 + i as f64).collect();
        let reflectance: Vec<f64> = wavelengths
            .iter()
            .map(|w| if *w < 430.0 { 45.0 } else { 60.0 })
            .collect();
        let curve = RawCurve::new(wavelengths, reflectance).unwrap();
        let bands = emulate(&curve, &BandSchema::as7265x(), &EmulationOptions::default()).unwrap();
        // 410 nm window is [397.5, 422.5]; only 420 and 421 nm are covered
        assert_eq!(bands.quality[0], BandQuality::Partial);
        assert_eq!(bands.values[0], 45.0);
        assert_eq!(bands.quality[1], BandQuality::Measured);
        assert_eq!(bands.count(BandQuality::Partial), 1);
        assert!(!bands.is_fully_measured());
    }

    #[test]
    fn strict_policy_still_accepts_partial_windows() {
        let curve = flat_curve(420.0, 1000.0, 1.0, 30.0);
        let options = EmulationOptions {
            out_of_range: OutOfRangePolicy::Error,
            ..Default::default()
        };
        let bands = emulate(&curve, &BandSchema::as7265x(), &options).unwrap();
        assert_eq!(bands.quality[0], BandQuality::Partial);
        assert_eq!(bands.values[0], 30.0);
    }

    #[test]
    fn sparse_curve_interpolates_at_center() {
        let curve = RawCurve::new(vec![400.0, 600.0], vec![10.0, 30.0]).unwrap();
        let schema = BandSchema::new(vec![500.0]).unwrap();
        let options = EmulationOptions {
            window: BandWindow::HalfWidth(5.0),
            ..Default::default()
        };
        let bands = emulate(&curve, &schema, &options).unwrap();
        assert_eq!(bands.quality, vec![BandQuality::Interpolated]);
        assert!((bands.values[0] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_band_uses_nearest_value_and_is_flagged() {
        let wavelengths: Vec<f64> = (0..=100).map(|i| 450.0 + 2.0 * i as f64).collect();
        let reflectance: Vec<f64> = (0..=100).map(|i| 10.0 + 0.1 * i as f64).collect();
        let curve = RawCurve::new(wavelengths, reflectance).unwrap();
        let bands = emulate(&curve, &BandSchema::as7265x(), &EmulationOptions::default()).unwrap();
        // 410 nm window is [397.5, 422.5], entirely below 450 nm
        assert_eq!(bands.quality[0], BandQuality::Extrapolated);
        assert_eq!(bands.values[0], 10.0);
        // 940 nm is above 650 nm
        assert_eq!(bands.quality[17], BandQuality::Extrapolated);
        assert!((bands.values[17] - 20.0).abs() < 1e-12);
        assert!(!bands.is_fully_measured());
    }

    #[test]
    fn out_of_range_band_errors_under_strict_policy() {
        let curve = flat_curve(500.0, 700.0, 1.0, 50.0);
        let options = EmulationOptions {
            out_of_range: OutOfRangePolicy::Error,
            ..Default::default()
        };
        let err = emulate(&curve, &BandSchema::as7265x(), &options).unwrap_err();
        assert_eq!(
            err,
            PipelineError::BandOutOfRange {
                band: 0,
                center_nm: 410.0
            }
        );
    }

    #[test]
    fn invalid_curve_is_rejected() {
        let curve = RawCurve {
            wavelengths: vec![500.0, 500.0],
            reflectance: vec![1.0, 2.0],
        };
        assert!(matches!(
            emulate(&curve, &BandSchema::as7265x(), &EmulationOptions::default()),
            Err(PipelineError::InvalidCurve(_))
        ));
    }
}
