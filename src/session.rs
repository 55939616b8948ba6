use std::collections::BTreeMap;

use anyhow::Result;

use crate::config::PipelineConfig;
use crate::data::filter::SampleFilter;
use crate::data::model::{Sample, SampleSet};
use crate::data::source::SampleSource;
use crate::error::PipelineError;
use crate::pipeline::{
    classify_freshness, evaluate, histogram, holdout_split, label_counts, predict_all, reduce,
    train, FitReport, Freshness, FreshnessTier, GroupField, Histogram, LabelCounts,
    ProjectionResult, TrainedModel, ValueField,
};

// ---------------------------------------------------------------------------
// Session: one sample set and everything derived from it
// ---------------------------------------------------------------------------

/// Session-scoped analytics state.
///
/// Created once per dashboard session and dropped with it; nothing here is
/// shared between sessions. Each derived artifact is kept as a `Result` so a
/// failed stage withholds only its own output.
#[derive(Debug)]
pub struct Session {
    source: String,
    config: PipelineConfig,
    samples: SampleSet,
    model: Result<TrainedModel, PipelineError>,
    /// Model estimate per sample; `None` when the model is unavailable.
    predictions: Option<Vec<f64>>,
    /// `None` when no holdout is configured.
    holdout_fit: Option<Result<FitReport, PipelineError>>,
    projection: Result<ProjectionResult, PipelineError>,
    histogram_group: Option<GroupField>,
    histogram: Result<Histogram, PipelineError>,
    label_counts: LabelCounts,
    threshold: f64,
    selected: usize,
    pub filter: SampleFilter,
}

impl Session {
    /// Load from `source` and run every stage once.
    pub fn start(source: &dyn SampleSource, config: &PipelineConfig) -> Result<Self> {
        let samples = source.load()?;
        Ok(Self::from_samples(source.describe(), samples, config))
    }

    pub fn from_samples(source: String, samples: SampleSet, config: &PipelineConfig) -> Self {
        let model = train(&samples, config.ridge_alpha);
        let predictions = model
            .as_ref()
            .ok()
            .and_then(|m| predict_all(m, &samples).ok());
        let holdout_fit = (config.holdout_fraction > 0.0).then(|| held_out_fit(&samples, config));
        let projection = reduce(&samples, config.pca_components, config.variance_epsilon);
        let histogram_group = Some(GroupField::SpoilageRisk);
        let histogram = histogram(
            &samples,
            ValueField::DryMatter,
            histogram_group,
            config.histogram_bins,
        );
        let label_counts = label_counts(&samples);

        match &model {
            Ok(m) => log::info!(
                "Session '{source}': {} samples, ridge R2={:.3} (in-sample)",
                samples.len(),
                m.training_fit.r2
            ),
            Err(e) => log::warn!("Session '{source}': model unavailable: {e}"),
        }
        if let Some(Ok(fit)) = &holdout_fit {
            log::info!("Held-out R2={:.3} on {} samples", fit.r2, fit.n);
        }
        for err in [projection.as_ref().err(), histogram.as_ref().err()]
            .into_iter()
            .flatten()
        {
            log::warn!("Session '{source}': {err}");
        }

        Session {
            source,
            config: config.clone(),
            samples,
            model,
            predictions,
            holdout_fit,
            projection,
            histogram_group,
            histogram,
            label_counts,
            threshold: config.default_threshold,
            selected: 0,
            filter: SampleFilter::default(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn model(&self) -> Result<&TrainedModel, &PipelineError> {
        self.model.as_ref()
    }

    pub fn predictions(&self) -> Option<&[f64]> {
        self.predictions.as_deref()
    }

    pub fn holdout_fit(&self) -> Option<Result<&FitReport, &PipelineError>> {
        self.holdout_fit.as_ref().map(|r| r.as_ref())
    }

    pub fn projection(&self) -> Result<&ProjectionResult, &PipelineError> {
        self.projection.as_ref()
    }

    pub fn histogram(&self) -> Result<&Histogram, &PipelineError> {
        self.histogram.as_ref()
    }

    pub fn histogram_group(&self) -> Option<GroupField> {
        self.histogram_group
    }

    /// Re-bucket the dry-matter histogram with a different grouping.
    pub fn set_histogram_group(&mut self, group_by: Option<GroupField>) {
        if group_by == self.histogram_group {
            return;
        }
        self.histogram_group = group_by;
        self.histogram = histogram(
            &self.samples,
            ValueField::DryMatter,
            group_by,
            self.config.histogram_bins,
        );
    }

    pub fn label_counts(&self) -> &LabelCounts {
        &self.label_counts
    }

    // -- Threshold & selection --

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Set the freshness threshold, clamped to `0..=100`. Never retrains.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold.clamp(0.0, 100.0);
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn select(&mut self, index: usize) -> Result<(), PipelineError> {
        if index >= self.samples.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "sample index {index} out of range for {} samples",
                self.samples.len()
            )));
        }
        self.selected = index;
        Ok(())
    }

    pub fn selected_sample(&self) -> Option<&Sample> {
        self.samples.get(self.selected)
    }

    /// Freshness from the sample's stored dry matter.
    pub fn freshness_of(&self, index: usize) -> Option<Freshness> {
        let sample = self.samples.get(index)?;
        Some(classify_freshness(
            sample.dry_matter,
            self.threshold,
            &self.config.freshness,
        ))
    }

    /// Freshness from the model's dry-matter estimate.
    pub fn predicted_freshness_of(&self, index: usize) -> Option<Freshness> {
        let estimate = *self.predictions.as_ref()?.get(index)?;
        Some(classify_freshness(
            estimate,
            self.threshold,
            &self.config.freshness,
        ))
    }

    /// Tier tally over every sample at the current threshold (stored dry matter).
    pub fn tier_counts(&self) -> BTreeMap<FreshnessTier, usize> {
        let mut counts: BTreeMap<FreshnessTier, usize> =
            FreshnessTier::ALL.iter().map(|t| (*t, 0)).collect();
        for i in 0..self.samples.len() {
            if let Some(f) = self.freshness_of(i) {
                *counts.entry(f.tier).or_default() += 1;
            }
        }
        counts
    }

    /// Indices passing the current category filter.
    pub fn visible_indices(&self) -> Vec<usize> {
        self.filter.visible_indices(&self.samples)
    }
}

/// Fit on a shuffled training part and score on the rest.
fn held_out_fit(samples: &SampleSet, config: &PipelineConfig) -> Result<FitReport, PipelineError> {
    let (train_set, test_set) =
        holdout_split(samples, config.holdout_fraction, config.holdout_seed)?;
    let model = train(&train_set, config.ridge_alpha)?;
    evaluate(&model, &test_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyntheticConfig;
    use crate::data::model::BandSchema;
    use crate::data::synthetic::SyntheticSource;

    fn demo_session(config: &PipelineConfig) -> Session {
        let source = SyntheticSource::new(&SyntheticConfig::default());
        Session::start(&source, config).unwrap()
    }

    #[test]
    fn demo_session_runs_every_stage() {
        let session = demo_session(&PipelineConfig::default());
        assert_eq!(session.samples().len(), 100);
        let model = session.model().unwrap();
        assert_eq!(model.coefficients.len(), 18);
        assert_eq!(session.predictions().unwrap().len(), 100);
        assert!(session.holdout_fit().is_none());
        let projection = session.projection().unwrap();
        assert_eq!(projection.coordinates.len(), 100);
        assert_eq!(projection.components(), 3);
        let hist = session.histogram().unwrap();
        assert_eq!(hist.bins(), 20);
        assert_eq!(hist.total(), 100);
        assert_eq!(session.threshold(), 70.0);
        assert!(session.source().starts_with("synthetic"));
    }

    #[test]
    fn threshold_changes_reclassify_without_retraining() {
        let mut session = demo_session(&PipelineConfig::default());
        let before = session.model().unwrap().clone();
        session.set_threshold(10.0);
        let lenient = session.tier_counts()[&FreshnessTier::Fresh];
        session.set_threshold(95.0);
        let strict = session.tier_counts()[&FreshnessTier::Fresh];
        assert!(lenient >= strict);
        assert_eq!(session.model().unwrap(), &before);
        session.set_threshold(250.0);
        assert_eq!(session.threshold(), 100.0);
    }

    #[test]
    fn selection_is_bounds_checked() {
        let mut session = demo_session(&PipelineConfig::default());
        session.select(4).unwrap();
        assert_eq!(session.selected_sample().unwrap().id, "Sample 5");
        assert!(session.select(100).is_err());
        assert_eq!(session.selected_index(), 4);
        assert!(session.freshness_of(4).is_some());
        assert!(session.predicted_freshness_of(4).is_some());
        assert!(session.freshness_of(100).is_none());
    }

    #[test]
    fn holdout_fit_is_reported_separately() {
        let config = PipelineConfig {
            holdout_fraction: 0.25,
            ..Default::default()
        };
        let session = demo_session(&config);
        let held_out = session.holdout_fit().unwrap().unwrap();
        assert_eq!(held_out.n, 25);
        // random bands carry no signal: the held-out score trails the in-sample one
        assert!(held_out.r2 < session.model().unwrap().training_fit.r2);
    }

    #[test]
    fn empty_sample_set_withholds_outputs_without_panicking() {
        let session = Session::from_samples(
            "empty".into(),
            SampleSet::empty(BandSchema::as7265x()),
            &PipelineConfig::default(),
        );
        assert_eq!(session.model().unwrap_err(), &PipelineError::EmptySampleSet);
        assert_eq!(session.histogram().unwrap_err(), &PipelineError::EmptySampleSet);
        assert_eq!(session.projection().unwrap_err(), &PipelineError::EmptySampleSet);
        assert!(session.predictions().is_none());
        assert!(session.selected_sample().is_none());
    }

    #[test]
    fn histogram_grouping_can_change() {
        let mut session = demo_session(&PipelineConfig::default());
        session.set_histogram_group(Some(GroupField::PesticideStatus));
        let hist = session.histogram().unwrap();
        assert_eq!(hist.groups[0].label, "Pure");
        session.set_histogram_group(None);
        assert_eq!(session.histogram().unwrap().groups.len(), 1);
    }
}
