use std::collections::BTreeSet;

use super::model::{PesticideStatus, Sample, SampleSet, SpoilageRisk};

// ---------------------------------------------------------------------------
// Filter predicate: which label values are selected
// ---------------------------------------------------------------------------

/// Per-category selection state. A sample is visible when both its risk
/// and its status are selected; an empty set hides everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFilter {
    pub risks: BTreeSet<SpoilageRisk>,
    pub statuses: BTreeSet<PesticideStatus>,
}

impl Default for SampleFilter {
    /// Everything selected (i.e., show all).
    fn default() -> Self {
        Self {
            risks: SpoilageRisk::ALL.into_iter().collect(),
            statuses: PesticideStatus::ALL.into_iter().collect(),
        }
    }
}

impl SampleFilter {
    pub fn accepts(&self, sample: &Sample) -> bool {
        self.risks.contains(&sample.spoilage_risk)
            && self.statuses.contains(&sample.pesticide_status)
    }

    /// Indices of samples passing the filter, in order.
    pub fn visible_indices(&self, samples: &SampleSet) -> Vec<usize> {
        samples
            .samples()
            .iter()
            .enumerate()
            .filter(|(_, s)| self.accepts(s))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn toggle_risk(&mut self, risk: SpoilageRisk) {
        if !self.risks.remove(&risk) {
            self.risks.insert(risk);
        }
    }

    pub fn toggle_status(&mut self, status: PesticideStatus) {
        if !self.statuses.remove(&status) {
            self.statuses.insert(status);
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::BandSchema;

    fn set() -> SampleSet {
        let samples = (0..9)
            .map(|i| Sample {
                id: format!("Sample {}", i + 1),
                bands: vec![1.0],
                dry_matter: i as f64,
                spoilage_risk: SpoilageRisk::ALL[i % 3],
                pesticide_status: PesticideStatus::ALL[i / 3],
                confidence: 0.0,
            })
            .collect();
        SampleSet::new(BandSchema::new(vec![500.0]).unwrap(), samples).unwrap()
    }

    #[test]
    fn default_filter_shows_everything() {
        let filter = SampleFilter::default();
        assert!(filter.is_unfiltered());
        assert_eq!(filter.visible_indices(&set()), (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn toggling_hides_and_restores() {
        let mut filter = SampleFilter::default();
        filter.toggle_risk(SpoilageRisk::High);
        filter.toggle_status(PesticideStatus::Pure);
        // Pure is rows 0..3, High is i % 3 == 2
        assert_eq!(filter.visible_indices(&set()), vec![3, 4, 6, 7]);
        filter.toggle_risk(SpoilageRisk::High);
        filter.toggle_status(PesticideStatus::Pure);
        assert!(filter.is_unfiltered());
    }

    #[test]
    fn empty_selection_hides_everything() {
        let mut filter = SampleFilter::default();
        filter.statuses.clear();
        assert!(filter.visible_indices(&set()).is_empty());
    }
}
