use anyhow::Result;

use super::model::SampleSet;

/// Anything that can hand a session its samples.
///
/// Implemented by [`super::synthetic::SyntheticSource`] and
/// [`super::loader::FileSource`]; a session does not care which it gets.
pub trait SampleSource {
    /// Short human-readable origin, shown in the dashboard status bar.
    fn describe(&self) -> String;

    fn load(&self) -> Result<SampleSet>;
}
