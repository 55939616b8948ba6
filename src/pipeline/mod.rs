//! Analytics pipeline, three stages:
//!
//! ```text
//!   RawCurve ──► emulator ──► band vector
//!                                 │
//!          SampleSet ◄────────────┘
//!        ┌────┴─────┐
//!        ▼          ▼
//!   estimator    reducer
//!   (ridge,      (histogram,
//!    freshness)   PCA)
//! ```
//!
//! Every stage is a pure function returning `Result<_, PipelineError>`.

pub mod emulator;
pub mod estimator;
pub mod reducer;

pub use emulator::{
    emulate, emulate_all, BandQuality, BandWindow, EmulatedBands, EmulationOptions,
    OutOfRangePolicy,
};
pub use estimator::{
    classify_freshness, evaluate, holdout_split, label_counts, predict, predict_all, train,
    FitReport, Freshness, FreshnessPolicy, FreshnessTier, LabelCounts, TrainedModel,
};
pub use reducer::{
    histogram, reduce, GroupField, Histogram, HistogramGroup, ProjectionResult, Standardizer,
    ValueField,
};
