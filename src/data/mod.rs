/// Data layer: sample types, ingest, filtering and export.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv        synthetic (seeded rng)
///        │                               │
///        ▼                               ▼
///   ┌──────────┐                 ┌─────────────┐
///   │  loader   │  FileSource    │  synthetic   │  SyntheticSource
///   └──────────┘                 └─────────────┘
///        │        SampleSource          │
///        └──────────────┬───────────────┘
///                       ▼
///               ┌──────────────┐
///               │   SampleSet   │  Vec<Sample>, BandSchema
///               └──────────────┘
///                 │          │
///                 ▼          ▼
///           ┌──────────┐ ┌──────────┐
///           │  filter   │ │  export   │  csv / parquet
///           └──────────┘ └──────────┘
/// ```

pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod source;
pub mod synthetic;
