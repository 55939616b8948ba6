use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::loader::{
    band_column, CONFIDENCE_COLUMN, DRY_MATTER_COLUMN, ID_COLUMN, RISK_COLUMN, STATUS_COLUMN,
};
use super::model::Sample;
use crate::pipeline::Freshness;
use crate::session::Session;

pub const PREDICTED_COLUMN: &str = "predicted_dry_matter";
pub const FRESHNESS_PERCENT_COLUMN: &str = "freshness_percent";
pub const FRESHNESS_TIER_COLUMN: &str = "freshness_tier";

/// Header of principal-component column `index` (0-based): `pc1`, `pc2`, …
pub fn component_column(index: usize) -> String {
    format!("pc{}", index + 1)
}

// ---------------------------------------------------------------------------
// Column assembly
// ---------------------------------------------------------------------------

/// Everything one export row needs, gathered from the session once.
///
/// Derived columns are `None` for every row when their stage failed.
struct ExportColumns<'a> {
    samples: &'a [Sample],
    n_bands: usize,
    predicted: Vec<Option<f64>>,
    freshness: Vec<Freshness>,
    /// Outer index is the component, inner the sample.
    components: Vec<Vec<Option<f64>>>,
}

impl<'a> ExportColumns<'a> {
    fn gather(session: &'a Session) -> Self {
        let set = session.samples();
        let n = set.len();

        let predicted = match session.predictions() {
            Some(p) => p.iter().map(|&v| Some(v)).collect(),
            None => vec![None; n],
        };

        let freshness = (0..n).filter_map(|i| session.freshness_of(i)).collect();

        let components = match session.projection() {
            Ok(proj) => (0..proj.components())
                .map(|c| proj.component(c).into_iter().map(Some).collect())
                .collect(),
            Err(_) => vec![vec![None; n]; session.config().pca_components],
        };

        Self {
            samples: set.samples(),
            n_bands: set.n_bands(),
            predicted,
            freshness,
            components,
        }
    }

    fn headers(&self) -> Vec<String> {
        let mut headers = vec![ID_COLUMN.to_string()];
        headers.extend((0..self.n_bands).map(band_column));
        headers.extend(
            [
                DRY_MATTER_COLUMN,
                RISK_COLUMN,
                STATUS_COLUMN,
                CONFIDENCE_COLUMN,
                PREDICTED_COLUMN,
                FRESHNESS_PERCENT_COLUMN,
                FRESHNESS_TIER_COLUMN,
            ]
            .map(String::from),
        );
        headers.extend((0..self.components.len()).map(component_column));
        headers
    }
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write the session's sample table as CSV.
///
/// The layout is a band table, so the file loads back through
/// [`super::loader::load_file`] into the same samples.
pub fn export_csv(path: &Path, session: &Session) -> Result<()> {
    let columns = ExportColumns::gather(session);
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(columns.headers())
        .context("writing CSV header")?;

    for (i, sample) in columns.samples.iter().enumerate() {
        let mut record = Vec::with_capacity(columns.n_bands + 8 + columns.components.len());
        record.push(sample.id.clone());
        record.extend(sample.bands.iter().map(|b| b.to_string()));
        record.push(sample.dry_matter.to_string());
        record.push(sample.spoilage_risk.to_string());
        record.push(sample.pesticide_status.to_string());
        record.push(sample.confidence.to_string());
        record.push(optional_cell(columns.predicted[i]));
        record.push(optional_cell(columns.freshness.get(i).map(|f| f.percent)));
        record.push(
            columns
                .freshness
                .get(i)
                .map(|f| f.tier.to_string())
                .unwrap_or_default(),
        );
        record.extend(columns.components.iter().map(|c| optional_cell(c[i])));
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {i}"))?;
    }

    writer.flush().context("flushing CSV writer")?;
    log::info!(
        "Exported {} samples to {}",
        columns.samples.len(),
        path.display()
    );
    Ok(())
}

/// Write the session's sample table as a Parquet file, one flat column per
/// field. Failed derived stages come out as null columns.
pub fn export_parquet(path: &Path, session: &Session) -> Result<()> {
    let columns = ExportColumns::gather(session);
    let samples = columns.samples;

    let mut fields = vec![Field::new(ID_COLUMN, DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
        samples.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
    ))];

    for b in 0..columns.n_bands {
        fields.push(Field::new(band_column(b), DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(
            samples.iter().map(|s| s.bands[b]).collect::<Vec<_>>(),
        )));
    }

    fields.push(Field::new(DRY_MATTER_COLUMN, DataType::Float64, false));
    arrays.push(Arc::new(Float64Array::from(
        samples.iter().map(|s| s.dry_matter).collect::<Vec<_>>(),
    )));
    fields.push(Field::new(RISK_COLUMN, DataType::Utf8, false));
    arrays.push(Arc::new(StringArray::from(
        samples
            .iter()
            .map(|s| s.spoilage_risk.as_str())
            .collect::<Vec<_>>(),
    )));
    fields.push(Field::new(STATUS_COLUMN, DataType::Utf8, false));
    arrays.push(Arc::new(StringArray::from(
        samples
            .iter()
            .map(|s| s.pesticide_status.as_str())
            .collect::<Vec<_>>(),
    )));
    fields.push(Field::new(CONFIDENCE_COLUMN, DataType::Float64, false));
    arrays.push(Arc::new(Float64Array::from(
        samples.iter().map(|s| s.confidence).collect::<Vec<_>>(),
    )));

    fields.push(Field::new(PREDICTED_COLUMN, DataType::Float64, true));
    arrays.push(Arc::new(Float64Array::from(columns.predicted.clone())));
    fields.push(Field::new(FRESHNESS_PERCENT_COLUMN, DataType::Float64, false));
    arrays.push(Arc::new(Float64Array::from(
        columns.freshness.iter().map(|f| f.percent).collect::<Vec<_>>(),
    )));
    fields.push(Field::new(FRESHNESS_TIER_COLUMN, DataType::Utf8, false));
    arrays.push(Arc::new(StringArray::from(
        columns
            .freshness
            .iter()
            .map(|f| f.tier.as_str())
            .collect::<Vec<_>>(),
    )));

    for (c, values) in columns.components.iter().enumerate() {
        fields.push(Field::new(component_column(c), DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(values.clone())));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch =
        RecordBatch::try_new(schema.clone(), arrays).context("building export record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    log::info!("Exported {} samples to {}", samples.len(), path.display());
    Ok(())
}
