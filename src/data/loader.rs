use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeListArray,
    ListArray, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{
    BandSchema, LabeledCurve, PesticideStatus, RawCurve, Sample, SampleSet, SpoilageRisk,
};
use super::source::SampleSource;
use crate::pipeline::{emulate_all, EmulationOptions};

/// Column holding the wavelength list of a raw curve.
pub const WAVELENGTH_COLUMN: &str = "x";
/// Column holding the reflectance list of a raw curve.
pub const REFLECTANCE_COLUMN: &str = "y";
pub const ID_COLUMN: &str = "sample_id";
pub const DRY_MATTER_COLUMN: &str = "dry_matter";
pub const RISK_COLUMN: &str = "spoilage_risk";
pub const STATUS_COLUMN: &str = "pesticide_status";
pub const CONFIDENCE_COLUMN: &str = "confidence";

/// Header of band column `index` (0-based) in band tables: `band_1`, `band_2`, …
pub fn band_column(index: usize) -> String {
    format!("band_{}", index + 1)
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// A dataset on disk, usable anywhere the synthetic source is.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
    pub schema: BandSchema,
    pub emulation: EmulationOptions,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, emulation: EmulationOptions) -> Self {
        Self {
            path: path.into(),
            schema: BandSchema::as7265x(),
            emulation,
        }
    }
}

impl SampleSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<SampleSet> {
        load_file(&self.path, &self.schema, &self.emulation)
    }
}

/// Load a sample set from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – raw curves: `x` / `y` list columns plus label columns
/// * `.json`    – raw curves: `[{ "x": [...], "y": [...], ...labels }, ...]`
/// * `.csv`     – raw curves with semicolon-separated `x` / `y`, or a band
///   table with `band_1..band_N` columns (the export layout)
///
/// Raw curves are resampled onto `schema` by the band emulator.
pub fn load_file(
    path: &Path,
    schema: &BandSchema,
    emulation: &EmulationOptions,
) -> Result<SampleSet> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let curves = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => {
            if csv_is_band_table(path)? {
                return load_band_table(path, schema);
            }
            load_csv(path)?
        }
        other => bail!("Unsupported file extension: .{other}"),
    };

    let n_curves = curves.len();
    let samples = emulate_all(curves, schema, emulation)
        .with_context(|| format!("emulating bands for {}", path.display()))?;
    let set = SampleSet::new(schema.clone(), samples)
        .with_context(|| format!("validating samples from {}", path.display()))?;
    log::info!(
        "Loaded {n_curves} curves from {} onto {} bands",
        path.display(),
        schema.len()
    );
    Ok(set)
}

/// Load only the labelled raw curves, without emulation.
pub fn load_curves(path: &Path) -> Result<Vec<LabeledCurve>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Label cells
// ---------------------------------------------------------------------------

/// A single label cell as read from any of the file formats.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
    Null,
}

impl Cell {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Null => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Cell::Text(s) if !s.is_empty() => Some(s.clone()),
            Cell::Number(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

struct Labels {
    id: String,
    dry_matter: f64,
    spoilage_risk: SpoilageRisk,
    pesticide_status: PesticideStatus,
    confidence: f64,
}

impl Labels {
    fn into_curve(self, curve: RawCurve) -> LabeledCurve {
        LabeledCurve {
            id: self.id,
            curve,
            dry_matter: self.dry_matter,
            spoilage_risk: self.spoilage_risk,
            pesticide_status: self.pesticide_status,
            confidence: self.confidence,
        }
    }

    fn into_sample(self, bands: Vec<f64>) -> Sample {
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

/// Read the label columns of one row through `cell`.
///
/// `dry_matter`, `spoilage_risk` and `pesticide_status` are required;
/// `confidence` defaults to 0 and `sample_id` to `Sample {row + 1}`.
fn read_labels(row: usize, cell: impl Fn(&str) -> Option<Cell>) -> Result<Labels> {
    let dry_matter = cell(DRY_MATTER_COLUMN)
        .and_then(|c| c.as_f64())
        .with_context(|| format!("Row {row}: missing or non-numeric '{DRY_MATTER_COLUMN}'"))?;
    let spoilage_risk = cell(RISK_COLUMN)
        .and_then(|c| c.as_text())
        .with_context(|| format!("Row {row}: missing '{RISK_COLUMN}'"))?
        .parse::<SpoilageRisk>()
        .with_context(|| format!("Row {row}"))?;
    let pesticide_status = cell(STATUS_COLUMN)
        .and_then(|c| c.as_text())
        .with_context(|| format!("Row {row}: missing '{STATUS_COLUMN}'"))?
        .parse::<PesticideStatus>()
        .with_context(|| format!("Row {row}"))?;
    let confidence = cell(CONFIDENCE_COLUMN)
        .and_then(|c| c.as_f64())
        .unwrap_or(0.0);
    let id = cell(ID_COLUMN)
        .and_then(|c| c.as_text())
        .unwrap_or_else(|| format!("Sample {}", row + 1));
    Ok(Labels {
        id,
        dry_matter,
        spoilage_risk,
        pesticide_status,
        confidence,
    })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   {
///     "x": [400.0, 402.0, ...],
///     "y": [12.1, 12.4, ...],
///     "sample_id": "A-17",
///     "dry_matter": 14.2,
///     "spoilage_risk": "Low",
///     "pesticide_status": "Pure",
///     "confidence": 88.0
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<LabeledCurve>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut curves = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let x = json_array_to_f64(obj.get(WAVELENGTH_COLUMN), i, WAVELENGTH_COLUMN)?;
        let y = json_array_to_f64(obj.get(REFLECTANCE_COLUMN), i, REFLECTANCE_COLUMN)?;
        let curve = RawCurve::new(x, y).with_context(|| format!("Row {i}"))?;

        let labels = read_labels(i, |col| obj.get(col).map(json_to_cell))?;
        curves.push(labels.into_curve(curve));
    }

    Ok(curves)
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

fn json_to_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::String(s) => Cell::Text(s.clone()),
        JsonValue::Number(n) => n.as_f64().map_or(Cell::Null, Cell::Number),
        JsonValue::Null => Cell::Null,
        other => Cell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loaders
// ---------------------------------------------------------------------------

fn csv_is_band_table(path: &Path) -> Result<bool> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?;
    let has = |name: &str| headers.iter().any(|h| h == name);
    if has(WAVELENGTH_COLUMN) && has(REFLECTANCE_COLUMN) {
        return Ok(false);
    }
    if has(band_column(0).as_str()) {
        return Ok(true);
    }
    bail!("CSV has neither 'x'/'y' curve columns nor 'band_1..' columns")
}

/// Curve CSV layout: header row with column names.
/// `x` and `y` columns contain semicolon-separated floats:
///   `"400;402;404"`, `"12.1;12.4;12.2"`
/// Label columns sit alongside.
fn load_csv(path: &Path) -> Result<Vec<LabeledCurve>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let x_idx = headers
        .iter()
        .position(|h| h == WAVELENGTH_COLUMN)
        .context("CSV missing 'x' column")?;
    let y_idx = headers
        .iter()
        .position(|h| h == REFLECTANCE_COLUMN)
        .context("CSV missing 'y' column")?;

    let mut curves = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let x = parse_semicolon_floats(record.get(x_idx).unwrap_or(""), row_no, "x")?;
        let y = parse_semicolon_floats(record.get(y_idx).unwrap_or(""), row_no, "y")?;
        let curve = RawCurve::new(x, y).with_context(|| format!("CSV row {row_no}"))?;

        let labels = read_labels(row_no, |col| {
            let idx = headers.iter().position(|h| h == col)?;
            record.get(idx).map(text_cell)
        })?;
        curves.push(labels.into_curve(curve));
    }

    Ok(curves)
}

/// Band table layout: `band_1..band_N` reflectance columns plus label
/// columns. Extra columns (derived export columns) are ignored.
pub fn load_band_table(path: &Path, schema: &BandSchema) -> Result<SampleSet> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let band_idx: Vec<usize> = (0..schema.len())
        .map(|b| {
            let name = band_column(b);
            headers
                .iter()
                .position(|h| *h == name)
                .with_context(|| format!("CSV missing '{name}' column"))
        })
        .collect::<Result<_>>()?;
    if headers.iter().any(|h| *h == band_column(schema.len())) {
        bail!(
            "CSV has more band columns than the {}-band schema",
            schema.len()
        );
    }

    let mut samples = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let bands = band_idx
            .iter()
            .enumerate()
            .map(|(b, &idx)| {
                let raw = record.get(idx).unwrap_or("").trim();
                raw.parse::<f64>().with_context(|| {
                    format!("Row {row_no}, {}: '{raw}' is not a number", band_column(b))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        let labels = read_labels(row_no, |col| {
            let idx = headers.iter().position(|h| h == col)?;
            record.get(idx).map(text_cell)
        })?;
        samples.push(labels.into_sample(bands));
    }

    let set = SampleSet::new(schema.clone(), samples)
        .with_context(|| format!("validating samples from {}", path.display()))?;
    log::info!("Loaded {} band rows from {}", set.len(), path.display());
    Ok(set)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn text_cell(s: &str) -> Cell {
    if s.trim().is_empty() {
        Cell::Null
    } else {
        Cell::Text(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of raw curves.
///
/// Expected schema:
/// - `x`: List<Float64> or LargeList<Float64> – wavelengths (nm)
/// - `y`: List<Float64> or LargeList<Float64> – reflectance (%)
/// - label columns as strings or numbers
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`), and with `generate_sample`.
fn load_parquet(path: &Path) -> Result<Vec<LabeledCurve>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut curves = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let x_idx = schema
            .index_of(WAVELENGTH_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'x' column"))?;
        let y_idx = schema
            .index_of(REFLECTANCE_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'y' column"))?;

        let x_col = batch.column(x_idx);
        let y_col = batch.column(y_idx);

        for row in 0..n_rows {
            let x = extract_f64_list(x_col, row)
                .with_context(|| format!("Row {row}: failed to read 'x'"))?;
            let y = extract_f64_list(y_col, row)
                .with_context(|| format!("Row {row}: failed to read 'y'"))?;
            let curve = RawCurve::new(x, y).with_context(|| format!("Row {row}"))?;

            let row_no = curves.len();
            let labels = read_labels(row_no, |col| {
                let idx = schema.index_of(col).ok()?;
                Some(extract_cell(batch.column(idx), row))
            })?;
            curves.push(labels.into_curve(curve));
        }
    }

    Ok(curves)
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a single label cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map_or(Cell::Null, |s| Cell::Text(s.value(row).to_string())),
        DataType::LargeUtf8 => Cell::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(Cell::Null, |a| Cell::Number(a.value(row) as f64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(Cell::Null, |a| Cell::Number(a.value(row) as f64)),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(Cell::Null, |a| Cell::Number(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(Cell::Null, |a| Cell::Number(a.value(row))),
        _ => Cell::Null,
    }
}
