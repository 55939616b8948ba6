use std::path::PathBuf;
use std::sync::Arc;

use agrispectral::data::loader::{
    CONFIDENCE_COLUMN, DRY_MATTER_COLUMN, ID_COLUMN, REFLECTANCE_COLUMN, RISK_COLUMN,
    STATUS_COLUMN, WAVELENGTH_COLUMN,
};
use agrispectral::data::model::LabeledCurve;
use agrispectral::data::synthetic::synthetic_curves;
use anyhow::{ensure, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Float64Builder, ListArray, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Write a synthetic hyperspectral curve file (400–1000 nm, 2 nm step) for
/// the dashboard's file source.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Output Parquet path.
    #[arg(short, long, default_value = "sample_data.parquet")]
    output: PathBuf,

    /// Number of curves.
    #[arg(short = 'n', long, default_value_t = 120)]
    count: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Uniform noise amplitude in reflectance percentage points.
    #[arg(long, default_value_t = 0.4)]
    noise: f64,
}

fn list_column(rows: impl Iterator<Item = Vec<f64>>) -> ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = builder.values();
        for v in row {
            values.append_value(v);
        }
        builder.append(true);
    }
    builder.finish()
}

fn build_batch(curves: &[LabeledCurve]) -> Result<RecordBatch> {
    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new(WAVELENGTH_COLUMN, DataType::List(item.clone()), false),
        Field::new(REFLECTANCE_COLUMN, DataType::List(item), false),
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new(DRY_MATTER_COLUMN, DataType::Float64, false),
        Field::new(RISK_COLUMN, DataType::Utf8, false),
        Field::new(STATUS_COLUMN, DataType::Utf8, false),
        Field::new(CONFIDENCE_COLUMN, DataType::Float64, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(list_column(
            curves.iter().map(|c| c.curve.wavelengths.clone()),
        )),
        Arc::new(list_column(
            curves.iter().map(|c| c.curve.reflectance.clone()),
        )),
        Arc::new(StringArray::from(
            curves.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            curves.iter().map(|c| c.dry_matter).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            curves
                .iter()
                .map(|c| c.spoilage_risk.as_str())
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            curves
                .iter()
                .map(|c| c.pesticide_status.as_str())
                .collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            curves.iter().map(|c| c.confidence).collect::<Vec<_>>(),
        )),
    ];

    RecordBatch::try_new(schema, columns).context("building record batch")
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    ensure!(args.count > 0, "--count must be at least 1");
    ensure!(
        args.noise.is_finite() && args.noise >= 0.0,
        "--noise must be a non-negative number"
    );

    // 400 → 1000 nm, step 2
    let wavelengths: Vec<f64> = (0..=300).map(|i| 400.0 + i as f64 * 2.0).collect();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let curves = synthetic_curves(&mut rng, args.count, &wavelengths, args.noise)?;
    let batch = build_batch(&curves)?;

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    log::info!("seed {}, noise {}", args.seed, args.noise);
    println!(
        "Wrote {} curves ({} wavelengths each) to {}",
        curves.len(),
        wavelengths.len(),
        args.output.display()
    );
    Ok(())
}
