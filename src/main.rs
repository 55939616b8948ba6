mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use agrispectral::config::AppConfig;
use app::AgriSpectralApp;
use clap::Parser;
use eframe::egui;

/// Fruit-quality dashboard over emulated 18-band spectral readings.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// JSON configuration file (defaults apply to anything it omits).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raw curve file (.parquet, .json, .csv) or exported band table (.csv).
    /// Without it the dashboard starts on synthetic demo data.
    data_file: Option<PathBuf>,
}

fn main() -> eframe::Result {
    env_logger::init();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "AgriSpectral – Fruit Quality Dashboard",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(AgriSpectralApp::new(
                config,
                cli.data_file.as_deref(),
            )))
        }),
    )
}
