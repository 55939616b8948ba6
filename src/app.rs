use std::path::Path;

use eframe::egui::{self, ScrollArea, Ui};

use agrispectral::config::AppConfig;

use crate::state::AppState;
use crate::ui::{cards, panels, plot, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct AgriSpectralApp {
    pub state: AppState,
}

impl AgriSpectralApp {
    /// Start a session on `data_file`, or on synthetic data without one.
    pub fn new(config: AppConfig, data_file: Option<&Path>) -> Self {
        let mut state = AppState::new(config);
        match data_file {
            Some(path) => state.load_path(path),
            None => state.load_synthetic(),
        }
        Self { state }
    }
}

impl eframe::App for AgriSpectralApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: controls ----
        egui::SidePanel::left("control_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: cards, charts, table ----
        egui::CentralPanel::default().show(ctx, |ui| {
            dashboard(ui, &mut self.state);
        });
    }
}

fn dashboard(ui: &mut Ui, state: &mut AppState) {
    let overlay_all = state.overlay_all;
    let Some(session) = state.session.as_mut() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No data loaded  (File → Open… or File → Demo data)");
        });
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            cards::kpi_row(ui, session);
            ui.add_space(8.0);

            ui.strong("Spectral signature");
            plot::spectral_plot(ui, session, overlay_all);
            ui.add_space(8.0);

            ui.columns(2, |cols| {
                cols[0].strong("Dry matter: measured vs predicted");
                plot::regression_plot(&mut cols[0], session);
                cols[1].strong("Dry matter distribution");
                plot::histogram_plot(&mut cols[1], session);
            });
            ui.add_space(8.0);

            ui.strong("Band PCA");
            plot::pca_plot(ui, session);
            ui.add_space(8.0);

            ui.strong("Samples");
            table::sample_table(ui, session);
        });
}
