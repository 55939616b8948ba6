use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use agrispectral::data::model::{PesticideStatus, SpoilageRisk};
use agrispectral::pipeline::GroupField;
use agrispectral::session::Session;

use crate::color::{risk_color, status_color};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – session controls
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("AgriSpectral");
    ui.separator();

    let Some(session) = state.session.as_mut() else {
        ui.label("No session.");
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            threshold_slider(ui, session);
            ui.separator();
            sample_selector(ui, session);
            ui.separator();
            category_filters(ui, session);
            ui.separator();
            histogram_grouping(ui, session);
            ui.separator();
            model_summary(ui, session);
        });
}

fn threshold_slider(ui: &mut Ui, session: &mut Session) {
    ui.strong("Freshness threshold");
    let mut threshold = session.threshold();
    if ui
        .add(egui::Slider::new(&mut threshold, 0.0..=100.0).suffix(" %"))
        .changed()
    {
        session.set_threshold(threshold);
    }
}

fn sample_selector(ui: &mut Ui, session: &mut Session) {
    ui.strong("Sample");
    let current = session
        .selected_sample()
        .map(|s| s.id.clone())
        .unwrap_or_default();
    let mut picked = None;
    egui::ComboBox::from_id_salt("sample_select")
        .selected_text(&current)
        .show_ui(ui, |ui: &mut Ui| {
            for (i, sample) in session.samples().samples().iter().enumerate() {
                if ui
                    .selectable_label(i == session.selected_index(), &sample.id)
                    .clicked()
                {
                    picked = Some(i);
                }
            }
        });
    if let Some(i) = picked {
        if let Err(e) = session.select(i) {
            log::warn!("{e}");
        }
    }
}

fn category_filters(ui: &mut Ui, session: &mut Session) {
    let visible = session.visible_indices().len();
    let total = session.samples().len();

    egui::CollapsingHeader::new(RichText::new(format!("Filters  ({visible}/{total})")).strong())
        .id_salt("filters")
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.label("Spoilage risk");
            for risk in SpoilageRisk::ALL {
                let mut checked = session.filter.risks.contains(&risk);
                let text = RichText::new(risk.as_str()).color(risk_color(risk));
                if ui.checkbox(&mut checked, text).changed() {
                    session.filter.toggle_risk(risk);
                }
            }
            ui.label("Pesticide status");
            for status in PesticideStatus::ALL {
                let mut checked = session.filter.statuses.contains(&status);
                let text = RichText::new(status.as_str()).color(status_color(status));
                if ui.checkbox(&mut checked, text).changed() {
                    session.filter.toggle_status(status);
                }
            }
            if !session.filter.is_unfiltered() && ui.small_button("Show all").clicked() {
                session.filter = Default::default();
            }
        });
}

fn histogram_grouping(ui: &mut Ui, session: &mut Session) {
    ui.strong("Histogram colour");
    let current = session.histogram_group();
    let label = |g: Option<GroupField>| g.map_or("None".to_string(), |g| g.to_string());
    let mut picked = current;
    egui::ComboBox::from_id_salt("histogram_group")
        .selected_text(label(current))
        .show_ui(ui, |ui: &mut Ui| {
            for option in [
                Some(GroupField::SpoilageRisk),
                Some(GroupField::PesticideStatus),
                None,
            ] {
                ui.selectable_value(&mut picked, option, label(option));
            }
        });
    session.set_histogram_group(picked);
}

fn model_summary(ui: &mut Ui, session: &Session) {
    ui.strong("Model");
    match session.model() {
        Ok(model) => {
            ui.label(format!("Ridge, alpha = {}", model.alpha));
            ui.label(format!(
                "R² = {:.3}  RMSE = {:.3}  (in-sample, n = {})",
                model.training_fit.r2, model.training_fit.rmse, model.training_fit.n
            ));
        }
        Err(e) => {
            ui.colored_label(Color32::RED, e.to_string());
        }
    }
    match session.holdout_fit() {
        Some(Ok(fit)) => {
            ui.label(format!("R² = {:.3}  (held out, n = {})", fit.r2, fit.n));
        }
        Some(Err(e)) => {
            ui.colored_label(Color32::RED, format!("Holdout: {e}"));
        }
        None => {}
    }

    ui.add_space(4.0);
    ui.strong("Labelled counts");
    let counts = session.label_counts();
    for (risk, n) in &counts.spoilage_risk {
        ui.colored_label(risk_color(*risk), format!("{risk} risk: {n}"));
    }
    for (status, n) in &counts.pesticide_status {
        ui.colored_label(status_color(*status), format!("{status}: {n}"));
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Demo data").clicked() {
                state.load_synthetic();
                ui.close_menu();
            }
            ui.separator();
            let can_export = state.session.is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Export…"))
                .clicked()
            {
                export_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(session) = &state.session {
            ui.label(format!(
                "{}: {} samples, {} visible",
                session.source(),
                session.samples().len(),
                session.visible_indices().len()
            ));
        }

        ui.separator();

        if ui
            .selectable_label(state.overlay_all, "Overlay visible samples")
            .clicked()
        {
            state.overlay_all = !state.overlay_all;
        }

        if let Some(msg) = &state.status_message {
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                Color32::GRAY
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open spectral data")
        .add_filter("Supported files", &["parquet", "pq", "json", "csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        state.load_path(&path);
    }
}

pub fn export_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export sample table")
        .set_file_name("agrispectral_export.csv")
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet"])
        .save_file();

    if let Some(path) = file {
        state.export(&path);
    }
}
