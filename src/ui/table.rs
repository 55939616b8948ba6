use eframe::egui::{RichText, Ui};
use egui_extras::{Column, TableBuilder};

use agrispectral::session::Session;

use crate::color::{risk_color, status_color, tier_color};

// ---------------------------------------------------------------------------
// Sample table (visible samples only)
// ---------------------------------------------------------------------------

const HEADERS: [&str; 6] = [
    "Sample",
    "Dry matter",
    "Predicted",
    "Freshness",
    "Spoilage risk",
    "Pesticide",
];

/// One row per visible sample. Clicking a sample id selects it.
pub fn sample_table(ui: &mut Ui, session: &mut Session) {
    let visible = session.visible_indices();
    let selected = session.selected_index();
    let mut clicked = None;

    TableBuilder::new(ui)
        .id_salt("sample_table")
        .striped(true)
        .resizable(true)
        .max_scroll_height(320.0)
        .column(Column::auto().at_least(90.0))
        .columns(Column::auto().at_least(80.0), HEADERS.len() - 1)
        .header(20.0, |mut header| {
            for title in HEADERS {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, visible.len(), |mut row| {
                let i = visible[row.index()];
                let sample = &session.samples().samples()[i];
                row.col(|ui| {
                    if ui.selectable_label(i == selected, &sample.id).clicked() {
                        clicked = Some(i);
                    }
                });
                row.col(|ui| {
                    ui.label(format!("{:.2}", sample.dry_matter));
                });
                row.col(|ui| {
                    let text = session
                        .predictions()
                        .map_or("–".to_string(), |p| format!("{:.2}", p[i]));
                    ui.label(text);
                });
                row.col(|ui| {
                    if let Some(f) = session.freshness_of(i) {
                        ui.label(
                            RichText::new(format!("{:.0} % {}", f.percent, f.tier))
                                .color(tier_color(f.tier)),
                        );
                    }
                });
                row.col(|ui| {
                    ui.label(
                        RichText::new(sample.spoilage_risk.as_str())
                            .color(risk_color(sample.spoilage_risk)),
                    );
                });
                row.col(|ui| {
                    ui.label(
                        RichText::new(sample.pesticide_status.as_str())
                            .color(status_color(sample.pesticide_status)),
                    );
                });
            });
        });

    if let Some(i) = clicked {
        if let Err(e) = session.select(i) {
            log::warn!("{e}");
        }
    }
}
