use eframe::egui::{self, Color32, RichText, Ui};

use agrispectral::session::Session;

use crate::color::{risk_color, status_color, tier_color};

// ---------------------------------------------------------------------------
// KPI cards for the selected sample
// ---------------------------------------------------------------------------

fn card(ui: &mut Ui, title: &str, value: RichText, caption: &str) {
    egui::Frame::group(ui.style()).show(ui, |ui: &mut Ui| {
        ui.set_min_width(ui.available_width());
        ui.vertical_centered(|ui: &mut Ui| {
            ui.label(RichText::new(title).small());
            ui.label(value.size(26.0).strong());
            ui.label(RichText::new(caption).small().weak());
        });
    });
}

/// Freshness, spoilage risk and pesticide status of the selected sample.
///
/// Risk and status are stored labels and are captioned as such.
pub fn kpi_row(ui: &mut Ui, session: &Session) {
    let Some(sample) = session.selected_sample() else {
        ui.label("No sample selected.");
        return;
    };
    let index = session.selected_index();

    ui.columns(3, |cols| {
        match session.freshness_of(index) {
            Some(f) => {
                let caption = match session.predicted_freshness_of(index) {
                    Some(p) => format!("{}  ·  model estimate {:.0} %", f.tier, p.percent),
                    None => f.tier.to_string(),
                };
                card(
                    &mut cols[0],
                    "Freshness",
                    RichText::new(format!("{:.0} %", f.percent)).color(tier_color(f.tier)),
                    &caption,
                );
            }
            None => card(
                &mut cols[0],
                "Freshness",
                RichText::new("–").color(Color32::GRAY),
                "unavailable",
            ),
        }
        card(
            &mut cols[1],
            "Spoilage risk",
            RichText::new(sample.spoilage_risk.as_str()).color(risk_color(sample.spoilage_risk)),
            "labelled",
        );
        card(
            &mut cols[2],
            "Pesticide status",
            RichText::new(sample.pesticide_status.as_str())
                .color(status_color(sample.pesticide_status)),
            "labelled",
        );
    });

    let tiers = session.tier_counts();
    ui.horizontal(|ui: &mut Ui| {
        ui.label(format!("At {:.0} % threshold:", session.threshold()));
        for (tier, n) in &tiers {
            ui.colored_label(tier_color(*tier), format!("{tier} {n}"));
        }
    });
}
