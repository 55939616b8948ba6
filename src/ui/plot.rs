use eframe::egui::{Color32, RichText, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};

use agrispectral::session::Session;

use crate::color::{gradient, group_color, tier_color};

const CHART_HEIGHT: f32 = 260.0;

fn unavailable(ui: &mut Ui, message: impl std::fmt::Display) {
    ui.label(RichText::new(format!("Unavailable: {message}")).color(Color32::GRAY));
}

// ---------------------------------------------------------------------------
// Spectral signature
// ---------------------------------------------------------------------------

/// Band readings against band centers. The selected sample is drawn on top,
/// coloured by its freshness tier.
pub fn spectral_plot(ui: &mut Ui, session: &Session, overlay_all: bool) {
    let set = session.samples();
    let centers = set.schema().centers();
    let selected = session.selected_index();

    Plot::new("spectral_plot")
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .x_axis_label("Wavelength (nm)")
        .y_axis_label("Reflectance (%)")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            if overlay_all {
                for idx in session.visible_indices() {
                    if idx == selected {
                        continue;
                    }
                    let sample = &set.samples()[idx];
                    let points: PlotPoints = centers
                        .iter()
                        .zip(&sample.bands)
                        .map(|(&x, &y)| [x, y])
                        .collect();
                    plot_ui.line(
                        Line::new(points)
                            .color(Color32::from_gray(140).gamma_multiply(0.4))
                            .width(1.0),
                    );
                }
            }

            if let Some(sample) = session.selected_sample() {
                let color = session
                    .freshness_of(selected)
                    .map_or(Color32::LIGHT_BLUE, |f| tier_color(f.tier));
                let points: PlotPoints = centers
                    .iter()
                    .zip(&sample.bands)
                    .map(|(&x, &y)| [x, y])
                    .collect();
                plot_ui.line(Line::new(points).name(&sample.id).color(color).width(2.5));
            }
        });
}

// ---------------------------------------------------------------------------
// Regression: measured vs predicted
// ---------------------------------------------------------------------------

pub fn regression_plot(ui: &mut Ui, session: &Session) {
    let model = match session.model() {
        Ok(m) => m,
        Err(e) => return unavailable(ui, e),
    };
    let Some(predictions) = session.predictions() else {
        return unavailable(ui, "no predictions");
    };
    ui.label(format!(
        "R² = {:.3}  RMSE = {:.3}",
        model.training_fit.r2, model.training_fit.rmse
    ));

    let samples = session.samples().samples();
    let (lo, hi) = samples
        .iter()
        .map(|s| s.dry_matter)
        .chain(predictions.iter().copied())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    let points: PlotPoints = session
        .visible_indices()
        .into_iter()
        .map(|i| [samples[i].dry_matter, predictions[i]])
        .collect();

    Plot::new("regression_plot")
        .height(CHART_HEIGHT)
        .x_axis_label("Measured dry matter")
        .y_axis_label("Predicted dry matter")
        .data_aspect(1.0)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(PlotPoints::new(vec![[lo, lo], [hi, hi]]))
                    .color(Color32::GRAY)
                    .style(egui_plot::LineStyle::dashed_loose()),
            );
            plot_ui.points(Points::new(points).radius(3.0).color(Color32::LIGHT_GREEN));
        });
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Stacked dry-matter histogram, one bar series per group.
pub fn histogram_plot(ui: &mut Ui, session: &Session) {
    let hist = match session.histogram() {
        Ok(h) => h,
        Err(e) => return unavailable(ui, e),
    };
    let centers = hist.bin_centers();
    let width = hist.bin_width() * 0.95;

    let mut charts: Vec<BarChart> = Vec::with_capacity(hist.groups.len());
    for group in &hist.groups {
        let bars: Vec<Bar> = centers
            .iter()
            .zip(&group.counts)
            .map(|(&x, &n)| Bar::new(x, n as f64).width(width))
            .collect();
        let mut chart = BarChart::new(bars)
            .name(&group.label)
            .color(group_color(hist.group_by, &group.label));
        if !charts.is_empty() {
            let below: Vec<&BarChart> = charts.iter().collect();
            chart = chart.stack_on(&below);
        }
        charts.push(chart);
    }

    Plot::new("histogram_plot")
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .x_axis_label(hist.field.to_string())
        .y_axis_label("Samples")
        .allow_drag(false)
        .show(ui, |plot_ui| {
            for chart in charts {
                plot_ui.bar_chart(chart);
            }
        });
}

// ---------------------------------------------------------------------------
// PCA scatter
// ---------------------------------------------------------------------------

/// First two principal components, coloured by dry matter.
pub fn pca_plot(ui: &mut Ui, session: &Session) {
    let projection = match session.projection() {
        Ok(p) => p,
        Err(e) => return unavailable(ui, e),
    };
    if projection.components() < 2 {
        return unavailable(ui, "fewer than two components");
    }
    let ratios: Vec<String> = projection
        .explained_variance_ratio
        .iter()
        .enumerate()
        .map(|(i, r)| format!("PC{} {:.1} %", i + 1, r * 100.0))
        .collect();
    ui.label(format!("Explained variance: {}", ratios.join(", ")));

    let samples = session.samples().samples();
    let (lo, hi) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s.dry_matter), hi.max(s.dry_matter))
    });

    Plot::new("pca_plot")
        .height(CHART_HEIGHT)
        .x_axis_label("PC1")
        .y_axis_label("PC2")
        .show(ui, |plot_ui| {
            for i in session.visible_indices() {
                let row = &projection.coordinates[i];
                plot_ui.points(
                    Points::new(PlotPoints::new(vec![[row[0], row[1]]]))
                        .radius(4.0)
                        .color(gradient(samples[i].dry_matter, lo, hi)),
                );
            }
        });
}
