use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use agrispectral::data::model::{PesticideStatus, SpoilageRisk};
use agrispectral::pipeline::{FreshnessTier, GroupField};

// ---------------------------------------------------------------------------
// Category colours
// ---------------------------------------------------------------------------

const GREEN: Color32 = Color32::from_rgb(0x2E, 0x7D, 0x32);
const AMBER: Color32 = Color32::from_rgb(0xF5, 0xA6, 0x23);
const RED: Color32 = Color32::from_rgb(0xD9, 0x04, 0x29);
const MINT: Color32 = Color32::from_rgb(0x3D, 0xDC, 0x84);

/// Colour used when a histogram has no grouping.
pub const UNGROUPED: Color32 = Color32::from_rgb(0x3D, 0xDC, 0x84);

pub fn tier_color(tier: FreshnessTier) -> Color32 {
    match tier {
        FreshnessTier::Fresh => GREEN,
        FreshnessTier::Moderate => AMBER,
        FreshnessTier::Low => RED,
    }
}

pub fn risk_color(risk: SpoilageRisk) -> Color32 {
    match risk {
        SpoilageRisk::Low => GREEN,
        SpoilageRisk::Medium => AMBER,
        SpoilageRisk::High => RED,
    }
}

pub fn status_color(status: PesticideStatus) -> Color32 {
    match status {
        PesticideStatus::Pure => MINT,
        PesticideStatus::Fungicide => AMBER,
        PesticideStatus::Insecticide => RED,
    }
}

/// Colour of a histogram group, looked up by its label.
pub fn group_color(group_by: Option<GroupField>, label: &str) -> Color32 {
    match group_by {
        Some(GroupField::SpoilageRisk) => label.parse().map_or(Color32::GRAY, risk_color),
        Some(GroupField::PesticideStatus) => label.parse().map_or(Color32::GRAY, status_color),
        None => UNGROUPED,
    }
}

// ---------------------------------------------------------------------------
// Continuous scale
// ---------------------------------------------------------------------------

fn hsl_to_color32(hsl: Hsl) -> Color32 {
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0).round() as u8,
        (rgb.green * 255.0).round() as u8,
        (rgb.blue * 255.0).round() as u8,
    )
}

/// Blue → green → yellow ramp over `value` in `[min, max]`.
///
/// Values outside the range are clamped; a degenerate range maps to the
/// middle of the ramp.
pub fn gradient(value: f64, min: f64, max: f64) -> Color32 {
    let t = if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    let hue = 250.0 - 190.0 * t as f32;
    hsl_to_color32(Hsl::new(hue, 0.7, 0.45 + 0.1 * t as f32))
}
