use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use rusty_ecg::data::model::{BeatType, LabelClass};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Fixed colours for the binary class, used for verdict badges.
pub fn class_color(class: LabelClass) -> Color32 {
    match class {
        LabelClass::Normal => Color32::from_rgb(56, 161, 105),
        LabelClass::Abnormal => Color32::from_rgb(229, 62, 62),
    }
}

// ---------------------------------------------------------------------------
// Color mapping: beat type → Color32
// ---------------------------------------------------------------------------

/// Maps every beat type to a distinct colour for the signal plot.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<BeatType, Color32>,
    default_color: Color32,
}

impl Default for ColorMap {
    fn default() -> Self {
        let palette = generate_palette(BeatType::ALL.len());
        let mapping: BTreeMap<BeatType, Color32> = BeatType::ALL
            .iter()
            .copied()
            .zip(palette)
            .collect();

        ColorMap {
            mapping,
            default_color: Color32::LIGHT_BLUE,
        }
    }
}

impl ColorMap {
    /// Look up the colour for a given beat type.
    pub fn color_for(&self, beat: BeatType) -> Color32 {
        self.mapping
            .get(&beat)
            .copied()
            .unwrap_or(self.default_color)
    }
}
