use eframe::egui::{self, Color32, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use rusty_ecg::data::filter::FilterKind;
use rusty_ecg::data::model::{BeatType, LabelClass};

use crate::color::class_color;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – filter, navigation, verdict, row table
// ---------------------------------------------------------------------------

/// Render the left browsing panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filter");
    ui.separator();

    if !state.is_ready() {
        ui.label("No dataset loaded.");
        return;
    }

    // ---- Filter selector with per-view counts ----
    let mut choice = state.filter;
    for kind in FilterKind::ALL {
        let count = state
            .service
            .context()
            .map(|ctx| ctx.dataset().view(kind).len())
            .unwrap_or(0);
        ui.radio_value(&mut choice, kind, format!("{kind}  ({count})"));
    }
    if choice != state.filter {
        state.set_filter(choice);
    }
    ui.separator();

    // ---- Navigation ----
    let total = state.visible_indices.len();
    ui.horizontal(|ui: &mut Ui| {
        if ui
            .add_enabled(state.position > 0, egui::Button::new("◀ Previous"))
            .clicked()
        {
            state.previous();
        }
        if ui
            .add_enabled(state.position + 1 < total, egui::Button::new("Next ▶"))
            .clicked()
        {
            state.next();
        }
    });
    if total > 0 {
        ui.label(format!("{} / {total}", state.position + 1));
    }
    ui.separator();

    // ---- Verdict card ----
    if let Some(row) = &state.current {
        let pred = &row.prediction;
        ui.strong("Prediction");
        ui.label(
            RichText::new(pred.class_name)
                .size(22.0)
                .strong()
                .color(class_color(pred.class())),
        );
        ui.label(format!("Confidence: {:.1}%", pred.confidence * 100.0));
        ui.label(RichText::new(format!("Raw score: {:.4}", pred.raw_score)).weak());

        ui.add_space(6.0);
        ui.strong("Actual");
        ui.label(
            RichText::new(row.actual_class.name()).color(class_color(row.actual_class)),
        );
        let beat = BeatType::from_label(row.actual_label);
        ui.label(RichText::new(beat.description()).color(state.color_map.color_for(beat)));
        ui.label(format!("Label {:?} (row {})", row.actual_label, row.row_index));

        let correct = pred.matches_label(row.actual_label);
        let (text, color) = if correct {
            ("✔ Correct", class_color(LabelClass::Normal))
        } else {
            ("✘ Incorrect", class_color(LabelClass::Abnormal))
        };
        ui.label(RichText::new(text).color(color));
        ui.separator();
    }

    // ---- Rows of the active view ----
    ui.strong("Rows");
    let mut jump_to: Option<usize> = None;
    if let Ok(ctx) = state.service.context() {
        let dataset = ctx.dataset();
        let current_row = state.current.as_ref().map(|r| r.row_index);
        let indices = &state.visible_indices;

        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::remainder())
            .header(18.0, |mut header| {
                header.col(|ui| {
                    ui.strong("Row");
                });
                header.col(|ui| {
                    ui.strong("Label");
                });
                header.col(|ui| {
                    ui.strong("Class");
                });
            })
            .body(|body| {
                body.rows(18.0, indices.len(), |mut table_row| {
                    let row = indices[table_row.index()];
                    let Ok(sample) = dataset.get(row as i64) else {
                        return;
                    };
                    table_row.col(|ui| {
                        if ui
                            .selectable_label(current_row == Some(row), row.to_string())
                            .clicked()
                        {
                            jump_to = Some(row);
                        }
                    });
                    table_row.col(|ui| {
                        ui.label(format!("{:?}", sample.label));
                    });
                    table_row.col(|ui| {
                        let class = sample.class();
                        ui.label(RichText::new(class.name()).color(class_color(class)))
                            .on_hover_text(sample.beat_type().description());
                    });
                });
            });
    }
    if let Some(row) = jump_to {
        state.jump_to_row(row);
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        let ready = state.is_ready();
        ui.menu_button("File", |ui: &mut Ui| {
            if ui
                .add_enabled(!ready, egui::Button::new("Open dataset…"))
                .clicked()
            {
                open_dataset_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(!ready, egui::Button::new("Choose model…"))
                .clicked()
            {
                open_model_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(info) = &state.info {
            ui.label(format!(
                "{} heartbeats × {} samples, {} visible",
                info.total_rows,
                info.signal_length,
                state.visible_indices.len()
            ));
            ui.label(RichText::new(format!("model: {}", info.model)).weak());
        }

        ui.separator();

        if ui
            .selectable_label(state.show_normalized, "Normalized")
            .clicked()
        {
            state.show_normalized = !state.show_normalized;
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_dataset_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open ECG dataset")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        log::info!("Opening dataset {}", path.display());
        state.set_dataset_path(path);
    }
}

pub fn open_model_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Choose model artifact")
        .add_filter("Model artifact", &["json"])
        .pick_file();

    if let Some(path) = file {
        log::info!("Using model artifact {}", path.display());
        state.set_model_path(path);
    }
}
