use eframe::egui::Ui;
use egui_plot::{Line, Plot, PlotPoints};

use rusty_ecg::data::model::BeatType;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Signal plot (central panel)
// ---------------------------------------------------------------------------

/// Render the heartbeat of the current row in the central panel.
pub fn signal_plot(ui: &mut Ui, state: &AppState) {
    let (Some(row), Some(signal)) = (&state.current, state.plotted_signal()) else {
        ui.centered_and_justified(|ui: &mut Ui| {
            if state.is_ready() {
                ui.heading("No samples in this view");
            } else {
                ui.heading("Open a dataset to view heartbeats  (File → Open dataset…)");
            }
        });
        return;
    };

    let beat = BeatType::from_label(row.actual_label);
    let color = state.color_map.color_for(beat);
    let name = format!("row {} – {beat}", row.row_index);

    let y_label = if state.show_normalized {
        "Normalized amplitude"
    } else {
        "Amplitude"
    };

    Plot::new("signal_plot")
        .legend(egui_plot::Legend::default())
        .x_axis_label("Time (samples)")
        .y_axis_label(y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            let points: PlotPoints = signal
                .iter()
                .enumerate()
                .map(|(i, &v)| [i as f64, v])
                .collect();

            let line = Line::new(points)
                .name(&name)
                .color(color)
                .width(2.0);

            plot_ui.line(line);
        });
}
