mod app;
mod color;
mod state;
mod ui;

use app::RustyEcgApp;
use eframe::egui;
use rusty_ecg::config::ServiceConfig;

fn main() -> eframe::Result {
    env_logger::init();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty ECG – Heartbeat Classifier",
        options,
        Box::new(|_cc| Ok(Box::new(RustyEcgApp::new(config)))),
    )
}
