//! AIr-Cooled Answers desktop client: application entry.

mod app;

use eframe::egui;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 780.0])
            .with_min_inner_size([720.0, 520.0]),
        ..Default::default()
    };
    eframe::run_native(
        "AIr-Cooled Answers",
        options,
        Box::new(|cc| Box::new(app::AirCooledApp::new(cc))),
    )
}
