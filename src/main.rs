//! Entry point for the Moodwave desktop app.

use eframe::egui;
use moodwave::config;
use moodwave::egui_app::controller::EguiController;
use moodwave::egui_app::ui::EguiApp;
use moodwave::logging;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let config = match config::load_or_default() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Falling back to default config: {err}");
            config::AppConfig::default()
        }
    };
    if let Err(err) = config.validate() {
        tracing::error!("Invalid config: {err}");
        return Err(Box::new(err));
    }

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size(egui::vec2(900.0, 720.0))
        .with_min_inner_size(egui::vec2(640.0, 480.0));
    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "Moodwave",
        native_options,
        Box::new(move |cc| {
            let controller = EguiController::new(config);
            Ok(Box::new(EguiApp::new(cc, controller)))
        }),
    )?;
    Ok(())
}
