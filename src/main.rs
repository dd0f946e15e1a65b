mod domain;
mod infrastructure;
mod presentation;

use eframe::egui;
use infrastructure::logging::{self, LogConfig};
use tracing::info;

fn main() -> Result<(), eframe::Error> {
    let _logging_guard = logging::init(&LogConfig::default())
        .map_err(|e| eprintln!("Failed to initialize logging: {e}"))
        .ok();

    info!("Starting Pokeball Plus Monitor");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([500.0, 400.0])
            .with_title("Pokeball Plus Monitor"),
        ..Default::default()
    };

    eframe::run_native(
        "Pokeball Plus Monitor",
        options,
        Box::new(|cc| Ok(Box::new(presentation::app::PokeballApp::new(cc)))),
    )
}
