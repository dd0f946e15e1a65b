use crate::domain::models::{
    AppEvent, DeviceInfo, MessageSeverity, SessionCommand, SessionState, StatusMessage,
};
use crate::infrastructure::bluetooth::{BtleplugCentral, SessionDriver};
use crate::presentation::components::Components;
use eframe::egui;
use tokio::sync::mpsc;
use tracing::error;

/// One console entry, kept for the lifetime of the window.
struct ConsoleLine {
    text: String,
    severity: MessageSeverity,
}

pub struct PokeballApp {
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: mpsc::UnboundedReceiver<AppEvent>,
    session_state: SessionState,
    device_info: Option<DeviceInfo>,
    console: Vec<ConsoleLine>,
}

impl PokeballApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        crate::presentation::theme::configure(&cc.egui_ctx);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        // The session driver gets its own thread and runtime so BLE waits
        // never touch the UI loop.
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create tokio runtime for the session driver");

            rt.block_on(async move {
                let central = match BtleplugCentral::new().await {
                    Ok(central) => central,
                    Err(e) => {
                        error!("Bluetooth unavailable: {e}");
                        let _ = event_tx.send(AppEvent::Log(StatusMessage {
                            message: format!("Bluetooth unavailable: {e}"),
                            severity: MessageSeverity::Error,
                        }));
                        return;
                    }
                };
                SessionDriver::new(central, event_tx).run(cmd_rx).await;
            });
        });

        Self {
            commands: cmd_tx,
            events: event_rx,
            session_state: SessionState::Idle,
            device_info: None,
            console: Vec::new(),
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Log(message) => self.console.push(ConsoleLine {
                text: message.message,
                severity: message.severity,
            }),
            AppEvent::State(state) => {
                match &state {
                    SessionState::Scanning => self.device_info = None,
                    SessionState::Connected(info) => self.device_info = Some(info.clone()),
                    _ => {}
                }
                self.session_state = state;
            }
        }
    }

    fn ui_controls(&mut self, ui: &mut egui::Ui) {
        let start_allowed = self.session_state.allows_start();

        ui.horizontal(|ui| {
            if ui
                .add_enabled(start_allowed, egui::Button::new("Connect to Pokeball"))
                .clicked()
            {
                let _ = self.commands.send(SessionCommand::Start);
            }
            if ui
                .add_enabled(!start_allowed, egui::Button::new("Stop"))
                .clicked()
            {
                let _ = self.commands.send(SessionCommand::Stop);
            }
            if matches!(
                self.session_state,
                SessionState::Scanning | SessionState::Connecting
            ) {
                ui.spinner();
            }
        });
    }

    fn ui_state_banner(&self, ui: &mut egui::Ui) {
        let (text, bg, fg) = match &self.session_state {
            SessionState::Idle => ("IDLE", egui::Color32::from_gray(100), egui::Color32::WHITE),
            SessionState::Scanning => (
                "SCANNING...",
                egui::Color32::from_rgb(255, 200, 0),
                egui::Color32::BLACK,
            ),
            SessionState::Connecting => (
                "CONNECTING...",
                egui::Color32::from_rgb(255, 200, 0),
                egui::Color32::BLACK,
            ),
            SessionState::Connected(_) => (
                "CONNECTED",
                egui::Color32::from_rgb(0, 200, 0),
                egui::Color32::BLACK,
            ),
            SessionState::Listening => (
                "LISTENING",
                egui::Color32::from_rgb(0, 200, 0),
                egui::Color32::BLACK,
            ),
            SessionState::Error => (
                "ERROR",
                egui::Color32::from_rgb(255, 50, 50),
                egui::Color32::WHITE,
            ),
        };
        Components::status_banner(ui, text, bg, fg);
    }

    fn ui_device_panel(&self, ui: &mut egui::Ui) {
        if let Some(info) = &self.device_info {
            Components::card(ui, "Device", |ui| {
                egui::Grid::new("device_grid")
                    .spacing([30.0, 4.0])
                    .show(ui, |ui| {
                        ui.label("Manufacturer:");
                        ui.label(&info.manufacturer);
                        ui.end_row();

                        ui.label("Software revision:");
                        ui.label(&info.software_revision);
                        ui.end_row();

                        ui.label("Battery:");
                        ui.label(format!("{}%", info.battery_percent));
                        ui.end_row();
                    });
            });
            ui.add_space(8.0);
        }
    }

    fn ui_console(&self, ui: &mut egui::Ui) {
        Components::card(ui, "Pokeball status console", |ui| {
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink(false)
                .show(ui, |ui| {
                    for line in &self.console {
                        ui.label(
                            egui::RichText::new(&line.text)
                                .monospace()
                                .color(Components::severity_color(line.severity)),
                        );
                    }
                });
        });
    }
}

impl eframe::App for PokeballApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.events.try_recv() {
            self.apply_event(event);
        }
        ctx.request_repaint();

        egui::TopBottomPanel::bottom("controls")
            .show(ctx, |ui| {
                ui.add_space(4.0);
                self.ui_controls(ui);
                ui.add_space(4.0);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Pokeball Plus Monitor");
            ui.add_space(6.0);
            self.ui_state_banner(ui);
            ui.add_space(8.0);
            self.ui_device_panel(ui);
            self.ui_console(ui);
        });
    }
}
