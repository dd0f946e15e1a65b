use crate::domain::models::MessageSeverity;
use eframe::egui;

pub struct Components;

impl Components {
    /// Framed section with a bold title, the basic building block of the
    /// window.
    pub fn card<R>(
        ui: &mut egui::Ui,
        title: &str,
        add_contents: impl FnOnce(&mut egui::Ui) -> R,
    ) -> R {
        let stroke = ui.style().visuals.widgets.noninteractive.bg_stroke;

        egui::Frame::none()
            .inner_margin(egui::Margin::same(10.0))
            .stroke(stroke)
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.label(egui::RichText::new(title).strong().size(16.0));
                    ui.add_space(6.0);
                    add_contents(ui)
                })
                .inner
            })
            .inner
    }

    /// Full-width banner showing the session state.
    pub fn status_banner(
        ui: &mut egui::Ui,
        text: &str,
        bg_color: egui::Color32,
        text_color: egui::Color32,
    ) {
        ui.add_sized(
            [ui.available_width(), 28.0],
            egui::Label::new(
                egui::RichText::new(text)
                    .color(text_color)
                    .background_color(bg_color)
                    .strong(),
            )
            .wrap_mode(egui::TextWrapMode::Extend),
        );
    }

    pub fn severity_color(severity: MessageSeverity) -> egui::Color32 {
        match severity {
            MessageSeverity::Info => egui::Color32::from_gray(200),
            MessageSeverity::Success => egui::Color32::from_rgb(0, 200, 100),
            MessageSeverity::Warning => egui::Color32::from_rgb(230, 180, 0),
            MessageSeverity::Error => egui::Color32::from_rgb(255, 80, 80),
        }
    }
}
