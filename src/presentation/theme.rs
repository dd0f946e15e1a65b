//! Visual style for the monitor window. Applied once at startup; there
//! is no runtime theme switching.

use eframe::egui;

pub struct ConsolePalette {
    pub bg: egui::Color32,
    pub fg: egui::Color32,
    pub stroke: egui::Color32,
    pub accent: egui::Color32,
}

impl ConsolePalette {
    pub fn new() -> Self {
        Self {
            bg: egui::Color32::from_rgb(20, 22, 28),
            fg: egui::Color32::from_rgb(220, 222, 228),
            stroke: egui::Color32::from_rgb(90, 95, 110),
            accent: egui::Color32::from_rgb(230, 60, 80),
        }
    }
}

pub fn configure(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    let palette = ConsolePalette::new();

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 22.0,
                egui::TextStyle::Body => 14.0,
                egui::TextStyle::Button => 15.0,
                egui::TextStyle::Monospace => 13.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(8.0, 8.0);
    style.spacing.button_padding = egui::vec2(14.0, 8.0);

    style.visuals.dark_mode = true;
    style.visuals.panel_fill = palette.bg;
    style.visuals.window_fill = palette.bg;
    style.visuals.override_text_color = Some(palette.fg);

    style.visuals.widgets.noninteractive.bg_fill = palette.bg;
    style.visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.0, palette.stroke);
    style.visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(35, 38, 46);
    style.visuals.widgets.inactive.bg_stroke = egui::Stroke::new(1.0, palette.stroke);
    style.visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(50, 54, 64);
    style.visuals.widgets.active.bg_fill = palette.accent;
    style.visuals.selection.bg_fill = palette.accent;

    ctx.set_style(style);
}
