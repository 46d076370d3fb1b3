//! Dark translucent theme for the floating panel.

use eframe::{egui, epaint};

/// Apply the panel theme. Fills are transparent so only painted shapes show.
pub fn set_panel_style(ctx: &egui::Context) {
    use egui::Visuals;

    let mut visuals = Visuals::dark();
    visuals.window_fill = epaint::Color32::TRANSPARENT;
    visuals.panel_fill = epaint::Color32::TRANSPARENT;
    visuals.widgets.active.bg_fill = epaint::Color32::from_rgb(0, 122, 255);
    visuals.widgets.active.fg_stroke = epaint::Stroke::new(1.0, epaint::Color32::WHITE);
    visuals.widgets.hovered.bg_fill = epaint::Color32::from_white_alpha(24);
    ctx.set_visuals(visuals);

    let mut style = (*ctx.style()).clone();
    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.interaction.tooltip_delay = 0.6;
    ctx.set_style(style);
}
