use eframe::egui;
use eframe::epaint::Color32;

use crate::config::DropAction;
use crate::directory::ProcessEnumerator;
use crate::panel::{PanelController, PanelHost};

/// Render the hint line under the ring: the last action result, or usage help.
pub fn show<H: PanelHost, E: ProcessEnumerator>(
    ctx: &egui::Context,
    panel: &PanelController<H, E>,
    welcome: bool,
) {
    egui::TopBottomPanel::bottom("hint")
        .frame(egui::Frame::NONE)
        .resizable(false)
        .show_separator_line(false)
        .show(ctx, |ui| {
            ui.set_height(32.0);
            let settings = panel.settings();
            let symbol = settings.trigger_modifier.symbol();

            let text = if let Some(status) = panel.status() {
                status.to_string()
            } else if welcome {
                format!("Welcome to Orbit. Hold {symbol} anywhere to bring up your apps.")
            } else {
                let verb = match settings.drop_action {
                    DropAction::Terminate => "quit",
                    DropAction::Activate => "switch to",
                };
                format!(
                    "{} apps  •  release {symbol} to switch  •  drag into the center to {verb}",
                    panel.cards().len()
                )
            };

            ui.centered_and_justified(|ui| {
                ui.label(
                    egui::RichText::new(text)
                        .color(Color32::from_gray(220))
                        .size(12.0),
                );
            });
        });
}
