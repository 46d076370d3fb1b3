//! Egui-based UI for Orbit.
//!
//! This module defines the eframe App, the viewport host the panel controller
//! drives, and wires modifier and file-drag input into the controller.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use eframe::{App, egui};
use eframe::egui::{Pos2, Rect, Vec2, ViewportCommand, pos2};
use tracing::{debug, warn};

use crate::config::ConfigStore;
use crate::directory::{RunningAppDirectory, SystemEnumerator};
use crate::osx;
use crate::panel::{PanelController, PanelHost, Waker};
use crate::process::ProcessLifecycleManager;
use crate::style::set_panel_style;
use crate::trigger::TriggerEvent;
use crate::types::FileDragState;
use crate::ui::card::IconTextures;

mod card;
mod panels;
pub mod tasks;

use tasks::{InputEvent, WatcherCommand};

pub const PANEL_SIZE: f32 = 560.0;

/// Shows and hides the native window around the pointer.
pub struct ViewportHost {
    ctx: egui::Context,
    size: Vec2,
}

impl PanelHost for ViewportHost {
    fn show(&mut self, at: Pos2) {
        self.ctx
            .send_viewport_cmd(ViewportCommand::OuterPosition(at - self.size * 0.5));
        self.ctx.send_viewport_cmd(ViewportCommand::Visible(true));
        self.ctx.send_viewport_cmd(ViewportCommand::Focus);
        self.ctx.request_repaint();
    }

    fn hide(&mut self, _activate_selected: bool) {
        self.ctx.send_viewport_cmd(ViewportCommand::Visible(false));
    }

    fn dismiss_immediately(&mut self) {
        self.ctx.send_viewport_cmd(ViewportCommand::Visible(false));
    }
}

/// Main eframe application that renders the panel and routes input to it.
pub struct OrbitApp {
    panel: PanelController<ViewportHost, SystemEnumerator>,
    icons: IconTextures,
    config: ConfigStore,
    input_rx: Receiver<InputEvent>,
    watcher_tx: Sender<WatcherCommand>,
    focused: bool,
    welcome: bool,
}

impl OrbitApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: ConfigStore) -> Self {
        // the app delegate has finished launching here, so the policy sticks
        osx::set_accessory_policy();
        let ctx = cc.egui_ctx.clone();
        set_panel_style(&ctx);

        let settings = config.settings().clone();
        let (input_rx, watcher_tx) = tasks::spawn_trigger_watcher(
            ctx.clone(),
            settings.trigger_modifier,
            settings.long_press_threshold(),
        );

        let wake_ctx = ctx.clone();
        let wake: Waker = Arc::new(move || wake_ctx.request_repaint());
        let host = ViewportHost {
            ctx,
            size: Vec2::splat(PANEL_SIZE),
        };
        let directory = RunningAppDirectory::new(SystemEnumerator, std::process::id());
        let panel = PanelController::new(
            host,
            directory,
            ProcessLifecycleManager::system(),
            settings,
            wake,
        );

        Self {
            panel,
            icons: IconTextures::default(),
            config,
            input_rx,
            watcher_tx,
            focused: false,
            welcome: false,
        }
    }

    fn handle_input(&mut self) {
        while let Ok(InputEvent::Trigger { event, pointer }) = self.input_rx.try_recv() {
            if event == TriggerEvent::Open {
                self.refresh_settings();
            }
            self.panel.handle_trigger(event, pointer);
        }
    }

    /// Pick up edits made to the config file since the last open.
    fn refresh_settings(&mut self) {
        if self.config.reload_if_changed() {
            let settings = self.config.settings().clone();
            let _ = self.watcher_tx.send(WatcherCommand::Configure {
                modifier: settings.trigger_modifier,
                threshold: settings.long_press_threshold(),
            });
            self.panel.apply_settings(settings);
        }

        if !self.config.settings().has_seen_welcome {
            self.welcome = true;
            let mut settings = self.config.settings().clone();
            settings.has_seen_welcome = true;
            if let Err(e) = self.config.update(settings) {
                warn!("Could not record welcome as seen: {}", e);
            }
        } else {
            self.welcome = false;
        }
    }

    fn handle_focus(&mut self, ctx: &egui::Context) {
        let focused = ctx.input(|i| i.viewport().focused).unwrap_or(self.focused);
        if self.focused && !focused {
            debug!("panel lost focus");
            self.panel.focus_lost();
        }
        self.focused = focused;
    }

    fn handle_file_drag(&mut self, ctx: &egui::Context, now: Instant) {
        let (hovered, dropped, window) = ctx.input(|i| {
            let hovered: Vec<PathBuf> = i.raw.hovered_files.iter().filter_map(|f| f.path.clone()).collect();
            let dropped: Vec<PathBuf> = i.raw.dropped_files.iter().filter_map(|f| f.path.clone()).collect();
            let viewport = i.viewport();
            (hovered, dropped, viewport.inner_rect.or(viewport.outer_rect))
        });
        if hovered.is_empty() && dropped.is_empty() && !self.panel.file_state().has_files() {
            return;
        }
        // no cursor events reach the window during an external drag
        let (x, y) = osx::mouse_location();
        let pointer = window_local(pos2(x, y), window);

        if !hovered.is_empty() {
            if matches!(self.panel.file_state(), FileDragState::Idle) {
                self.panel.files_hovering(hovered);
            }
            if let Some(pos) = pointer {
                self.panel.files_pointer(pos, now);
            }
        } else if !dropped.is_empty() {
            if matches!(self.panel.file_state(), FileDragState::Idle) {
                self.panel.files_hovering(dropped);
                if let Some(pos) = pointer {
                    self.panel.files_pointer(pos, now);
                }
            }
            self.panel.files_dropped();
        } else if self.panel.file_state().has_files() {
            self.panel.files_left();
        }
    }
}

/// Global top-left based screen point to a point inside the window, if the
/// window position is known.
fn window_local(global: Pos2, window: Option<Rect>) -> Option<Pos2> {
    window.map(|rect| global - rect.min.to_vec2())
}

/// Egui frame update: input, controller bookkeeping, then layout.
impl App for OrbitApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let was_visible = self.panel.is_visible();

        self.handle_input();
        if self.panel.is_visible() {
            self.handle_focus(ctx);
            self.handle_file_drag(ctx, now);
            if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
                self.panel.dismiss();
            }
        }

        self.panel.frame(now);

        if self.panel.is_visible() {
            panels::bottom::show(ctx, &self.panel, self.welcome);
            panels::central::show(ctx, &mut self.panel, &mut self.icons, now);
            // keep animations and dwell timers moving while shown
            ctx.request_repaint_after(Duration::from_millis(16));
        } else {
            self.focused = false;
        }

        if was_visible && !self.panel.is_visible() {
            let _ = self.watcher_tx.send(WatcherCommand::PanelClosed);
        }
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::vec2;
    use pretty_assertions::assert_eq;

    #[test]
    fn global_pointer_is_made_window_relative() {
        let window = Rect::from_min_size(pos2(300.0, 120.0), vec2(PANEL_SIZE, PANEL_SIZE));
        assert_eq!(window_local(pos2(580.0, 400.0), Some(window)), Some(pos2(280.0, 280.0)));
        // outside the window stays outside
        assert_eq!(window_local(pos2(10.0, 10.0), Some(window)), Some(pos2(-290.0, -110.0)));
        assert_eq!(window_local(pos2(580.0, 400.0), None), None);
    }
}
