use std::f32::consts::{FRAC_PI_2, TAU};
use std::time::Instant;

use eframe::egui;
use eframe::epaint::{Color32, CornerRadius, FontId, Stroke, StrokeKind};
use eframe::egui::{Align2, Painter, Pos2, Rect, Vec2, vec2};

use crate::directory::ProcessEnumerator;
use crate::dissolve::card_opacity;
use crate::drag::DragGeometry;
use crate::file_drop::DropZone;
use crate::panel::{PanelController, PanelHost};
use crate::types::{CardDragState, IndicatorState};
use crate::ui::card::{self, CardLook, IconTextures};

const CARD_GAP: f32 = 14.0;

/// Render the card ring around the black hole and feed pointer input to the panel.
pub fn show<H: PanelHost, E: ProcessEnumerator>(
    ctx: &egui::Context,
    panel: &mut PanelController<H, E>,
    icons: &mut IconTextures,
    now: Instant,
) {
    icons.sync(ctx, panel.cards());

    egui::CentralPanel::default()
        .frame(egui::Frame::NONE)
        .show(ctx, |ui| {
            let settings = panel.settings().clone();
            let area = ui.max_rect();
            let center = area.center();
            let size = settings.card_size.points();
            let hole_radius = size * 0.5;

            let zone = DropZone {
                indicator: Rect::from_center_size(center, Vec2::splat(size * 2.6)),
                target_center: center,
                target_radius: hole_radius,
            };
            panel.set_drop_zone(zone);

            let count = panel.cards().len();
            let ring_radius = ring_radius(count, size, area);
            let painter = ui.painter().clone();

            painter.circle_filled(
                center,
                ring_radius + size * 0.75,
                Color32::from_rgba_unmultiplied(16, 16, 20, settings.card_material.fill_alpha()),
            );
            paint_black_hole(&painter, center, hole_radius, panel.drag_state());
            paint_indicator(
                &painter,
                zone,
                panel.indicator_state(),
                panel.morph_fraction(now),
                panel.file_state().files().len(),
            );

            if count == 0 {
                painter.text(
                    center + vec2(0.0, hole_radius + 24.0),
                    Align2::CENTER_CENTER,
                    "No other apps running",
                    FontId::proportional(13.0),
                    Color32::from_gray(170),
                );
                return;
            }

            let cards = panel.cards().to_vec();
            let drag_state = panel.drag_state();
            let shake = panel.shake_offset(now);
            let mut hovered = None;
            let mut clicked = None;

            for (i, app) in cards.iter().enumerate() {
                let angle = -FRAC_PI_2 + TAU * i as f32 / count as f32;
                let home = center + vec2(angle.cos(), angle.sin()) * ring_radius;
                let active = panel.is_card_active(&app.id);

                let (offset, opacity) = if active {
                    let opacity = match drag_state {
                        CardDragState::Dissolving(_) => card_opacity(panel.dissolve_progress()),
                        _ => 1.0,
                    };
                    (drag_state.offset() + shake, opacity)
                } else {
                    (Vec2::ZERO, 1.0)
                };

                let look = CardLook {
                    size,
                    fill_alpha: settings.card_material.fill_alpha(),
                    hovered: panel.hovered() == Some(app.id.as_str()),
                    opacity,
                    icon: icons.get(&app.id),
                };
                let response = card::card(ui, app, home + offset, look);

                if active && matches!(drag_state, CardDragState::Dissolving(_)) {
                    let origin = home + offset - Vec2::splat(size * 0.5);
                    card::particles(ui, origin, panel.particles(), panel.dissolve_progress());
                }

                if response.hovered() {
                    hovered = Some(app.id.clone());
                }
                if response.drag_started() {
                    panel.card_pointer_down(
                        &app.id,
                        DragGeometry {
                            card_center: home,
                            target_center: center,
                            near_radius: settings.near_target_radius,
                        },
                    );
                }
                if active && drag_state.is_dragging() && response.dragged() {
                    panel.card_pointer_move(response.drag_delta(), now);
                }
                if response.drag_stopped() {
                    panel.card_pointer_up();
                }
                if response.clicked() {
                    clicked = Some(app.id.clone());
                }
            }

            if drag_state.is_idle() {
                panel.set_hovered(hovered);
            }
            if let Some(id) = clicked {
                panel.set_hovered(Some(id));
                panel.close(true);
            }
        });
}

/// Ring large enough for every card, clamped to the window.
fn ring_radius(count: usize, size: f32, area: Rect) -> f32 {
    let wanted = count as f32 * (size + CARD_GAP) / TAU;
    let max = area.width().min(area.height()) * 0.5 - size * 0.75;
    wanted.max(size * 1.8).min(max.max(size))
}

fn paint_black_hole(painter: &Painter, center: Pos2, radius: f32, state: CardDragState) {
    let grow = match state {
        CardDragState::NearTarget(_) | CardDragState::ReleasedInTarget(_) => 1.25,
        _ => 1.0,
    };
    let r = radius * grow;
    painter.circle_filled(center, r * 1.35, Color32::from_rgba_unmultiplied(90, 60, 160, 40));
    painter.circle_filled(center, r * 1.15, Color32::from_rgba_unmultiplied(60, 40, 120, 90));
    painter.circle_filled(center, r, Color32::BLACK);
    painter.circle_stroke(center, r, Stroke::new(1.5, Color32::from_rgb(140, 110, 230)));
}

fn paint_indicator(painter: &Painter, zone: DropZone, state: IndicatorState, morph: f32, files: usize) {
    if state == IndicatorState::Hidden {
        return;
    }
    let circle = Rect::from_center_size(zone.target_center, Vec2::splat(zone.target_radius * 2.0));
    let rect = lerp_rect(zone.indicator, circle, morph);
    let corner = egui::lerp(16.0..=zone.target_radius, morph);
    let color = Color32::from_rgb(0, 122, 255).lerp_to_gamma(Color32::from_rgb(230, 70, 70), morph);

    painter.rect_filled(rect, CornerRadius::same(corner as u8), color.gamma_multiply(0.18));
    painter.rect_stroke(
        rect,
        CornerRadius::same(corner as u8),
        Stroke::new(2.0, color),
        StrokeKind::Inside,
    );

    let label = match state {
        IndicatorState::IndicatorShown => format!("Drop {files} file(s) to share"),
        _ => "Release to move to Trash".to_string(),
    };
    painter.text(
        zone.indicator.center_bottom() + vec2(0.0, 14.0),
        Align2::CENTER_CENTER,
        label,
        FontId::proportional(12.0),
        Color32::from_gray(230),
    );
}

fn lerp_rect(from: Rect, to: Rect, t: f32) -> Rect {
    Rect::from_min_max(from.min.lerp(to.min, t), from.max.lerp(to.max, t))
}
