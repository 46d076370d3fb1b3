use std::collections::HashMap;

use eframe::egui;
use eframe::emath::{Align2, Rect, Vec2};
use eframe::epaint::{Color32, CornerRadius, FontId, Stroke, StrokeKind};
use eframe::egui::{
    ColorImage, Pos2, Response, Sense, TextureHandle, TextureId, TextureOptions, Ui, pos2,
};

use crate::dissolve::Particle;
use crate::types::RunningApp;

/// GPU textures for the icons of the cards currently shown, keyed by app id.
#[derive(Default)]
pub struct IconTextures {
    handles: HashMap<String, TextureHandle>,
}

impl IconTextures {
    /// Upload icons of new cards and free those of cards that went away.
    pub fn sync(&mut self, ctx: &egui::Context, cards: &[RunningApp]) {
        self.handles.retain(|id, _| cards.iter().any(|c| &c.id == id));
        for app in cards {
            if self.handles.contains_key(&app.id) {
                continue;
            }
            let Some(icon) = app.icon.upgrade() else {
                continue;
            };
            let Some(image) = icon.image.as_ref() else {
                continue;
            };
            let texture = ctx.load_texture(
                format!("icon:{}", app.id),
                ColorImage::from_rgba_unmultiplied(image.size, &image.rgba),
                TextureOptions::LINEAR,
            );
            self.handles.insert(app.id.clone(), texture);
        }
    }

    pub fn get(&self, app_id: &str) -> Option<TextureId> {
        self.handles.get(app_id).map(|h| h.id())
    }
}

/// How one card is drawn this frame.
#[derive(Clone, Copy, Debug)]
pub struct CardLook {
    pub size: f32,
    pub fill_alpha: u8,
    pub hovered: bool,
    pub opacity: f32,
    pub icon: Option<TextureId>,
}

/// Paint an app card centered at `center` and make it clickable and draggable.
pub fn card(ui: &mut Ui, app: &RunningApp, center: Pos2, look: CardLook) -> Response {
    let rect = Rect::from_center_size(center, Vec2::splat(look.size));
    let id = ui.id().with(("card", &app.id));
    let response = ui.interact(rect, id, Sense::click_and_drag());

    if ui.is_rect_visible(rect) && look.opacity > 0.0 {
        let painter = ui.painter();
        let radius = CornerRadius::same((look.size * 0.22) as u8);

        let fill = Color32::from_rgba_unmultiplied(38, 38, 44, look.fill_alpha).gamma_multiply(look.opacity);
        let stroke_color = if look.hovered {
            Color32::from_rgb(0, 122, 255)
        } else {
            Color32::from_white_alpha(40)
        };
        painter.rect_filled(rect, radius, fill);
        painter.rect_stroke(
            rect,
            radius,
            Stroke::new(if look.hovered { 2.0 } else { 1.0 }, stroke_color.gamma_multiply(look.opacity)),
            StrokeKind::Inside,
        );

        let icon_center = rect.center() - Vec2::new(0.0, look.size * 0.08);
        match look.icon {
            Some(texture) => {
                painter.image(
                    texture,
                    Rect::from_center_size(icon_center, Vec2::splat(look.size * 0.56)),
                    Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                    Color32::WHITE.gamma_multiply(look.opacity),
                );
            }
            None => {
                let glyph = app.first_letter().map(|c| c.to_string()).unwrap_or_default();
                painter.text(
                    icon_center,
                    Align2::CENTER_CENTER,
                    glyph,
                    FontId::proportional(look.size * 0.45),
                    Color32::WHITE.gamma_multiply(look.opacity),
                );
            }
        }
        painter.text(
            rect.center_bottom() - Vec2::new(0.0, look.size * 0.12),
            Align2::CENTER_BOTTOM,
            truncate(&app.name, 12),
            FontId::proportional((look.size * 0.14).max(9.0)),
            Color32::from_gray(210).gamma_multiply(look.opacity),
        );
    }

    response.on_hover_text(app.name.as_str())
}

/// Paint the particles of a dissolving card whose top-left corner is `origin`.
pub fn particles(ui: &Ui, origin: Pos2, particles: &[Particle], progress: f64) {
    let painter = ui.painter();
    for particle in particles {
        if let Some(frame) = particle.frame_at(progress) {
            painter.circle_filled(
                origin + frame.center.to_vec2(),
                frame.size * 0.5,
                Color32::from_white_alpha((frame.alpha * 255.0) as u8),
            );
        }
    }
}

fn truncate(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let mut out: String = name.chars().take(max - 1).collect();
    out.push('…');
    out
}
