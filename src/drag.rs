//! Pointer-drag lifecycle of one card toward the target.
//!
//! The session is a pure state machine: every input returns the side effect the
//! panel has to carry out, so the machine itself never touches processes or
//! clocks.

use egui::{Pos2, Vec2};
use tracing::{debug, info};

use crate::types::{CardDragState, RunningApp};

/// Where the card and the target sit when the drag begins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragGeometry {
    pub card_center: Pos2,
    pub target_center: Pos2,
    pub near_radius: f32,
}

impl DragGeometry {
    pub fn distance_to_target(&self, offset: Vec2) -> f32 {
        (self.card_center + offset).distance(self.target_center)
    }

    /// Angle from the card center toward the target center, in radians.
    pub fn direction_to_target(&self) -> f64 {
        let d = self.target_center - self.card_center;
        f64::from(d.y).atan2(f64::from(d.x))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DragEffect {
    /// Entered the near-target radius; play the shake feedback.
    Shake,
    SnapBack,
    /// Released inside the target: run the configured process action.
    Perform { app: RunningApp, session: u64 },
    StartDissolve { direction: f64 },
    /// Dissolve finished; drop the card from the visible set.
    Remove { app_id: String },
    /// Session invalidated; discard any animation without completion effects.
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragRejected {
    /// Another card is still dragging or dissolving.
    Busy,
}

#[derive(Debug, Default)]
pub struct CardDragSession {
    state: CardDragState,
    app: Option<RunningApp>,
    geometry: Option<DragGeometry>,
    session: u64,
}

impl CardDragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CardDragState {
        self.state
    }

    pub fn is_active_for(&self, app_id: &str) -> bool {
        !self.state.is_idle() && self.app.as_ref().is_some_and(|a| a.id == app_id)
    }

    pub fn pointer_down(&mut self, app: RunningApp, geometry: DragGeometry) -> Result<(), DragRejected> {
        if !self.state.is_idle() {
            debug!(app = %app.id, state = ?self.state, "drag rejected");
            return Err(DragRejected::Busy);
        }
        self.session += 1;
        debug!(app = %app.id, session = self.session, "drag started");
        self.app = Some(app);
        self.geometry = Some(geometry);
        self.state = CardDragState::Dragging(Vec2::ZERO);
        Ok(())
    }

    pub fn pointer_move(&mut self, delta: Vec2) -> Option<DragEffect> {
        let geometry = self.geometry?;
        let offset = match self.state {
            CardDragState::Dragging(o) | CardDragState::NearTarget(o) => o + delta,
            _ => return None,
        };
        let near = geometry.distance_to_target(offset) <= geometry.near_radius;

        match (self.state, near) {
            (CardDragState::Dragging(_), true) => {
                self.state = CardDragState::NearTarget(offset);
                Some(DragEffect::Shake)
            }
            (_, true) => {
                self.state = CardDragState::NearTarget(offset);
                None
            }
            (_, false) => {
                self.state = CardDragState::Dragging(offset);
                None
            }
        }
    }

    pub fn pointer_up(&mut self) -> Option<DragEffect> {
        let geometry = self.geometry?;
        match self.state {
            CardDragState::NearTarget(o) if geometry.distance_to_target(o) <= geometry.near_radius => {
                self.state = CardDragState::ReleasedInTarget(o);
                let app = self.app.clone()?;
                info!(app = %app.id, "card released in target");
                Some(DragEffect::Perform {
                    app,
                    session: self.session,
                })
            }
            CardDragState::Dragging(_) | CardDragState::NearTarget(_) => {
                self.clear();
                Some(DragEffect::SnapBack)
            }
            _ => None,
        }
    }

    /// First animation frame after the release.
    pub fn animation_tick(&mut self) -> Option<DragEffect> {
        let CardDragState::ReleasedInTarget(o) = self.state else {
            return None;
        };
        let geometry = self.geometry?;
        self.state = CardDragState::Dissolving(o);
        Some(DragEffect::StartDissolve {
            direction: geometry.direction_to_target(),
        })
    }

    pub fn dissolve_finished(&mut self) -> Option<DragEffect> {
        if !matches!(self.state, CardDragState::Dissolving(_)) {
            return None;
        }
        let app = self.app.take()?;
        self.clear();
        Some(DragEffect::Remove { app_id: app.id })
    }

    /// Panel hidden or focus lost: back to idle at once.
    pub fn invalidate(&mut self) -> Option<DragEffect> {
        if self.state.is_idle() {
            return None;
        }
        debug!(session = self.session, state = ?self.state, "drag invalidated");
        self.clear();
        Some(DragEffect::Cancelled)
    }

    fn clear(&mut self) {
        self.state = CardDragState::Idle;
        self.app = None;
        self.geometry = None;
    }
}
