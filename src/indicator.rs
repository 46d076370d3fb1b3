//! Drop indicator appearance, derived from the file-drag state.
//!
//! Nothing here runs on its own clock: the morph window is measured whenever
//! the state is re-derived, which the panel does every frame.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::types::{FileDragState, IndicatorState};

pub const MORPH_DURATION: Duration = Duration::from_millis(350);

#[derive(Debug, Default)]
pub struct IndicatorMorph {
    state: IndicatorState,
    morph_started: Option<Instant>,
    /// Morph sequences started since creation.
    sequences: u32,
}

impl IndicatorMorph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> IndicatorState {
        self.state
    }

    /// 0 → 1 through the morph window; 1 once morphed.
    pub fn morph_fraction(&self, now: Instant) -> f32 {
        match (self.state, self.morph_started) {
            (IndicatorState::Morphing, Some(started)) => {
                (now.saturating_duration_since(started).as_secs_f32() / MORPH_DURATION.as_secs_f32())
                    .min(1.0)
            }
            (IndicatorState::MorphedToTarget, _) => 1.0,
            _ => 0.0,
        }
    }

    pub fn follow(&mut self, file: &FileDragState, now: Instant) -> IndicatorState {
        let next = match file {
            FileDragState::Idle => {
                self.morph_started = None;
                IndicatorState::Hidden
            }
            FileDragState::Entered(_) | FileDragState::OverIndicatorZone(_) => {
                self.morph_started = None;
                IndicatorState::IndicatorShown
            }
            FileDragState::OverTarget(_) => match (self.state, self.morph_started) {
                (IndicatorState::Morphing, Some(started))
                    if now.saturating_duration_since(started) >= MORPH_DURATION =>
                {
                    IndicatorState::MorphedToTarget
                }
                (IndicatorState::Morphing, _) | (IndicatorState::MorphedToTarget, _) => self.state,
                _ => {
                    self.sequences += 1;
                    self.morph_started = Some(now);
                    debug!(sequence = self.sequences, "indicator morph started");
                    IndicatorState::Morphing
                }
            },
            FileDragState::Processing => IndicatorState::MorphedToTarget,
        };
        self.state = next;
        next
    }
}
