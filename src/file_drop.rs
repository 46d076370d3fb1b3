//! File-drag lifecycle over the panel.
//!
//! Files hovering inside the indicator zone escalate to the target after a
//! dwell timeout. Backing out of the target radius while still in the zone
//! returns to the indicator with a fresh timer.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use egui::{Pos2, Rect};
use tracing::{debug, info};

use crate::types::{FileAction, FileDragState};

/// Indicator zone and the target circle that appears inside it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DropZone {
    pub indicator: Rect,
    pub target_center: Pos2,
    pub target_radius: f32,
}

impl DropZone {
    fn in_indicator(&self, pos: Pos2) -> bool {
        self.indicator.contains(pos)
    }

    fn in_target(&self, pos: Pos2) -> bool {
        pos.distance(self.target_center) <= self.target_radius
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FileEffect {
    /// Dwell timeout reached; the indicator morphs into the target.
    Escalated,
    Process { files: Vec<PathBuf>, action: FileAction },
}

#[derive(Debug)]
pub struct FileDropSession {
    state: FileDragState,
    zone: DropZone,
    hover_timeout: Duration,
    zone_since: Option<Instant>,
    session: u64,
}

impl FileDropSession {
    pub fn new(zone: DropZone, hover_timeout: Duration) -> Self {
        Self {
            state: FileDragState::Idle,
            zone,
            hover_timeout,
            zone_since: None,
            session: 0,
        }
    }

    pub fn state(&self) -> &FileDragState {
        &self.state
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn set_zone(&mut self, zone: DropZone) {
        self.zone = zone;
    }

    pub fn set_hover_timeout(&mut self, timeout: Duration) {
        self.hover_timeout = timeout;
    }

    /// Files entered the window. The list is kept exactly as provided.
    pub fn files_entered(&mut self, files: Vec<PathBuf>) -> bool {
        if !matches!(self.state, FileDragState::Idle) {
            return false;
        }
        self.session += 1;
        debug!(count = files.len(), session = self.session, "files entered");
        self.state = FileDragState::Entered(files);
        true
    }

    pub fn hover(&mut self, pos: Pos2, now: Instant) -> Option<FileEffect> {
        let in_indicator = self.zone.in_indicator(pos);
        let state = std::mem::take(&mut self.state);
        self.state = match state {
            FileDragState::Entered(files) if in_indicator => {
                self.zone_since = Some(now);
                FileDragState::OverIndicatorZone(files)
            }
            FileDragState::OverIndicatorZone(files) if !in_indicator => {
                self.zone_since = None;
                FileDragState::Entered(files)
            }
            FileDragState::OverTarget(files) if !in_indicator => {
                self.zone_since = None;
                FileDragState::Entered(files)
            }
            FileDragState::OverTarget(files) if !self.zone.in_target(pos) => {
                debug!("backed away from target, restarting hover timer");
                self.zone_since = Some(now);
                FileDragState::OverIndicatorZone(files)
            }
            other => other,
        };
        self.poll(now)
    }

    /// Escalate to the target once the dwell timeout has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<FileEffect> {
        let since = self.zone_since?;
        if now.saturating_duration_since(since) < self.hover_timeout {
            return None;
        }
        let FileDragState::OverIndicatorZone(files) = std::mem::take(&mut self.state) else {
            self.zone_since = None;
            return None;
        };
        self.zone_since = None;
        self.state = FileDragState::OverTarget(files);
        info!("file hover escalated to target");
        Some(FileEffect::Escalated)
    }

    /// Files released over the window.
    ///
    /// Over the indicator the files are shared, over the target they are
    /// discarded; anywhere else nothing happens.
    pub fn dropped(&mut self) -> Option<FileEffect> {
        let state = std::mem::take(&mut self.state);
        self.zone_since = None;
        let action = match &state {
            FileDragState::OverIndicatorZone(_) => FileAction::Share,
            FileDragState::OverTarget(_) => FileAction::Discard,
            FileDragState::Processing => {
                self.state = FileDragState::Processing;
                return None;
            }
            FileDragState::Idle | FileDragState::Entered(_) => return None,
        };
        self.state = FileDragState::Processing;
        let files = state.into_files();
        info!(count = files.len(), ?action, "files dropped");
        Some(FileEffect::Process { files, action })
    }

    /// Drag left the window or was cancelled. Returns whether anything was reset.
    pub fn exited(&mut self) -> bool {
        if !self.state.has_files() {
            return false;
        }
        debug!("file drag exited");
        self.state = FileDragState::Idle;
        self.zone_since = None;
        true
    }

    /// The file action finished; ready for the next drag.
    pub fn finished(&mut self) {
        if matches!(self.state, FileDragState::Processing) {
            self.state = FileDragState::Idle;
        }
    }

    /// Panel hidden: drop everything, including a pending processing state.
    pub fn invalidate(&mut self) {
        self.state = FileDragState::Idle;
        self.zone_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};
    use pretty_assertions::assert_eq;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    fn zone() -> DropZone {
        DropZone {
            indicator: Rect::from_center_size(pos2(100.0, 100.0), vec2(100.0, 100.0)),
            target_center: pos2(100.0, 100.0),
            target_radius: 30.0,
        }
    }

    fn files() -> Vec<PathBuf> {
        vec![PathBuf::from("/tmp/fileA"), PathBuf::from("/tmp/fileB")]
    }

    const OUTSIDE: Pos2 = pos2(400.0, 400.0);
    const IN_ZONE_EDGE: Pos2 = pos2(140.0, 140.0);
    const ON_TARGET: Pos2 = pos2(100.0, 100.0);

    #[test]
    fn short_hover_then_exit_is_idle() {
        let t0 = Instant::now();
        let mut session = FileDropSession::new(zone(), TIMEOUT);
        session.files_entered(files());
        session.hover(ON_TARGET, t0);
        assert_eq!(session.state(), &FileDragState::OverIndicatorZone(files()));
        assert_eq!(session.poll(t0 + Duration::from_millis(500)), None);

        assert!(session.exited());
        assert_eq!(session.state(), &FileDragState::Idle);
    }

    #[test]
    fn dwell_escalates_to_target_once() {
        let t0 = Instant::now();
        let mut session = FileDropSession::new(zone(), TIMEOUT);
        session.files_entered(files());
        session.hover(ON_TARGET, t0);

        assert_eq!(session.poll(t0 + TIMEOUT), Some(FileEffect::Escalated));
        assert_eq!(session.state(), &FileDragState::OverTarget(files()));
        assert_eq!(session.poll(t0 + TIMEOUT * 2), None);
        assert_eq!(session.hover(ON_TARGET, t0 + TIMEOUT * 2), None);
    }

    #[test]
    fn leaving_before_zone_returns_to_entered_then_idle() {
        let t0 = Instant::now();
        let mut session = FileDropSession::new(zone(), TIMEOUT);
        session.files_entered(files());
        session.hover(OUTSIDE, t0);
        assert_eq!(session.state(), &FileDragState::Entered(files()));
        assert_eq!(session.dropped(), None);
        assert_eq!(session.state(), &FileDragState::Idle);
    }

    #[test]
    fn backing_away_restarts_timer() {
        let t0 = Instant::now();
        let mut session = FileDropSession::new(zone(), TIMEOUT);
        session.files_entered(files());
        session.hover(ON_TARGET, t0);
        session.poll(t0 + TIMEOUT);

        let t1 = t0 + TIMEOUT + Duration::from_millis(100);
        session.hover(IN_ZONE_EDGE, t1);
        assert_eq!(session.state(), &FileDragState::OverIndicatorZone(files()));
        // time spent earlier does not count
        assert_eq!(session.poll(t1 + Duration::from_millis(900)), None);
        assert_eq!(session.poll(t1 + TIMEOUT), Some(FileEffect::Escalated));
    }

    #[test]
    fn drop_on_target_discards_in_order() {
        let t0 = Instant::now();
        let mut session = FileDropSession::new(zone(), TIMEOUT);
        session.files_entered(files());
        session.hover(ON_TARGET, t0);
        session.poll(t0 + TIMEOUT);

        assert_eq!(
            session.dropped(),
            Some(FileEffect::Process {
                files: files(),
                action: FileAction::Discard
            })
        );
        assert_eq!(session.state(), &FileDragState::Processing);
        // processing ignores exits until finished
        assert!(!session.exited());
        assert!(!session.files_entered(files()));

        session.finished();
        assert_eq!(session.state(), &FileDragState::Idle);
    }

    #[test]
    fn drop_on_indicator_shares() {
        let t0 = Instant::now();
        let mut session = FileDropSession::new(zone(), TIMEOUT);
        session.files_entered(files());
        session.hover(ON_TARGET, t0);
        assert_eq!(
            session.dropped(),
            Some(FileEffect::Process {
                files: files(),
                action: FileAction::Share
            })
        );
    }
}
