//! Panel orchestration.
//!
//! Owns every state machine of one panel and applies the effects they return.
//! All methods run on the UI thread; background work (termination waits, file
//! discards, frame clock) reports back through channels drained in `frame`.

use std::cell::Cell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use egui::{Pos2, Vec2, vec2};
use tracing::{debug, info, warn};

use crate::config::{DropAction, Settings};
use crate::core::discard_files;
use crate::directory::{ProcessEnumerator, RunningAppDirectory};
use crate::dissolve::{
    ClockTick, DissolveAnimationController, DissolveTick, FrameClock, Particle, generate_particles,
};
use crate::drag::{CardDragSession, DragEffect, DragGeometry};
use crate::error::ActionError;
use crate::file_drop::{DropZone, FileDropSession, FileEffect};
use crate::indicator::IndicatorMorph;
use crate::osx;
use crate::process::ProcessLifecycleManager;
use crate::trigger::TriggerEvent;
use crate::types::{
    ActionKind, ActionUpdate, CardDragState, FileAction, FileDragState, IndicatorState, RunningApp,
};

const SHAKE_DURATION: Duration = Duration::from_millis(400);
const SHAKE_AMPLITUDE: f32 = 4.0;

/// Window commands issued by the panel. Geometry and compositing stay with the host.
pub trait PanelHost {
    fn show(&mut self, at: Pos2);
    fn hide(&mut self, activate_selected: bool);
    fn dismiss_immediately(&mut self);
}

/// Wakes the UI thread after background work posted a message.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

pub struct PanelController<H, E> {
    host: H,
    directory: RunningAppDirectory<E>,
    processes: ProcessLifecycleManager,
    settings: Settings,
    wake: Waker,

    visible: bool,
    cards: Vec<RunningApp>,
    hovered: Option<String>,
    status: Option<String>,

    drag: CardDragSession,
    /// Drag sessions whose process action is still awaiting its completion.
    live_actions: HashSet<u64>,
    dismiss_after_dissolve: bool,
    shake_started: Option<Instant>,

    dissolve: DissolveAnimationController,
    /// Last progress the dissolve controller published.
    progress: Rc<Cell<f64>>,
    particles: Vec<Particle>,
    clock: Option<FrameClock>,
    threaded_clock: bool,
    clock_tx: Sender<ClockTick>,
    clock_rx: Receiver<ClockTick>,

    files: FileDropSession,
    indicator: IndicatorMorph,

    updates_tx: Sender<ActionUpdate>,
    updates_rx: Receiver<ActionUpdate>,
}

impl<H: PanelHost, E: ProcessEnumerator> PanelController<H, E> {
    pub fn new(
        host: H,
        directory: RunningAppDirectory<E>,
        processes: ProcessLifecycleManager,
        settings: Settings,
        wake: Waker,
    ) -> Self {
        let (clock_tx, clock_rx) = mpsc::channel();
        let (updates_tx, updates_rx) = mpsc::channel();
        let zone = DropZone {
            indicator: egui::Rect::NOTHING,
            target_center: Pos2::ZERO,
            target_radius: 0.0,
        };
        let files = FileDropSession::new(zone, settings.file_hover_timeout());
        let progress = Rc::new(Cell::new(0.0));
        let mut dissolve = DissolveAnimationController::new();
        let published = Rc::clone(&progress);
        dissolve.set_listener(move |p| published.set(p));
        Self {
            host,
            directory,
            processes,
            settings,
            wake,
            visible: false,
            cards: Vec::new(),
            hovered: None,
            status: None,
            drag: CardDragSession::new(),
            live_actions: HashSet::new(),
            dismiss_after_dissolve: false,
            shake_started: None,
            dissolve,
            progress,
            particles: Vec::new(),
            clock: None,
            threaded_clock: true,
            clock_tx,
            clock_rx,
            files,
            indicator: IndicatorMorph::new(),
            updates_tx,
            updates_rx,
        }
    }

    /// Advance the dissolve from `frame(now)` instead of a clock thread.
    #[cfg(test)]
    pub fn with_manual_clock(mut self) -> Self {
        self.threaded_clock = false;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn cards(&self) -> &[RunningApp] {
        &self.cards
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn drag_state(&self) -> CardDragState {
        self.drag.state()
    }

    /// The card is the one being dragged or dissolved.
    pub fn is_card_active(&self, app_id: &str) -> bool {
        self.drag.is_active_for(app_id)
    }

    pub fn dissolve_progress(&self) -> f64 {
        self.progress.get()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn file_state(&self) -> &FileDragState {
        self.files.state()
    }

    pub fn indicator_state(&self) -> IndicatorState {
        self.indicator.state()
    }

    pub fn morph_fraction(&self, now: Instant) -> f32 {
        self.indicator.morph_fraction(now)
    }

    /// Horizontal jitter applied to the dragged card right after it nears the target.
    pub fn shake_offset(&self, now: Instant) -> Vec2 {
        match (self.drag.state(), self.shake_started) {
            (CardDragState::NearTarget(_), Some(started)) => {
                let t = now.saturating_duration_since(started);
                if t >= SHAKE_DURATION {
                    return Vec2::ZERO;
                }
                let phase = t.as_secs_f32() * 60.0;
                vec2(phase.sin() * SHAKE_AMPLITUDE, 0.0)
            }
            _ => Vec2::ZERO,
        }
    }

    pub fn apply_settings(&mut self, settings: Settings) {
        self.files.set_hover_timeout(settings.file_hover_timeout());
        self.settings = settings;
    }

    pub fn set_drop_zone(&mut self, zone: DropZone) {
        self.files.set_zone(zone);
    }

    pub fn set_hovered(&mut self, app_id: Option<String>) {
        self.hovered = app_id;
    }

    pub fn handle_trigger(&mut self, event: TriggerEvent, pointer: Pos2) {
        match event {
            TriggerEvent::Open => self.open(pointer),
            TriggerEvent::Close { activate_selected } => {
                if activate_selected {
                    self.close(true);
                } else {
                    self.dismiss();
                }
            }
        }
    }

    pub fn open(&mut self, at: Pos2) {
        if self.visible {
            return;
        }
        self.invalidate_sessions();
        self.cards = self.directory.list(None);
        self.hovered = None;
        self.status = None;
        self.visible = true;
        info!(cards = self.cards.len(), "panel opened");
        self.host.show(at);
    }

    /// Hide the panel, activating the hovered card's app when asked to.
    pub fn close(&mut self, activate_selected: bool) {
        if !self.visible {
            return;
        }
        let selected = self
            .hovered
            .as_ref()
            .and_then(|id| self.cards.iter().find(|c| &c.id == id))
            .cloned();
        self.invalidate_sessions();
        self.visible = false;
        self.host.hide(activate_selected);

        if activate_selected {
            if let Some(app) = selected {
                if let Err(e) = self.processes.activate(&app) {
                    warn!("Activation of {} failed: {}", app.name, e);
                }
            }
        }
        debug!(activate_selected, "panel hidden");
    }

    pub fn dismiss(&mut self) {
        if !self.visible {
            return;
        }
        self.invalidate_sessions();
        self.visible = false;
        self.host.dismiss_immediately();
        debug!("panel dismissed");
    }

    /// Panel window lost focus: abandon in-flight gestures, keep the panel.
    pub fn focus_lost(&mut self) {
        self.invalidate_sessions();
    }

    pub fn card_pointer_down(&mut self, app_id: &str, geometry: DragGeometry) -> bool {
        let Some(app) = self.cards.iter().find(|c| c.id == app_id).cloned() else {
            return false;
        };
        self.shake_started = None;
        self.drag.pointer_down(app, geometry).is_ok()
    }

    pub fn card_pointer_move(&mut self, delta: Vec2, now: Instant) {
        if let Some(DragEffect::Shake) = self.drag.pointer_move(delta) {
            self.shake_started = Some(now);
        }
    }

    pub fn card_pointer_up(&mut self) {
        match self.drag.pointer_up() {
            Some(DragEffect::Perform { app, session }) => self.perform(app, session),
            Some(DragEffect::SnapBack) => self.shake_started = None,
            _ => {}
        }
    }

    pub fn files_hovering(&mut self, files: Vec<PathBuf>) {
        self.files.files_entered(files);
    }

    pub fn files_pointer(&mut self, pos: Pos2, now: Instant) {
        self.files.hover(pos, now);
    }

    pub fn files_left(&mut self) {
        self.files.exited();
    }

    pub fn files_dropped(&mut self) {
        if let Some(FileEffect::Process { files, action }) = self.files.dropped() {
            self.run_file_action(files, action);
        }
    }

    /// Per-frame work: animation, dwell timers, indicator and completions.
    pub fn frame(&mut self, now: Instant) {
        if let Some(DragEffect::StartDissolve { direction }) = self.drag.animation_tick() {
            self.start_dissolve(direction, now);
        }

        let mut completed = false;
        if self.threaded_clock {
            while let Ok(tick) = self.clock_rx.try_recv() {
                if self.dissolve.apply(tick) == DissolveTick::Completed {
                    completed = true;
                }
            }
        } else if self.dissolve.tick(now) == DissolveTick::Completed {
            completed = true;
        }
        if completed {
            self.finish_dissolve();
        }

        self.files.poll(now);
        self.indicator.follow(self.files.state(), now);
        self.drain_updates();
    }

    /// Apply completions posted by background work. Returns how many were read.
    pub fn drain_updates(&mut self) -> usize {
        let mut count = 0;
        while let Ok(update) = self.updates_rx.try_recv() {
            count += 1;
            self.apply_update(update);
        }
        count
    }

    fn apply_update(&mut self, update: ActionUpdate) {
        match update.kind {
            ActionKind::Activate | ActionKind::Terminate => {
                if !self.live_actions.remove(&update.session) {
                    debug!(session = update.session, "ignoring completion of invalidated drag");
                    return;
                }
            }
            ActionKind::Files(_) => {
                if update.session != self.files.session()
                    || !matches!(self.files.state(), FileDragState::Processing)
                {
                    debug!(session = update.session, "ignoring completion of invalidated file drop");
                    return;
                }
                self.files.finished();
            }
        }
        if update.success {
            info!("{}", update.message);
        } else {
            warn!("{}", update.message);
        }
        self.status = Some(update.message);
    }

    fn perform(&mut self, app: RunningApp, session: u64) {
        self.live_actions.insert(session);
        match self.settings.drop_action {
            DropAction::Terminate => {
                let tx = self.updates_tx.clone();
                let wake = Arc::clone(&self.wake);
                let name = app.name.clone();
                self.processes.terminate(
                    &app,
                    self.settings.terminate_grace_period(),
                    move |outcome| {
                        let message = if outcome.succeeded() {
                            format!("Quit {name}")
                        } else {
                            format!("Could not quit {name} ({outcome:?})")
                        };
                        let _ = tx.send(ActionUpdate {
                            kind: ActionKind::Terminate,
                            session,
                            success: outcome.succeeded(),
                            message,
                        });
                        wake();
                    },
                );
            }
            DropAction::Activate => {
                let result = self.processes.activate(&app);
                self.dismiss_after_dissolve = result.is_ok();
                let (success, message) = match result {
                    Ok(_) => (true, format!("Switched to {}", app.name)),
                    Err(e) => (false, e.to_string()),
                };
                let _ = self.updates_tx.send(ActionUpdate {
                    kind: ActionKind::Activate,
                    session,
                    success,
                    message,
                });
            }
        }
    }

    fn start_dissolve(&mut self, direction: f64, now: Instant) {
        let generation = self
            .dissolve
            .start(self.settings.dissolve_duration(), direction, now);
        let side = self.settings.card_size.points();
        self.particles = generate_particles(
            &mut rand::thread_rng(),
            self.settings.dissolve_particle_count,
            Vec2::splat(side),
            self.dissolve.direction(),
        );
        if self.threaded_clock {
            self.clock = Some(FrameClock::spawn(
                generation,
                self.clock_tx.clone(),
                Arc::clone(&self.wake),
            ));
        }
    }

    fn finish_dissolve(&mut self) {
        self.clock = None;
        self.particles.clear();
        if let Some(DragEffect::Remove { app_id }) = self.drag.dissolve_finished() {
            self.cards.retain(|c| c.id != app_id);
            if self.hovered.as_deref() == Some(app_id.as_str()) {
                self.hovered = None;
            }
        }
        if std::mem::take(&mut self.dismiss_after_dissolve) {
            self.dismiss();
        }
    }

    fn run_file_action(&mut self, files: Vec<PathBuf>, action: FileAction) {
        let session = self.files.session();
        match action {
            FileAction::Share => {
                // the sharing service has to be driven from the main thread
                let shared = osx::share_via_airdrop(&files);
                let message = if shared {
                    format!("Sharing {} file(s)", files.len())
                } else {
                    ActionError::Share("AirDrop is unavailable".into()).to_string()
                };
                let _ = self.updates_tx.send(ActionUpdate {
                    kind: ActionKind::Files(FileAction::Share),
                    session,
                    success: shared,
                    message,
                });
            }
            FileAction::Discard => {
                let tx = self.updates_tx.clone();
                let wake = Arc::clone(&self.wake);
                thread::spawn(move || {
                    let failures = discard_files(&files);
                    let success = failures.is_empty();
                    let message = if success {
                        format!("Moved {} file(s) to Trash", files.len())
                    } else {
                        let detail = failures
                            .iter()
                            .map(|(p, e)| format!("{}: {e}", p.display()))
                            .collect::<Vec<_>>()
                            .join("; ");
                        ActionError::Discard(detail).to_string()
                    };
                    let _ = tx.send(ActionUpdate {
                        kind: ActionKind::Files(FileAction::Discard),
                        session,
                        success,
                        message,
                    });
                    wake();
                });
            }
        }
    }

    fn invalidate_sessions(&mut self) {
        if self.drag.invalidate().is_some() {
            self.dissolve.reset();
            self.clock = None;
            self.particles.clear();
        }
        // an already dispatched action still runs; only its aftermath is dropped
        self.live_actions.clear();
        self.dismiss_after_dissolve = false;
        self.shake_started = None;
        self.files.invalidate();
        self.indicator.follow(self.files.state(), Instant::now());
    }
}
