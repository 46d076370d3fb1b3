//! Particle dissolve played after a card is released inside the target.
//!
//! Progress is driven by a frame clock running on its own thread. Each tick is
//! sent to the UI thread, which applies it to the controller; ticks from a
//! clock that was restarted or stopped carry an old generation and are dropped.
//! Every change of progress is pushed to the registered listener.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use egui::{Pos2, Vec2, pos2};
use rand::Rng;
use tracing::{debug, trace};

pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

const ANGLE_SPREAD: f64 = 0.5;
const MAX_DELAY: f64 = 0.3;
const TRAVEL: f32 = 100.0;

/// One clock tick, stamped with the generation of the run it belongs to.
#[derive(Clone, Copy, Debug)]
pub struct ClockTick {
    pub generation: u64,
    pub at: Instant,
}

/// Handle to a running frame clock thread. Dropping it stops the clock.
#[derive(Debug)]
pub struct FrameClock {
    token: Arc<AtomicU64>,
}

impl FrameClock {
    /// Tick roughly 60 times a second until stopped, waking the UI after each tick.
    pub fn spawn(
        generation: u64,
        tx: Sender<ClockTick>,
        wake: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        let token = Arc::new(AtomicU64::new(generation));
        let thread_token = Arc::clone(&token);
        thread::spawn(move || {
            while thread_token.load(Ordering::Relaxed) == generation {
                if tx
                    .send(ClockTick {
                        generation,
                        at: Instant::now(),
                    })
                    .is_err()
                {
                    break;
                }
                wake();
                thread::sleep(FRAME_INTERVAL);
            }
            trace!(generation, "frame clock stopped");
        });
        Self { token }
    }

    pub fn stop(&self) {
        self.token.store(u64::MAX, Ordering::Relaxed);
    }
}

impl Drop for FrameClock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Result of applying a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DissolveTick {
    Ignored,
    Progress(f64),
    /// Progress just reached 1. Reported once per run.
    Completed,
}

/// Owns the progress scalar of one dissolving card.
pub struct DissolveAnimationController {
    progress: f64,
    direction: f64,
    duration: Duration,
    started: Option<Instant>,
    generation: u64,
    listener: Option<Box<dyn FnMut(f64)>>,
}

impl Default for DissolveAnimationController {
    fn default() -> Self {
        Self {
            progress: 0.0,
            direction: PI / 2.0,
            duration: Duration::from_millis(800),
            started: None,
            generation: 0,
            listener: None,
        }
    }
}

impl DissolveAnimationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the new progress on start, reset and every applied tick.
    pub fn set_listener(&mut self, listener: impl FnMut(f64) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Start (or restart) from 0. Returns the generation ticks must carry.
    pub fn start(&mut self, duration: Duration, direction: f64, now: Instant) -> u64 {
        self.generation += 1;
        self.progress = 0.0;
        self.direction = direction;
        self.duration = duration;
        self.started = Some(now);
        debug!(generation = self.generation, ?duration, direction, "dissolve started");
        self.publish();
        self.generation
    }

    /// Stop without completing. The controller can be started again afterwards.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.progress = 0.0;
        self.started = None;
        self.publish();
    }

    /// Angle toward the target, fixed for the current run.
    pub fn direction(&self) -> f64 {
        self.direction
    }

    /// Apply a tick from the frame clock.
    pub fn apply(&mut self, tick: ClockTick) -> DissolveTick {
        if tick.generation != self.generation {
            return DissolveTick::Ignored;
        }
        self.tick(tick.at)
    }

    pub fn tick(&mut self, now: Instant) -> DissolveTick {
        let Some(started) = self.started else {
            return DissolveTick::Ignored;
        };
        let elapsed = now.saturating_duration_since(started);
        let next = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };
        // never move backwards on out-of-order ticks
        self.progress = self.progress.max(next);
        self.publish();

        if self.progress >= 1.0 {
            self.started = None;
            debug!(generation = self.generation, "dissolve completed");
            return DissolveTick::Completed;
        }
        DissolveTick::Progress(self.progress)
    }

    fn publish(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener(self.progress);
        }
    }
}

/// Card opacity: full until 0.1, then fading out faster than progress.
pub fn card_opacity(progress: f64) -> f32 {
    if progress < 0.1 {
        1.0
    } else {
        (1.0 - progress * 1.2).max(0.0) as f32
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub start: Pos2,
    pub angle: f64,
    pub speed: f32,
    /// Fraction of the run before the particle starts moving.
    pub delay: f64,
    pub size: f32,
}

/// Where a particle is drawn at a given progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleFrame {
    pub center: Pos2,
    pub alpha: f32,
    pub size: f32,
}

impl Particle {
    pub fn frame_at(&self, progress: f64) -> Option<ParticleFrame> {
        let local = ((progress - self.delay) / (1.0 - self.delay)).max(0.0);
        if local <= 0.0 {
            return None;
        }
        let distance = self.speed * local as f32 * TRAVEL;
        Some(ParticleFrame {
            center: pos2(
                self.start.x + self.angle.cos() as f32 * distance,
                self.start.y + self.angle.sin() as f32 * distance,
            ),
            alpha: (1.0 - local * 1.5).max(0.0) as f32,
            size: self.size * (1.0 - local as f32 * 0.5),
        })
    }
}

/// Random particle set generated once per dissolve run.
pub fn generate_particles(
    rng: &mut impl Rng,
    count: usize,
    card_size: Vec2,
    direction: f64,
) -> Vec<Particle> {
    (0..count)
        .map(|_| Particle {
            start: pos2(
                rng.gen_range(0.0..=card_size.x.max(0.0)),
                rng.gen_range(0.0..=card_size.y.max(0.0)),
            ),
            angle: direction + rng.gen_range(-ANGLE_SPREAD..=ANGLE_SPREAD),
            speed: rng.gen_range(0.5..=1.5),
            delay: rng.gen_range(0.0..=MAX_DELAY),
            size: rng.gen_range(2.0..=6.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::mpsc;

    const HALF_SECOND: Duration = Duration::from_millis(500);

    /// Controller whose published progress is mirrored into the returned cell.
    fn observed() -> (DissolveAnimationController, Rc<Cell<f64>>) {
        let seen = Rc::new(Cell::new(f64::NAN));
        let sink = Rc::clone(&seen);
        let mut controller = DissolveAnimationController::new();
        controller.set_listener(move |p| sink.set(p));
        (controller, seen)
    }

    #[test]
    fn progress_tracks_elapsed_time() {
        let t0 = Instant::now();
        let mut controller = DissolveAnimationController::new();
        controller.start(HALF_SECOND, 0.0, t0);

        match controller.tick(t0 + Duration::from_millis(250)) {
            DissolveTick::Progress(p) => assert!((p - 0.5).abs() < 0.01, "progress {p}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn completes_exactly_once_and_clamps() {
        let t0 = Instant::now();
        let (mut controller, seen) = observed();
        controller.start(HALF_SECOND, 0.0, t0);

        assert_eq!(controller.tick(t0 + Duration::from_millis(900)), DissolveTick::Completed);
        assert_eq!(seen.get(), 1.0);
        assert_eq!(controller.tick(t0 + Duration::from_millis(1000)), DissolveTick::Ignored);
    }

    #[test]
    fn listener_sees_monotonic_progress() {
        let t0 = Instant::now();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut controller = DissolveAnimationController::new();
        controller.set_listener(move |p| sink.borrow_mut().push(p));
        controller.start(HALF_SECOND, 0.0, t0);

        for ms in [100, 300, 200, 450, 600] {
            controller.tick(t0 + Duration::from_millis(ms));
        }

        let seen = seen.borrow();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(seen.iter().filter(|p| **p == 1.0).count(), 1);
    }

    #[test]
    fn stale_generation_ticks_are_ignored() {
        let t0 = Instant::now();
        let (mut controller, seen) = observed();
        let first = controller.start(HALF_SECOND, 0.0, t0);
        let second = controller.start(HALF_SECOND, 0.0, t0 + Duration::from_millis(100));
        assert_ne!(first, second);

        let stale = ClockTick {
            generation: first,
            at: t0 + Duration::from_secs(5),
        };
        assert_eq!(controller.apply(stale), DissolveTick::Ignored);
        assert_eq!(seen.get(), 0.0);
    }

    #[test]
    fn restart_begins_from_zero() {
        let t0 = Instant::now();
        let (mut controller, seen) = observed();
        controller.start(HALF_SECOND, 0.0, t0);
        controller.tick(t0 + Duration::from_millis(400));

        let t1 = t0 + Duration::from_millis(400);
        controller.start(HALF_SECOND, 0.0, t1);
        assert_eq!(seen.get(), 0.0);
        assert_eq!(
            controller.tick(t1 + Duration::from_millis(250)),
            DissolveTick::Progress(0.5)
        );
    }

    #[test]
    fn reset_discards_run_without_completion() {
        let t0 = Instant::now();
        let (mut controller, seen) = observed();
        let generation = controller.start(HALF_SECOND, 0.0, t0);
        controller.tick(t0 + Duration::from_millis(250));
        controller.reset();
        assert_eq!(seen.get(), 0.0);

        let tick = ClockTick {
            generation,
            at: t0 + Duration::from_secs(1),
        };
        assert_eq!(controller.apply(tick), DissolveTick::Ignored);
        assert_eq!(seen.get(), 0.0);
    }

    #[test]
    fn frame_clock_delivers_ticks_until_stopped() {
        let (tx, rx) = mpsc::channel();
        let clock = FrameClock::spawn(3, tx, Arc::new(|| {}));
        let tick = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(tick.generation, 3);
        drop(clock);
        // drain whatever was in flight, then the channel closes
        while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn opacity_curve() {
        assert_eq!(card_opacity(0.0), 1.0);
        assert_eq!(card_opacity(0.09), 1.0);
        assert!((card_opacity(0.5) - 0.4).abs() < 1e-6);
        assert_eq!(card_opacity(1.0), 0.0);
    }

    #[test]
    fn particles_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let size = Vec2::new(80.0, 100.0);
        let particles = generate_particles(&mut rng, 60, size, 1.0);

        assert_eq!(particles.len(), 60);
        for p in &particles {
            assert!((0.0..=80.0).contains(&p.start.x));
            assert!((0.0..=100.0).contains(&p.start.y));
            assert!((p.angle - 1.0).abs() <= ANGLE_SPREAD);
            assert!((0.0..=MAX_DELAY).contains(&p.delay));
        }
    }

    #[test]
    fn each_run_gets_a_fresh_particle_set() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = generate_particles(&mut rng, 10, Vec2::splat(50.0), 0.0);
        let b = generate_particles(&mut rng, 10, Vec2::splat(50.0), 0.0);
        assert_ne!(a, b);
    }

    #[test]
    fn delayed_particle_waits_then_moves_toward_direction() {
        let particle = Particle {
            start: pos2(10.0, 10.0),
            angle: 0.0,
            speed: 1.0,
            delay: 0.2,
            size: 4.0,
        };
        assert_eq!(particle.frame_at(0.1), None);

        let frame = particle.frame_at(0.6).unwrap();
        assert!(frame.center.x > 10.0);
        assert!((frame.center.y - 10.0).abs() < 1e-4);
        assert!(frame.size < 4.0);
    }
}
