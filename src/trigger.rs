//! Long-press detection for the configured trigger modifier.
//!
//! The detector is fed absolute modifier-flag snapshots. A session is armed the
//! moment the trigger modifier is held alone and disarmed on the first event
//! that breaks that condition. Sessions carry a generation so a timer that fires
//! after its session was cancelled is recognised as stale.

use std::time::{Duration, Instant};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

bitflags! {
    /// Recognized modifier bits, laid out like `NSEventModifierFlags`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ModifierFlags: u64 {
        const SHIFT = 1 << 17;
        const CONTROL = 1 << 18;
        const OPTION = 1 << 19;
        const COMMAND = 1 << 20;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerModifier {
    #[default]
    Option,
    Command,
    Control,
    Shift,
}

impl TriggerModifier {
    pub const ALL: [TriggerModifier; 4] = [
        TriggerModifier::Option,
        TriggerModifier::Command,
        TriggerModifier::Control,
        TriggerModifier::Shift,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            TriggerModifier::Option => "⌥",
            TriggerModifier::Command => "⌘",
            TriggerModifier::Control => "⌃",
            TriggerModifier::Shift => "⇧",
        }
    }

    pub fn flag(self) -> ModifierFlags {
        match self {
            TriggerModifier::Option => ModifierFlags::OPTION,
            TriggerModifier::Command => ModifierFlags::COMMAND,
            TriggerModifier::Control => ModifierFlags::CONTROL,
            TriggerModifier::Shift => ModifierFlags::SHIFT,
        }
    }

    pub fn is_pressed(self, flags: ModifierFlags) -> bool {
        flags.contains(self.flag())
    }

    pub fn other_modifiers_pressed(self, flags: ModifierFlags) -> bool {
        flags.intersects(ModifierFlags::all().difference(self.flag()))
    }

    /// Trigger held and none of the other three recognized modifiers.
    pub fn pressed_alone(self, flags: ModifierFlags) -> bool {
        self.is_pressed(flags) && !self.other_modifiers_pressed(flags)
    }
}

/// Signal from the detector to the panel orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    Open,
    Close { activate_selected: bool },
}

/// Handle for one armed long-press timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerTicket {
    pub generation: u64,
    pub deadline: Instant,
}

#[derive(Debug)]
struct LongPressSession {
    started: Instant,
    generation: u64,
}

#[derive(Debug)]
pub struct LongPressDetector {
    modifier: TriggerModifier,
    threshold: Duration,
    session: Option<LongPressSession>,
    generation: u64,
    open: bool,
}

impl LongPressDetector {
    pub fn new(modifier: TriggerModifier, threshold: Duration) -> Self {
        Self {
            modifier,
            threshold,
            session: None,
            generation: 0,
            open: false,
        }
    }

    /// Apply new settings. Any pending session is cancelled.
    pub fn configure(&mut self, modifier: TriggerModifier, threshold: Duration) {
        if self.modifier != modifier || self.threshold != threshold {
            self.cancel();
            self.modifier = modifier;
            self.threshold = threshold;
        }
    }

    /// Re-evaluate on every raw flag change.
    pub fn on_flags_changed(&mut self, flags: ModifierFlags, now: Instant) -> Option<TriggerEvent> {
        if self.open {
            if !self.modifier.is_pressed(flags) {
                self.open = false;
                debug!("trigger released, closing with activation");
                return Some(TriggerEvent::Close {
                    activate_selected: true,
                });
            }
            if self.modifier.other_modifiers_pressed(flags) {
                self.open = false;
                debug!("other modifier pressed, dismissing");
                return Some(TriggerEvent::Close {
                    activate_selected: false,
                });
            }
            return None;
        }

        if self.modifier.pressed_alone(flags) {
            if self.session.is_none() {
                self.generation += 1;
                self.session = Some(LongPressSession {
                    started: now,
                    generation: self.generation,
                });
                debug!(generation = self.generation, "long press armed");
            }
        } else {
            self.cancel();
        }
        None
    }

    /// The currently armed timer, if any.
    pub fn pending(&self) -> Option<TimerTicket> {
        self.session.as_ref().map(|s| TimerTicket {
            generation: s.generation,
            deadline: s.started + self.threshold,
        })
    }

    /// Called when a timer scheduled for `ticket` fires. Stale tickets are ignored.
    pub fn fire(&mut self, ticket: TimerTicket, now: Instant) -> Option<TriggerEvent> {
        let session = self.session.as_ref()?;
        if session.generation != ticket.generation || ticket.generation != self.generation {
            debug!(generation = ticket.generation, "ignoring stale long press timer");
            return None;
        }
        if now.saturating_duration_since(session.started) < self.threshold {
            return None;
        }
        self.session = None;
        self.open = true;
        debug!("long press reached threshold");
        Some(TriggerEvent::Open)
    }

    /// Fire the armed timer if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<TriggerEvent> {
        let ticket = self.pending().filter(|t| now >= t.deadline)?;
        self.fire(ticket, now)
    }

    /// The panel was closed by something other than the trigger.
    pub fn panel_closed(&mut self) {
        self.open = false;
    }

    fn cancel(&mut self) {
        if self.session.take().is_some() {
            self.generation += 1;
            debug!("long press cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const THRESHOLD: Duration = Duration::from_millis(180);

    fn flags_from_bits(mask: u8) -> ModifierFlags {
        let mut flags = ModifierFlags::empty();
        if mask & 1 != 0 {
            flags |= ModifierFlags::OPTION;
        }
        if mask & 2 != 0 {
            flags |= ModifierFlags::COMMAND;
        }
        if mask & 4 != 0 {
            flags |= ModifierFlags::CONTROL;
        }
        if mask & 8 != 0 {
            flags |= ModifierFlags::SHIFT;
        }
        flags
    }

    #[test]
    fn pressed_alone_over_all_combinations() {
        for modifier in TriggerModifier::ALL {
            for mask in 0u8..16 {
                let flags = flags_from_bits(mask);
                let expected = flags == modifier.flag();
                assert_eq!(
                    modifier.pressed_alone(flags),
                    expected,
                    "{modifier:?} with {flags:?}"
                );
            }
        }
    }

    #[test]
    fn unrelated_bits_do_not_disqualify() {
        // caps lock and device-dependent bits
        let raw = ModifierFlags::OPTION.bits() | (1 << 16) | 0x20;
        let flags = ModifierFlags::from_bits_truncate(raw);
        assert!(TriggerModifier::Option.pressed_alone(flags));
    }

    #[test]
    fn holding_past_threshold_opens_once() {
        let t0 = Instant::now();
        let mut detector = LongPressDetector::new(TriggerModifier::Option, THRESHOLD);

        assert_eq!(detector.on_flags_changed(ModifierFlags::OPTION, t0), None);
        // flooding with the same state must not restart the session
        assert_eq!(
            detector.on_flags_changed(ModifierFlags::OPTION, t0 + Duration::from_millis(100)),
            None
        );
        assert_eq!(detector.poll(t0 + Duration::from_millis(179)), None);
        assert_eq!(
            detector.poll(t0 + Duration::from_millis(180)),
            Some(TriggerEvent::Open)
        );
        assert_eq!(detector.poll(t0 + Duration::from_millis(400)), None);
    }

    #[test]
    fn early_release_emits_nothing() {
        let t0 = Instant::now();
        let mut detector = LongPressDetector::new(TriggerModifier::Command, THRESHOLD);

        detector.on_flags_changed(ModifierFlags::COMMAND, t0);
        detector.on_flags_changed(ModifierFlags::empty(), t0 + Duration::from_millis(100));
        assert_eq!(detector.pending(), None);
        assert_eq!(detector.poll(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn other_modifier_cancels_and_stale_timer_is_ignored() {
        let t0 = Instant::now();
        let mut detector = LongPressDetector::new(TriggerModifier::Option, THRESHOLD);

        detector.on_flags_changed(ModifierFlags::OPTION, t0);
        let ticket = detector.pending().unwrap();
        detector.on_flags_changed(
            ModifierFlags::OPTION | ModifierFlags::SHIFT,
            t0 + Duration::from_millis(50),
        );
        assert_eq!(detector.fire(ticket, t0 + Duration::from_millis(500)), None);

        // back to option alone: a fresh session with a fresh deadline
        let t1 = t0 + Duration::from_millis(60);
        detector.on_flags_changed(ModifierFlags::OPTION, t1);
        let fresh = detector.pending().unwrap();
        assert_ne!(fresh.generation, ticket.generation);
        assert_eq!(fresh.deadline, t1 + THRESHOLD);
        assert_eq!(detector.fire(ticket, t1 + THRESHOLD), None);
        assert_eq!(detector.fire(fresh, t1 + THRESHOLD), Some(TriggerEvent::Open));
    }

    #[test]
    fn release_after_open_closes_with_activation() {
        let t0 = Instant::now();
        let mut detector = LongPressDetector::new(TriggerModifier::Option, THRESHOLD);
        detector.on_flags_changed(ModifierFlags::OPTION, t0);
        detector.poll(t0 + THRESHOLD);

        assert_eq!(
            detector.on_flags_changed(ModifierFlags::empty(), t0 + Duration::from_secs(1)),
            Some(TriggerEvent::Close {
                activate_selected: true
            })
        );
    }

    #[test]
    fn other_modifier_after_open_dismisses() {
        let t0 = Instant::now();
        let mut detector = LongPressDetector::new(TriggerModifier::Control, THRESHOLD);
        detector.on_flags_changed(ModifierFlags::CONTROL, t0);
        detector.poll(t0 + THRESHOLD);

        assert_eq!(
            detector.on_flags_changed(
                ModifierFlags::CONTROL | ModifierFlags::COMMAND,
                t0 + Duration::from_secs(1)
            ),
            Some(TriggerEvent::Close {
                activate_selected: false
            })
        );
    }

    #[test]
    fn reconfigure_cancels_pending_session() {
        let t0 = Instant::now();
        let mut detector = LongPressDetector::new(TriggerModifier::Option, THRESHOLD);
        detector.on_flags_changed(ModifierFlags::OPTION, t0);
        detector.configure(TriggerModifier::Shift, THRESHOLD);
        assert_eq!(detector.poll(t0 + Duration::from_secs(1)), None);
    }
}
