//! Background tasks used by the UI: watching the trigger modifier without
//! blocking the UI thread.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use eframe::egui;
use eframe::egui::{Pos2, pos2};
use tracing::{debug, info};

use crate::osx;
use crate::trigger::{LongPressDetector, ModifierFlags, TriggerEvent, TriggerModifier};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Messages from the watcher to the UI thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// `pointer` is the global mouse location, top-left origin.
    Trigger { event: TriggerEvent, pointer: Pos2 },
}

/// Messages from the UI thread to the watcher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WatcherCommand {
    Configure {
        modifier: TriggerModifier,
        threshold: Duration,
    },
    /// The panel went away without the trigger being released.
    PanelClosed,
}

/// Spawn the modifier watcher. It owns the long-press detector and samples the
/// global modifier flags every few milliseconds.
pub fn spawn_trigger_watcher(
    ctx: egui::Context,
    modifier: TriggerModifier,
    threshold: Duration,
) -> (Receiver<InputEvent>, Sender<WatcherCommand>) {
    let (event_tx, event_rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();

    thread::spawn(move || {
        info!(modifier = ?modifier, ?threshold, "trigger watcher started");
        let mut detector = LongPressDetector::new(modifier, threshold);
        let mut last = ModifierFlags::empty();

        loop {
            loop {
                match cmd_rx.try_recv() {
                    Ok(WatcherCommand::Configure {
                        modifier,
                        threshold,
                    }) => {
                        debug!(?modifier, ?threshold, "trigger reconfigured");
                        detector.configure(modifier, threshold);
                    }
                    Ok(WatcherCommand::PanelClosed) => detector.panel_closed(),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("trigger watcher stopped");
                        return;
                    }
                }
            }

            let now = Instant::now();
            let flags = ModifierFlags::from_bits_truncate(osx::modifier_flags());
            let mut fired = None;
            if flags != last {
                last = flags;
                fired = detector.on_flags_changed(flags, now);
            }
            if fired.is_none() {
                fired = detector.poll(now);
            }

            if let Some(event) = fired {
                let (x, y) = osx::mouse_location();
                if event_tx
                    .send(InputEvent::Trigger {
                        event,
                        pointer: pos2(x, y),
                    })
                    .is_err()
                {
                    return;
                }
                ctx.request_repaint();
            }

            thread::sleep(POLL_INTERVAL);
        }
    });

    (event_rx, cmd_tx)
}
