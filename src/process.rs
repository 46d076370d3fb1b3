//! Bringing applications forward and shutting them down.
//!
//! Termination is two-phase: a cooperative quit request, a bounded wait, then an
//! unconditional kill. The wait runs on its own thread so the UI never blocks;
//! the completion is called exactly once from that thread and is expected to
//! marshal its result back to the UI.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sysinfo::{Pid as SysPid, ProcessStatus, ProcessesToUpdate, Signal, System};
use tracing::{debug, info, warn};

use crate::core::open_application;
use crate::error::ActionError;
use crate::osx;
use crate::types::{Pid, RunningApp};

/// The OS operations the lifecycle manager is built from.
pub trait ProcessControl: Send + Sync {
    fn is_running(&self, pid: Pid) -> bool;
    /// Unhide and bring to the foreground. `false` if the OS refused.
    fn activate(&self, pid: Pid) -> bool;
    fn has_visible_window(&self, pid: Pid) -> bool;
    fn open_application(&self, bundle: &Path) -> anyhow::Result<()>;
    /// Cooperative quit request. `false` if it could not even be delivered.
    fn request_terminate(&self, pid: Pid) -> bool;
    fn force_terminate(&self, pid: Pid) -> bool;
}

/// How an activation succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Foreground,
    Relaunched,
}

/// Final result of a termination request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminateOutcome {
    NotFound,
    Graceful,
    /// Still running after the grace period; carries the kill result.
    ForcedAfterTimeout(bool),
    /// The quit request could not be delivered; carries the kill result.
    ForcedImmediately(bool),
}

impl TerminateOutcome {
    pub fn succeeded(self) -> bool {
        match self {
            TerminateOutcome::NotFound => false,
            TerminateOutcome::Graceful => true,
            TerminateOutcome::ForcedAfterTimeout(ok) | TerminateOutcome::ForcedImmediately(ok) => ok,
        }
    }
}

#[derive(Clone)]
pub struct ProcessLifecycleManager {
    control: Arc<dyn ProcessControl>,
}

impl ProcessLifecycleManager {
    pub fn new(control: Arc<dyn ProcessControl>) -> Self {
        Self { control }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemProcessControl))
    }

    /// Bring the app forward, reopening it from its bundle if it shows no window.
    pub fn activate(&self, app: &RunningApp) -> Result<Activation, ActionError> {
        if !self.control.is_running(app.pid) {
            warn!("Cannot find running app {} ({})", app.name, app.pid);
            return Err(ActionError::ProcessNotFound { pid: app.pid });
        }

        if self.control.activate(app.pid) {
            if self.control.has_visible_window(app.pid) {
                info!("Activated {}", app.name);
                return Ok(Activation::Foreground);
            }
            // activated but windowless: ask the app to reopen a window
            if let Some(bundle) = &app.bundle_path {
                return match self.control.open_application(bundle) {
                    Ok(()) => {
                        info!("Reopened {} from {:?}", app.name, bundle);
                        Ok(Activation::Relaunched)
                    }
                    Err(e) => {
                        warn!("Failed to reopen {}: {:?}", app.name, e);
                        Ok(Activation::Foreground)
                    }
                };
            }
            info!("Activated {} without a visible window", app.name);
            return Ok(Activation::Foreground);
        }

        if let Some(bundle) = &app.bundle_path {
            match self.control.open_application(bundle) {
                Ok(()) => {
                    info!("Opened {} from {:?}", app.name, bundle);
                    return Ok(Activation::Relaunched);
                }
                Err(e) => warn!("Failed to open {}: {:?}", app.name, e),
            }
        }

        warn!("Failed to activate {}", app.name);
        Err(ActionError::ActivationFailed {
            name: app.name.clone(),
        })
    }

    /// Quit the app, escalating to a kill after `grace_period`.
    ///
    /// `completion` runs exactly once on a background thread.
    pub fn terminate<F>(&self, app: &RunningApp, grace_period: Duration, completion: F)
    where
        F: FnOnce(TerminateOutcome) + Send + 'static,
    {
        let control = Arc::clone(&self.control);
        let pid = app.pid;
        let name = app.name.clone();

        thread::spawn(move || {
            let outcome = terminate_blocking(control.as_ref(), pid, &name, grace_period);
            completion(outcome);
        });
    }
}

fn terminate_blocking(
    control: &dyn ProcessControl,
    pid: Pid,
    name: &str,
    grace_period: Duration,
) -> TerminateOutcome {
    if !control.is_running(pid) {
        warn!("Cannot find running app {} ({})", name, pid);
        return TerminateOutcome::NotFound;
    }

    let requested = control.request_terminate(pid);
    info!("Attempting graceful termination of {}, result: {}", name, requested);

    if !requested {
        let forced = control.force_terminate(pid);
        info!("Force terminate of {} result: {}", name, forced);
        return TerminateOutcome::ForcedImmediately(forced);
    }

    thread::sleep(grace_period);
    if !control.is_running(pid) {
        info!("{} terminated gracefully", name);
        return TerminateOutcome::Graceful;
    }

    debug!("{} did not respond within {:?}, force terminating", name, grace_period);
    let forced = control.force_terminate(pid);
    info!("Force terminate of {} result: {}", name, forced);
    TerminateOutcome::ForcedAfterTimeout(forced)
}

/// Real process control backed by sysinfo and AppKit.
pub struct SystemProcessControl;

impl SystemProcessControl {
    fn with_process<T>(pid: Pid, f: impl FnOnce(&sysinfo::Process) -> T) -> Option<T> {
        let pid = SysPid::from_u32(pid);
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid)
            .filter(|p| p.status() != ProcessStatus::Zombie)
            .map(f)
    }
}

impl ProcessControl for SystemProcessControl {
    fn is_running(&self, pid: Pid) -> bool {
        Self::with_process(pid, |_| ()).is_some()
    }

    fn activate(&self, pid: Pid) -> bool {
        osx::activate_app(pid)
    }

    fn has_visible_window(&self, pid: Pid) -> bool {
        osx::has_visible_window(pid)
    }

    fn open_application(&self, bundle: &Path) -> anyhow::Result<()> {
        open_application(bundle)
    }

    fn request_terminate(&self, pid: Pid) -> bool {
        match osx::terminate_app(pid) {
            Some(ok) => ok,
            None => Self::with_process(pid, |p| p.kill_with(Signal::Term).unwrap_or(false))
                .unwrap_or(false),
        }
    }

    fn force_terminate(&self, pid: Pid) -> bool {
        Self::with_process(pid, |p| p.kill()).unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scriptable process table used across the crate's tests.
    #[derive(Default)]
    pub(crate) struct FakeControl {
        pub running: AtomicBool,
        pub activates: AtomicBool,
        pub visible_window: AtomicBool,
        pub open_ok: AtomicBool,
        pub quit_delivered: AtomicBool,
        pub quits_on_request: AtomicBool,
        pub kill_ok: AtomicBool,
        pub force_calls: AtomicUsize,
        pub opened: Mutex<Vec<PathBuf>>,
    }

    impl FakeControl {
        pub(crate) fn running() -> Self {
            let control = FakeControl::default();
            control.running.store(true, Ordering::SeqCst);
            control.activates.store(true, Ordering::SeqCst);
            control.visible_window.store(true, Ordering::SeqCst);
            control.quit_delivered.store(true, Ordering::SeqCst);
            control.quits_on_request.store(true, Ordering::SeqCst);
            control.kill_ok.store(true, Ordering::SeqCst);
            control.open_ok.store(true, Ordering::SeqCst);
            control
        }
    }

    impl ProcessControl for FakeControl {
        fn is_running(&self, _pid: Pid) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn activate(&self, _pid: Pid) -> bool {
            self.activates.load(Ordering::SeqCst)
        }

        fn has_visible_window(&self, _pid: Pid) -> bool {
            self.visible_window.load(Ordering::SeqCst)
        }

        fn open_application(&self, bundle: &Path) -> anyhow::Result<()> {
            self.opened.lock().unwrap().push(bundle.to_path_buf());
            if self.open_ok.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(anyhow::anyhow!("open failed"))
            }
        }

        fn request_terminate(&self, _pid: Pid) -> bool {
            let delivered = self.quit_delivered.load(Ordering::SeqCst);
            if delivered && self.quits_on_request.load(Ordering::SeqCst) {
                self.running.store(false, Ordering::SeqCst);
            }
            delivered
        }

        fn force_terminate(&self, _pid: Pid) -> bool {
            self.force_calls.fetch_add(1, Ordering::SeqCst);
            let ok = self.kill_ok.load(Ordering::SeqCst);
            if ok {
                self.running.store(false, Ordering::SeqCst);
            }
            ok
        }
    }

    pub(crate) fn app(pid: Pid) -> RunningApp {
        RunningApp {
            id: format!("com.example.app{pid}"),
            name: format!("App {pid}"),
            icon: std::sync::Weak::new(),
            bundle_path: Some(PathBuf::from(format!("/Applications/App{pid}.app"))),
            pid,
        }
    }

    fn terminate_and_wait(control: Arc<FakeControl>) -> TerminateOutcome {
        let manager = ProcessLifecycleManager::new(control);
        let (tx, rx) = mpsc::channel();
        manager.terminate(&app(7), Duration::from_millis(20), move |outcome| {
            tx.send(outcome).unwrap();
        });
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        // completion must not fire twice
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        outcome
    }

    #[test]
    fn graceful_exit_skips_force() {
        let control = Arc::new(FakeControl::running());
        let outcome = terminate_and_wait(control.clone());
        assert_eq!(outcome, TerminateOutcome::Graceful);
        assert!(outcome.succeeded());
        assert_eq!(control.force_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unresponsive_app_is_forced_once() {
        let control = Arc::new(FakeControl::running());
        control.quits_on_request.store(false, Ordering::SeqCst);
        control.kill_ok.store(false, Ordering::SeqCst);

        let outcome = terminate_and_wait(control.clone());
        assert_eq!(outcome, TerminateOutcome::ForcedAfterTimeout(false));
        assert!(!outcome.succeeded());
        assert_eq!(control.force_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn undeliverable_quit_forces_immediately() {
        let control = Arc::new(FakeControl::running());
        control.quit_delivered.store(false, Ordering::SeqCst);

        let outcome = terminate_and_wait(control.clone());
        assert_eq!(outcome, TerminateOutcome::ForcedImmediately(true));
        assert_eq!(control.force_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_process_fails_without_action() {
        let control = Arc::new(FakeControl::default());
        let outcome = terminate_and_wait(control.clone());
        assert_eq!(outcome, TerminateOutcome::NotFound);
        assert_eq!(control.force_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn activate_with_visible_window_stays_foreground() {
        let control = Arc::new(FakeControl::running());
        let manager = ProcessLifecycleManager::new(control.clone());
        assert_eq!(manager.activate(&app(3)).unwrap(), Activation::Foreground);
        assert!(control.opened.lock().unwrap().is_empty());
    }

    #[test]
    fn windowless_activation_reopens_bundle() {
        let control = Arc::new(FakeControl::running());
        control.visible_window.store(false, Ordering::SeqCst);
        let manager = ProcessLifecycleManager::new(control.clone());

        assert_eq!(manager.activate(&app(3)).unwrap(), Activation::Relaunched);
        assert_eq!(
            control.opened.lock().unwrap().as_slice(),
            &[PathBuf::from("/Applications/App3.app")]
        );
    }

    #[test]
    fn refused_activation_falls_back_then_fails() {
        let control = Arc::new(FakeControl::running());
        control.activates.store(false, Ordering::SeqCst);
        let manager = ProcessLifecycleManager::new(control.clone());
        assert_eq!(manager.activate(&app(3)).unwrap(), Activation::Relaunched);

        control.open_ok.store(false, Ordering::SeqCst);
        assert!(matches!(
            manager.activate(&app(3)),
            Err(ActionError::ActivationFailed { .. })
        ));
    }

    #[test]
    fn activate_missing_process_is_not_found() {
        let manager = ProcessLifecycleManager::new(Arc::new(FakeControl::default()));
        assert!(matches!(
            manager.activate(&app(9)),
            Err(ActionError::ProcessNotFound { pid: 9 })
        ));
    }
}
