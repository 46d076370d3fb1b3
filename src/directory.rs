//! Snapshot of the running applications eligible for cards.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use sysinfo::System;
use tracing::{debug, warn};

use crate::core::{bundle_for_executable, decode_icon, read_bundle_info};
use crate::osx;
use crate::types::{AppIcon, Pid, RunningApp};

pub const ICON_CACHE_CAPACITY: usize = 128;
/// Edge of the square icon bitmaps, in pixels.
pub const ICON_SIDE: u32 = 128;

/// One process as reported by the OS, before eligibility filtering.
#[derive(Clone, Debug, Default)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub bundle_path: Option<PathBuf>,
    pub bundle_id: Option<String>,
    pub name: Option<String>,
    pub icon_path: Option<PathBuf>,
    /// Regular UI application (not an agent or background-only process).
    pub regular: bool,
}

pub trait ProcessEnumerator {
    fn snapshot(&self) -> Result<Vec<ProcessRecord>>;
    fn frontmost(&self) -> Option<Pid>;
    fn has_visible_window(&self, pid: Pid) -> bool;
    /// Load the icon for a record. Only called on an icon cache miss.
    fn icon(&self, record: &ProcessRecord) -> AppIcon;
}

/// Bounded icon cache keyed by application identifier. Oldest entries go first.
#[derive(Debug)]
pub struct IconCache {
    capacity: usize,
    entries: HashMap<String, Arc<AppIcon>>,
    order: VecDeque<String>,
}

impl IconCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get_or_insert_with(&mut self, key: &str, f: impl FnOnce() -> AppIcon) -> Arc<AppIcon> {
        if let Some(icon) = self.entries.get(key) {
            return Arc::clone(icon);
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        let icon = Arc::new(f());
        self.entries.insert(key.to_string(), Arc::clone(&icon));
        self.order.push_back(key.to_string());
        icon
    }
}

pub struct RunningAppDirectory<E> {
    enumerator: E,
    icons: IconCache,
    self_pid: Pid,
}

impl<E: ProcessEnumerator> RunningAppDirectory<E> {
    pub fn new(enumerator: E, self_pid: Pid) -> Self {
        Self {
            enumerator,
            icons: IconCache::new(ICON_CACHE_CAPACITY),
            self_pid,
        }
    }

    /// Eligible running apps, in process order.
    ///
    /// Without an explicit exclusion the frontmost app is left out, but only
    /// while it has a visible window. Enumeration failure yields an empty list.
    pub fn list(&mut self, excluding: Option<Pid>) -> Vec<RunningApp> {
        let records = match self.enumerator.snapshot() {
            Ok(records) => records,
            Err(e) => {
                warn!("Running app enumeration unavailable: {:?}", e);
                return Vec::new();
            }
        };

        let excluded = excluding.or_else(|| {
            self.enumerator
                .frontmost()
                .filter(|pid| self.enumerator.has_visible_window(*pid))
        });

        let mut seen = HashSet::new();
        let mut apps = Vec::new();
        for record in records {
            if !record.regular || record.pid == self.self_pid || Some(record.pid) == excluded {
                continue;
            }

            let id = record
                .bundle_id
                .clone()
                .or_else(|| record.bundle_path.as_ref().map(|p| p.display().to_string()))
                .unwrap_or_else(|| record.pid.to_string());
            if !seen.insert(id.clone()) {
                continue;
            }

            let icon = self
                .icons
                .get_or_insert_with(&id, || self.enumerator.icon(&record));

            apps.push(RunningApp {
                name: record
                    .name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                icon: Arc::downgrade(&icon),
                bundle_path: record.bundle_path,
                pid: record.pid,
                id,
            });
        }

        debug!(count = apps.len(), ?excluded, "running apps listed");
        apps
    }
}

/// Enumerates `.app` bundles among the live processes using a sysinfo snapshot.
pub struct SystemEnumerator;

impl ProcessEnumerator for SystemEnumerator {
    fn snapshot(&self) -> Result<Vec<ProcessRecord>> {
        let mut sys = System::new_all();
        sys.refresh_all();
        if sys.processes().is_empty() {
            return Err(anyhow::anyhow!("process table is empty"));
        }

        let mut records = Vec::new();
        for (pid, proc_) in sys.processes() {
            let Some(bundle) = proc_.exe().and_then(bundle_for_executable) else {
                continue;
            };
            let info = read_bundle_info(&bundle).unwrap_or_default();
            let pid = pid.as_u32();
            let regular = osx::is_regular_app(pid).unwrap_or(!info.agent);
            let name = info.name.clone().or_else(|| {
                bundle
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
            });
            records.push(ProcessRecord {
                pid,
                bundle_id: info.bundle_id,
                name,
                icon_path: info.icon_file,
                bundle_path: Some(bundle),
                regular,
            });
        }
        records.sort_by_key(|r| r.pid);
        Ok(records)
    }

    fn frontmost(&self) -> Option<Pid> {
        osx::frontmost_pid()
    }

    fn has_visible_window(&self, pid: Pid) -> bool {
        osx::has_visible_window(pid)
    }

    fn icon(&self, record: &ProcessRecord) -> AppIcon {
        let Some(bundle) = &record.bundle_path else {
            return AppIcon::default();
        };
        let Some(png) = osx::icon_png(record.icon_path.as_deref(), bundle, f64::from(ICON_SIDE))
        else {
            debug!("No icon for {:?}", bundle);
            return AppIcon::default();
        };
        match decode_icon(&png, ICON_SIDE) {
            Ok(image) => AppIcon { image: Some(image) },
            Err(e) => {
                warn!("Icon of {:?} unreadable: {:?}", bundle, e);
                AppIcon::default()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::IconImage;
    use pretty_assertions::assert_eq;

    pub(crate) struct FakeEnumerator {
        pub records: Option<Vec<ProcessRecord>>,
        pub frontmost: Option<Pid>,
        pub frontmost_visible: bool,
    }

    impl ProcessEnumerator for FakeEnumerator {
        fn snapshot(&self) -> Result<Vec<ProcessRecord>> {
            self.records
                .clone()
                .ok_or_else(|| anyhow::anyhow!("enumeration failed"))
        }

        fn frontmost(&self) -> Option<Pid> {
            self.frontmost
        }

        fn has_visible_window(&self, _pid: Pid) -> bool {
            self.frontmost_visible
        }

        fn icon(&self, record: &ProcessRecord) -> AppIcon {
            // one pixel tinted by pid so tests can tell icons apart
            let image = record.icon_path.as_ref().map(|_| IconImage {
                size: [1, 1],
                rgba: vec![record.pid as u8, 0, 0, 255],
            });
            AppIcon { image }
        }
    }

    pub(crate) fn record(pid: Pid, bundle_id: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            bundle_path: Some(PathBuf::from(format!("/Applications/{bundle_id}.app"))),
            bundle_id: Some(bundle_id.to_string()),
            name: Some(bundle_id.to_string()),
            icon_path: None,
            regular: true,
        }
    }

    fn ids(apps: &[RunningApp]) -> Vec<&str> {
        apps.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn excludes_self_background_and_duplicates() {
        let mut background = record(30, "agent");
        background.regular = false;
        let enumerator = FakeEnumerator {
            records: Some(vec![
                record(10, "self"),
                record(20, "mail"),
                background,
                record(40, "mail"),
                record(50, "notes"),
            ]),
            frontmost: None,
            frontmost_visible: false,
        };
        let mut directory = RunningAppDirectory::new(enumerator, 10);

        let apps = directory.list(None);
        assert_eq!(ids(&apps), vec!["mail", "notes"]);
        assert_eq!(apps[0].pid, 20);
    }

    #[test]
    fn frontmost_excluded_only_with_visible_window() {
        let mut enumerator = FakeEnumerator {
            records: Some(vec![record(20, "mail"), record(50, "notes")]),
            frontmost: Some(50),
            frontmost_visible: true,
        };
        let mut directory = RunningAppDirectory::new(enumerator, 1);
        assert_eq!(ids(&directory.list(None)), vec!["mail"]);

        enumerator = FakeEnumerator {
            records: Some(vec![record(20, "mail"), record(50, "notes")]),
            frontmost: Some(50),
            frontmost_visible: false,
        };
        directory = RunningAppDirectory::new(enumerator, 1);
        assert_eq!(ids(&directory.list(None)), vec!["mail", "notes"]);
    }

    #[test]
    fn explicit_exclusion_overrides_frontmost() {
        let enumerator = FakeEnumerator {
            records: Some(vec![record(20, "mail"), record(50, "notes")]),
            frontmost: Some(50),
            frontmost_visible: true,
        };
        let mut directory = RunningAppDirectory::new(enumerator, 1);
        assert_eq!(ids(&directory.list(Some(20))), vec!["notes"]);
    }

    #[test]
    fn enumeration_failure_is_empty() {
        let enumerator = FakeEnumerator {
            records: None,
            frontmost: None,
            frontmost_visible: false,
        };
        let mut directory = RunningAppDirectory::new(enumerator, 1);
        assert!(directory.list(None).is_empty());
    }

    #[test]
    fn icons_are_reused_across_refreshes() {
        let enumerator = FakeEnumerator {
            records: Some(vec![record(20, "mail")]),
            frontmost: None,
            frontmost_visible: false,
        };
        let mut directory = RunningAppDirectory::new(enumerator, 1);
        let first = directory.list(None);
        let second = directory.list(None);

        let a = first[0].icon.upgrade().unwrap();
        let b = second[0].icon.upgrade().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(directory.icons.entries.len(), 1);
    }

    #[test]
    fn icons_load_once_per_app() {
        let mut mail = record(20, "mail");
        mail.icon_path = Some(PathBuf::from("/Applications/mail.app/Contents/Resources/mail.icns"));
        let enumerator = FakeEnumerator {
            records: Some(vec![mail, record(50, "notes")]),
            frontmost: None,
            frontmost_visible: false,
        };
        let mut directory = RunningAppDirectory::new(enumerator, 1);
        let apps = directory.list(None);

        let icon = apps[0].icon.upgrade().unwrap();
        assert_eq!(icon.image.as_ref().map(|i| i.rgba[0]), Some(20));
        // no icon file: cached as empty, the card shows the first letter
        assert!(apps[1].icon.upgrade().unwrap().image.is_none());
    }

    #[test]
    fn icon_cache_is_bounded() {
        let mut cache = IconCache::new(2);
        let first = cache.get_or_insert_with("a", AppIcon::default);
        cache.get_or_insert_with("b", AppIcon::default);
        cache.get_or_insert_with("c", AppIcon::default);
        assert_eq!(cache.entries.len(), 2);

        // "a" was evicted, so a new icon is built
        let again = cache.get_or_insert_with("a", AppIcon::default);
        assert!(!Arc::ptr_eq(&first, &again));
    }
}
