use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use plist::Value;
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
    thread,
};
use tracing::{debug, warn};

use crate::types::IconImage;

// OS-facing helpers: reading bundle metadata and icons, locating the bundle a
// process runs from, relaunching a bundle, and moving files out of the way.

/// Metadata read from a bundle's Contents/Info.plist.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BundleInfo {
    pub bundle_id: Option<String>,
    pub name: Option<String>,
    pub icon_file: Option<PathBuf>,
    /// LSUIElement or LSBackgroundOnly: the app has no regular UI presence.
    pub agent: bool,
}

/// Read identifier, display name, icon and agent flags from Contents/Info.plist
pub fn read_bundle_info(bundle: &Path) -> Result<BundleInfo> {
    let info = bundle.join("Contents").join("Info.plist");
    if !info.exists() {
        return Ok(BundleInfo::default());
    }
    let v = Value::from_file(&info).with_context(|| format!("Read plist {:?}", info))?;
    let Some(dict) = v.as_dictionary() else {
        return Ok(BundleInfo::default());
    };

    let string = |key: &str| dict.get(key).and_then(|v| v.as_string()).map(|s| s.to_string());
    let flag = |key: &str| {
        dict.get(key)
            .map(|v| match v {
                Value::Boolean(b) => *b,
                Value::String(s) => s == "1" || s.eq_ignore_ascii_case("yes"),
                Value::Integer(i) => i.as_signed() == Some(1),
                _ => false,
            })
            .unwrap_or(false)
    };

    let icon_file = string("CFBundleIconFile").map(|name| {
        let mut file = bundle.join("Contents").join("Resources").join(name);
        if file.extension().is_none() {
            file.set_extension("icns");
        }
        file
    });

    Ok(BundleInfo {
        bundle_id: string("CFBundleIdentifier"),
        name: string("CFBundleDisplayName").or_else(|| string("CFBundleName")),
        icon_file,
        agent: flag("LSUIElement") || flag("LSBackgroundOnly"),
    })
}

/// The outermost `.app` bundle an executable runs from, if it is that bundle's
/// main executable (`<bundle>/Contents/MacOS/<exe>`). Helpers nested inside
/// another bundle resolve to `None`.
pub fn bundle_for_executable(exe: &Path) -> Option<PathBuf> {
    let outermost = exe
        .ancestors()
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("app"))
        .last()?;
    let macos_dir = exe.parent()?;
    let contents = macos_dir.parent()?;
    if macos_dir.file_name()? != "MacOS" || contents.file_name()? != "Contents" {
        return None;
    }
    if contents.parent()? != outermost {
        return None;
    }
    Some(outermost.to_path_buf())
}

/// Launch (or re-open) a bundle and bring it forward without hiding other apps.
///
/// Returns as soon as `open` is running; its exit status is only logged.
pub fn open_application(bundle: &Path) -> Result<()> {
    if !cfg!(target_os = "macos") {
        return Err(anyhow::anyhow!(
            "Opening application bundles is supported only on macOS"
        ));
    }
    let mut cmd = Command::new("open");
    cmd.arg("-a").arg(bundle);
    spawn_logged(cmd, format!("open -a {:?}", bundle))
}

/// Start `cmd` and reap it on a background thread, logging how it exited.
fn spawn_logged(mut cmd: Command, label: String) -> Result<()> {
    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to run {}", label))?;
    thread::spawn(move || match child.wait() {
        Ok(status) if status.success() => debug!("{} finished", label),
        Ok(status) => warn!("{} exited with {}", label, status),
        Err(e) => warn!("Waiting for {} failed: {}", label, e),
    });
    Ok(())
}

/// Decode an encoded icon and scale it to a `side` x `side` square.
pub fn decode_icon(bytes: &[u8], side: u32) -> Result<IconImage> {
    let img = image::load_from_memory(bytes).context("Decode icon")?;
    let rgba = img.to_rgba8();
    let rgba = if rgba.dimensions() == (side, side) {
        rgba
    } else {
        imageops::resize(&rgba, side, side, FilterType::Triangle)
    };
    Ok(IconImage {
        size: [side as usize, side as usize],
        rgba: rgba.into_raw(),
    })
}

/// Move to trash (preferred) else remove directly
pub fn move_to_trash_or_remove(path: &Path) -> Result<()> {
    match trash::delete(path) {
        Ok(_) => Ok(()),
        Err(trash_err) => {
            warn!("Trash failed for {:?}: {}; removing directly", path, trash_err);
            if path.is_dir() {
                fs::remove_dir_all(path)
                    .with_context(|| format!("Failed to remove dir {:?}", path))?;
            } else if path.is_file() {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove file {:?}", path))?;
            } else {
                return Err(anyhow::anyhow!("Unknown path type: {:?}", path));
            }
            Ok(())
        }
    }
}

/// Discard every file, in order. Returns the failures; an empty vec means all succeeded.
pub fn discard_files(paths: &[PathBuf]) -> Vec<(PathBuf, anyhow::Error)> {
    let mut failures = Vec::new();
    for p in paths {
        if let Err(e) = move_to_trash_or_remove(p) {
            failures.push((p.clone(), e));
        }
    }
    failures
}
