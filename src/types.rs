//! Core data types shared across the application.

use egui::Vec2;
use std::path::PathBuf;
use std::sync::Weak;

/// Numeric process identifier as reported by the OS.
pub type Pid = u32;

/// Decoded icon pixels, straight (unmultiplied) RGBA rows.
#[derive(Clone, Debug, PartialEq)]
pub struct IconImage {
    pub size: [usize; 2],
    pub rgba: Vec<u8>,
}

/// Icon resolved for an application bundle. Owned by the directory's icon cache.
///
/// `image` is `None` when the bundle icon could not be read; the card then
/// falls back to the first letter of the name.
#[derive(Debug, Default)]
pub struct AppIcon {
    pub image: Option<IconImage>,
}

/// One eligible running application, as shown on a card.
///
/// Built fresh on every directory refresh and never mutated afterwards.
/// Two handles are equal when their identifiers are equal.
#[derive(Clone, Debug)]
pub struct RunningApp {
    /// Bundle identifier, or the bundle path, or the pid as a last resort.
    pub id: String,
    pub name: String,
    pub icon: Weak<AppIcon>,
    pub bundle_path: Option<PathBuf>,
    pub pid: Pid,
}

impl RunningApp {
    /// First letter of the display name, used as the card glyph when no icon loads.
    pub fn first_letter(&self) -> Option<char> {
        self.name
            .trim()
            .chars()
            .find(|c| c.is_alphabetic())
            .and_then(|c| c.to_uppercase().next())
    }
}

impl PartialEq for RunningApp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RunningApp {}

/// Pointer-drag lifecycle of a single card.
///
/// The offset travels unchanged from `Dragging` through `Dissolving`; only
/// `Idle` has no offset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum CardDragState {
    #[default]
    Idle,
    Dragging(Vec2),
    NearTarget(Vec2),
    ReleasedInTarget(Vec2),
    Dissolving(Vec2),
}

impl CardDragState {
    pub fn offset(&self) -> Vec2 {
        match *self {
            CardDragState::Dragging(offset)
            | CardDragState::NearTarget(offset)
            | CardDragState::ReleasedInTarget(offset)
            | CardDragState::Dissolving(offset) => offset,
            CardDragState::Idle => Vec2::ZERO,
        }
    }

    /// Pointer still held (including the near-target state).
    pub fn is_dragging(&self) -> bool {
        matches!(self, CardDragState::Dragging(_) | CardDragState::NearTarget(_))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CardDragState::Idle)
    }
}

/// File-drag lifecycle over the panel window.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FileDragState {
    #[default]
    Idle,
    Entered(Vec<PathBuf>),
    OverIndicatorZone(Vec<PathBuf>),
    OverTarget(Vec<PathBuf>),
    Processing,
}

impl FileDragState {
    /// Files are being dragged over the window and not yet handed off.
    pub fn has_files(&self) -> bool {
        !matches!(self, FileDragState::Idle | FileDragState::Processing)
    }

    pub fn files(&self) -> &[PathBuf] {
        match self {
            FileDragState::Entered(files)
            | FileDragState::OverIndicatorZone(files)
            | FileDragState::OverTarget(files) => files,
            FileDragState::Idle | FileDragState::Processing => &[],
        }
    }

    /// Consume the state and take ownership of the carried file list.
    pub fn into_files(self) -> Vec<PathBuf> {
        match self {
            FileDragState::Entered(files)
            | FileDragState::OverIndicatorZone(files)
            | FileDragState::OverTarget(files) => files,
            FileDragState::Idle | FileDragState::Processing => Vec::new(),
        }
    }
}

/// What the drop indicator currently looks like. Derived from `FileDragState`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndicatorState {
    #[default]
    Hidden,
    IndicatorShown,
    Morphing,
    MorphedToTarget,
}

/// What happens to files handed to the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileAction {
    Share,
    Discard,
}

/// Kind of action a completion report refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Activate,
    Terminate,
    Files(FileAction),
}

/// Completion message sent from background work back to the UI thread.
#[derive(Clone, Debug)]
pub struct ActionUpdate {
    pub kind: ActionKind,
    /// Drag or file session the action was started from.
    pub session: u64,
    pub success: bool,
    pub message: String,
}
