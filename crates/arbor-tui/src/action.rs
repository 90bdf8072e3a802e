//! All possible UI actions. Actions are the sole mechanism for state mutation.

use std::sync::Arc;

use tokio::sync::oneshot;

use arbor_core::{TreeSnapshot, WidgetPhase};

/// Notification severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A toast notification shown in the footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Info,
        }
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Warning,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Error,
        }
    }
}

/// Every state transition in the TUI is expressed as an Action.
#[derive(Debug)]
pub enum Action {
    // ── Lifecycle ──────────────────────────────────────────────────
    Quit,
    Tick,
    Render,
    Resize(u16, u16),

    // ── Tree navigation ───────────────────────────────────────────
    SelectUp,
    SelectDown,
    SelectFirst,
    SelectLast,
    CollapseSelected,
    ExpandSelected,
    ToggleSelected,
    ExpandAll,
    CollapseAll,

    // ── Header ────────────────────────────────────────────────────
    /// User asked for fresh data.
    RequestRefresh,

    // ── Presentation sink ─────────────────────────────────────────
    /// Loading indicator on or off.
    Busy(bool),
    /// A new tree to draw. `drawn` fires once the frame holding it is on screen.
    ShowTree {
        snapshot: Arc<TreeSnapshot>,
        drawn: oneshot::Sender<()>,
    },
    PhaseChanged(WidgetPhase),

    // ── Notifications ─────────────────────────────────────────────
    Notify(Notification),
    DismissNotification,
}
