//! View state machine - pane sizing per selected view
//!
//! Pure and synchronous: `ViewMode` x `PreviewState` maps to a fixed pair of
//! pane widths plus the content shown in the side pane. Recomputed on every
//! view change or preview-state change; no concurrency concerns.

use super::reconciler::PreviewState;
use std::str::FromStr;

/// User-selected layout; persists across edits until changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Split,
    Code,
    Preview,
    Console,
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Split => write!(f, "split"),
            Self::Code => write!(f, "code"),
            Self::Preview => write!(f, "preview"),
            Self::Console => write!(f, "console"),
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "split" => Ok(Self::Split),
            "code" => Ok(Self::Code),
            "preview" => Ok(Self::Preview),
            "console" => Ok(Self::Console),
            other => Err(format!(
                "unknown view mode `{}` (expected split, code, preview or console)",
                other
            )),
        }
    }
}

/// What the side pane carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideContent {
    /// Live frame at the previewed URL
    Preview,
    /// Empty-state graphic with the reason caption
    Placeholder,
    /// The log buffer
    Console,
}

/// Computed pane sizing, widths in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneLayout {
    pub code_pct: u16,
    pub side_pct: u16,
    pub side: SideContent,
}

/// Compute pane sizing for a view mode and the current preview state
pub fn pane_layout(mode: ViewMode, preview: &PreviewState) -> PaneLayout {
    let side = match mode {
        ViewMode::Console => SideContent::Console,
        _ => match preview {
            PreviewState::Live { .. } => SideContent::Preview,
            PreviewState::Empty { .. } => SideContent::Placeholder,
        },
    };

    let (code_pct, side_pct) = match mode {
        ViewMode::Split => (50, 50),
        ViewMode::Code => (100, 0),
        ViewMode::Preview | ViewMode::Console => (0, 100),
    };

    PaneLayout {
        code_pct,
        side_pct,
        side,
    }
}
