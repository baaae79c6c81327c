//! Observer interface - how a display layer watches the session
//!
//! Rendering is out of scope; the session only promises that log updates
//! are full snapshots (prefix-monotonic per process) and that preview and
//! layout changes arrive after every reconciliation.

use crate::core::{PaneLayout, PreviewState};

/// Callbacks a display layer can subscribe to. All methods default to
/// no-ops so implementors pick what they care about.
pub trait SessionObserver {
    /// Full accumulated output of the current process
    fn on_log_update(&mut self, _text: &str) {}

    /// The preview pane state changed
    fn on_preview_state_change(&mut self, _state: &PreviewState) {}

    /// The pane layout changed (view switch or preview change)
    fn on_view_mode_change(&mut self, _layout: &PaneLayout) {}
}

/// Observer that ignores everything
pub struct NullObserver;

impl SessionObserver for NullObserver {}
