//! Sandcastle - live-coding sandbox with a supervised preview process
//!
//! Edits to a small server program are re-run continuously as a managed
//! child process; its console output is streamed to an observer and the
//! preview pane state is reconciled after every save.

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod history;
pub mod observer;
pub mod session;
pub mod workspace;

// Re-exports
pub use crate::core::{
    pane_layout, Classification, EmptyReason, EntryDetector, LaunchMode, LaunchSpec, PaneLayout,
    PreviewState, ProcessEvent, Reconciler, SideContent, Supervisor, ViewMode,
};
pub use config::Config;
pub use error::SupervisorError;
pub use history::{RunOutcome, RunRecord, SessionRecord};
pub use observer::{NullObserver, SessionObserver};
pub use session::Session;
pub use workspace::{FileNode, NodeKind, Workspace};

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
