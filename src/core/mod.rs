//! Core engine - entry detection, process supervision, log streaming,
//! preview reconciliation and pane layout

mod detect;
mod layout;
mod reconciler;
mod streamer;
mod supervisor;

pub use detect::{Classification, EntryDetector};
pub use layout::{pane_layout, PaneLayout, SideContent, ViewMode};
pub use reconciler::{EmptyReason, PreviewState, Reconciler};
pub use streamer::ProcessEvent;
pub use supervisor::{LaunchMode, LaunchSpec, Supervisor};
