//! Preview reconciler - decides what the preview pane shows
//!
//! A small state machine over `{NoProcess, Launching, Live, Unresolved,
//! LaunchFailed}`. Every entry-file save returns it to `NoProcess` before
//! the stop/start cycle; the derived `PreviewState` is what observers see.

/// Why the preview pane shows the empty-state graphic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    /// Nothing has been launched yet, or the last process was torn down
    NotRunning,
    /// A launch cycle is in flight
    Starting,
    /// Service-style source with no extractable route
    NoRoute,
    /// The program runs in script mode; logs stream but there is no route
    ScriptMode,
    /// The spawn call failed
    LaunchFailed(String),
    /// The process exited with a nonzero status while it was supposed to live
    Crashed(i32),
    /// The process ran to completion
    Finished,
}

impl EmptyReason {
    /// User-facing caption for the empty-state pane
    pub fn caption(&self) -> String {
        match self {
            Self::NotRunning => "There is no running app. Try writing one in the editor.".into(),
            Self::Starting => "Starting your app...".into(),
            Self::NoRoute => {
                "Your app registers a service but no route path was found.".into()
            }
            Self::ScriptMode => "Running as a script; watch the console for output.".into(),
            Self::LaunchFailed(err) => format!("The app could not be launched: {}", err),
            Self::Crashed(code) => format!("The app exited with status {}.", code),
            Self::Finished => "The script finished. Output is in the console.".into(),
        }
    }
}

/// What the preview pane should display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    Empty { reason: EmptyReason },
    Live { url: String },
}

impl std::fmt::Display for PreviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty { reason } => write!(f, "empty ({})", reason.caption()),
            Self::Live { url } => write!(f, "live at {}", url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RunState {
    NoProcess,
    Launching { route: String },
    Live { url: Option<String> },
    Unresolved,
    LaunchFailed { message: String },
}

/// Reconciles classification + process liveness into the preview pane state
pub struct Reconciler {
    state: RunState,
    /// Reason shown while no process exists; refined by exit events
    idle_reason: EmptyReason,
    server_address: String,
}

impl Reconciler {
    pub fn new(server_address: String) -> Self {
        Self {
            state: RunState::NoProcess,
            idle_reason: EmptyReason::NotRunning,
            server_address,
        }
    }

    /// Return to `NoProcess` ahead of a stop/start cycle
    pub fn begin_cycle(&mut self) {
        self.state = RunState::NoProcess;
        self.idle_reason = EmptyReason::Starting;
    }

    /// A service classification was produced and the supervisor will start
    pub fn mark_launching(&mut self, route: &str) {
        self.state = RunState::Launching {
            route: route.to_string(),
        };
    }

    /// The service process started; compose the previewed URL
    pub fn mark_live_service(&mut self) {
        let route = match &self.state {
            RunState::Launching { route } => route.clone(),
            other => {
                log::warn!("live-service transition out of {:?}", other);
                String::new()
            }
        };
        let url = format!("{}{}", self.server_address.trim_end_matches('/'), route);
        self.state = RunState::Live { url: Some(url) };
    }

    /// A script-mode process started; live, but nothing to preview
    pub fn mark_live_script(&mut self) {
        self.state = RunState::Live { url: None };
    }

    /// Service-style source with no extractable route; nothing was launched
    pub fn mark_unresolved(&mut self) {
        self.state = RunState::Unresolved;
    }

    /// The spawn call failed
    pub fn mark_launch_failed(&mut self, message: String) {
        self.state = RunState::LaunchFailed { message };
    }

    /// The supervised process exited on its own
    pub fn mark_exited(&mut self, exit_code: Option<i32>) {
        self.idle_reason = match exit_code {
            Some(0) | None => EmptyReason::Finished,
            Some(code) => EmptyReason::Crashed(code),
        };
        self.state = RunState::NoProcess;
    }

    /// Whether a live URL is currently previewed
    pub fn is_live(&self) -> bool {
        matches!(self.state, RunState::Live { url: Some(_) })
    }

    /// Derive the preview pane state
    pub fn preview_state(&self) -> PreviewState {
        match &self.state {
            RunState::NoProcess => PreviewState::Empty {
                reason: self.idle_reason.clone(),
            },
            RunState::Launching { .. } => PreviewState::Empty {
                reason: EmptyReason::Starting,
            },
            RunState::Live { url: Some(url) } => PreviewState::Live { url: url.clone() },
            RunState::Live { url: None } => PreviewState::Empty {
                reason: EmptyReason::ScriptMode,
            },
            RunState::Unresolved => PreviewState::Empty {
                reason: EmptyReason::NoRoute,
            },
            RunState::LaunchFailed { message } => PreviewState::Empty {
                reason: EmptyReason::LaunchFailed(message.clone()),
            },
        }
    }
}
