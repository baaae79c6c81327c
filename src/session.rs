//! Session orchestration - one edit-or-load event at a time
//!
//! An entry-file save runs the full cycle: reconciler back to no-process,
//! classify the new source, stop whatever ran before, launch the new
//! process (service or script), rebind the streamer, and notify the
//! observer. Everything here is synchronous except the supervisor's
//! awaited stop/start, so cycles never interleave on the single-threaded
//! scheduler.

use crate::config::Config;
use crate::core::{
    pane_layout, Classification, EntryDetector, LaunchSpec, PreviewState, ProcessEvent, Reconciler,
    Supervisor, ViewMode,
};
use crate::error::SupervisorError;
use crate::export::export_workspace;
use crate::history::{RunOutcome, SessionRecord};
use crate::observer::SessionObserver;
use crate::workspace::Workspace;
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// One live-coding session over one workspace
pub struct Session {
    config: Config,
    workspace: Workspace,
    /// File currently open for editing, relative to the workspace root
    active_file: String,
    classification: Classification,
    detector: EntryDetector,
    supervisor: Supervisor,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    reconciler: Reconciler,
    view_mode: ViewMode,
    log_snapshot: String,
    last_preview: PreviewState,
    observer: Box<dyn SessionObserver>,
    record: SessionRecord,
}

impl Session {
    /// Open a session: workspace seeded, nothing launched yet
    pub fn new(config: Config, observer: Box<dyn SessionObserver>) -> Result<Self> {
        let workspace = Workspace::open(&config.workspace_root, &config.entry_file)?;
        let (supervisor, events) = Supervisor::new(config.clone());
        let reconciler = Reconciler::new(config.server_address.clone());
        let record = SessionRecord::new(workspace.root().display().to_string());
        let last_preview = reconciler.preview_state();
        let active_file = config.entry_file.clone();

        Ok(Self {
            config,
            workspace,
            active_file,
            classification: Classification::Script,
            detector: EntryDetector::new(),
            supervisor,
            events,
            reconciler,
            view_mode: ViewMode::default(),
            log_snapshot: String::new(),
            last_preview,
            observer,
            record,
        })
    }

    /// Initial render: classify and launch the entry file as loaded
    pub async fn bootstrap(&mut self) -> Result<()> {
        let source = self.workspace.read_file(&self.config.entry_file)?;
        self.run_cycle(&source).await
    }

    /// Switch the active file, returning its contents
    pub fn open_file(&mut self, rel: &str) -> Result<String> {
        let text = self.workspace.read_file(rel)?;
        self.active_file = rel.to_string();
        Ok(text)
    }

    /// Commit an edit to the active file. Only entry-file saves touch the
    /// classification and the supervised process.
    pub async fn save_active(&mut self, text: &str) -> Result<()> {
        self.workspace.write_file(&self.active_file, text)?;
        if self.active_file == self.config.entry_file {
            self.run_cycle(text).await?;
        } else {
            log::debug!(
                "non-entry file {} saved; launch state untouched",
                self.active_file
            );
        }
        Ok(())
    }

    /// Re-run the entry file from its on-disk contents (external change)
    pub async fn reload_entry(&mut self) -> Result<()> {
        let source = self.workspace.read_file(&self.config.entry_file)?;
        self.run_cycle(&source).await
    }

    async fn run_cycle(&mut self, source: &str) -> Result<()> {
        self.reconciler.begin_cycle();
        let classification = self.detector.classify(source);
        log::info!("entry file classified as {}", classification);
        self.classification = classification.clone();

        if self.supervisor.is_running() {
            self.record.end_run(RunOutcome::Stopped, None);
        }

        match &classification {
            Classification::Unresolved => {
                // Nothing may launch; a stale process would misrepresent
                // the saved code, so it is torn down as well
                self.supervisor.stop().await?;
                self.reconciler.mark_unresolved();
            }
            Classification::Service { route } => {
                self.reconciler.mark_launching(route);
                let spec = LaunchSpec::service(self.workspace.root(), &self.config.entry_file);
                self.launch(spec, Some(route.as_str())).await?;
            }
            Classification::Script => {
                let spec = LaunchSpec::script(self.workspace.root(), &self.config.entry_file);
                self.launch(spec, None).await?;
            }
        }

        // Fresh process, fresh buffer
        self.log_snapshot.clear();
        self.observer.on_log_update(&self.log_snapshot);
        self.save_record();
        self.publish_preview();
        Ok(())
    }

    async fn launch(&mut self, spec: LaunchSpec, route: Option<&str>) -> Result<()> {
        match self.supervisor.start(&spec).await {
            Ok(()) => {
                self.record.begin_run(spec.mode, route);
                match route {
                    Some(_) => self.reconciler.mark_live_service(),
                    None => self.reconciler.mark_live_script(),
                }
            }
            Err(e @ SupervisorError::LaunchFailed { .. }) => {
                log::error!("{}", e);
                self.reconciler.mark_launch_failed(e.to_string());
            }
            Err(fatal) => return Err(fatal.into()),
        }
        Ok(())
    }

    /// Drain pending process events into observer callbacks. Events from a
    /// replaced process carry an older generation and are discarded.
    pub async fn pump_events(&mut self) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            let current = self.supervisor.generation();
            match event {
                ProcessEvent::Started { generation } if generation == current => {
                    log::debug!("process generation {} started", generation);
                }
                ProcessEvent::Output { generation, text } if generation == current => {
                    self.log_snapshot = text;
                    self.observer.on_log_update(&self.log_snapshot);
                }
                ProcessEvent::Eof { generation } if generation == current => {
                    let exit_code = self.supervisor.reap().await?;
                    let outcome = match exit_code {
                        Some(0) | None => RunOutcome::Completed,
                        Some(_) => RunOutcome::Crashed,
                    };
                    self.record.end_run(outcome, exit_code);
                    self.save_record();
                    self.reconciler.mark_exited(exit_code);
                    self.publish_preview();
                }
                stale => log::debug!("discarding stale event {:?}", stale),
            }
        }
        Ok(())
    }

    /// Switch the layout; widths are recomputed immediately
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.view_mode != mode {
            self.view_mode = mode;
            let layout = pane_layout(mode, &self.last_preview);
            self.observer.on_view_mode_change(&layout);
        }
    }

    /// Archive the workspace, returning the archive path
    pub fn export(&self) -> Result<PathBuf> {
        let out_dir = self
            .config
            .export_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("sandcastle-exports"));
        export_workspace(&self.workspace, &out_dir)
    }

    /// Tear the session down: process stopped, journal closed, workspace
    /// directory removed
    pub async fn shutdown(mut self) -> Result<()> {
        if self.supervisor.is_running() {
            self.record.end_run(RunOutcome::Stopped, None);
        }
        self.supervisor.stop().await?;
        self.record.end();
        self.save_record();
        self.workspace.destroy()?;
        log::info!("session closed");
        Ok(())
    }

    fn publish_preview(&mut self) {
        let preview = self.reconciler.preview_state();
        if preview != self.last_preview {
            log::info!("preview is now {}", preview);
            self.observer.on_preview_state_change(&preview);
            self.last_preview = preview;
            let layout = pane_layout(self.view_mode, &self.last_preview);
            self.observer.on_view_mode_change(&layout);
        }
    }

    fn save_record(&self) {
        let Some(dir) = &self.config.history_dir else {
            return;
        };
        if let Err(e) = self.record.save_to(dir) {
            log::warn!("failed to save session journal: {}", e);
        }
    }

    /// Absolute path of the entry file
    pub fn entry_path(&self) -> PathBuf {
        self.workspace.root().join(&self.config.entry_file)
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn preview_state(&self) -> &PreviewState {
        &self.last_preview
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn log_snapshot(&self) -> &str {
        &self.log_snapshot
    }

    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    pub fn pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EmptyReason;
    use crate::observer::NullObserver;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recording {
        logs: Vec<String>,
        previews: Vec<PreviewState>,
    }

    struct RecordingObserver(Rc<RefCell<Recording>>);

    impl SessionObserver for RecordingObserver {
        fn on_log_update(&mut self, text: &str) {
            self.0.borrow_mut().logs.push(text.to_string());
        }

        fn on_preview_state_change(&mut self, state: &PreviewState) {
            self.0.borrow_mut().previews.push(state.clone());
        }
    }

    fn test_config(dir: &TempDir) -> Config {
        Config {
            workspace_root: dir.path().join("project"),
            interpreter: "sh".to_string(),
            poll_interval_ms: 20,
            grace_period_ms: 1000,
            history_dir: None,
            export_dir: None,
            ..Config::default()
        }
    }

    fn seed(dir: &TempDir, content: &str) {
        let root = dir.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("app.py"), content).unwrap();
    }

    async fn wait_until(session: &mut Session, what: &str, pred: impl Fn(&Session) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            session.pump_events().await.unwrap();
            if pred(session) {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {}",
                what
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_script_entry_runs_to_completion() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "printf 'hello\\n'\n");
        let recording = Rc::new(RefCell::new(Recording::default()));
        let mut session = Session::new(
            test_config(&dir),
            Box::new(RecordingObserver(recording.clone())),
        )
        .unwrap();

        session.bootstrap().await.unwrap();
        assert_eq!(session.classification(), &Classification::Script);
        assert_eq!(
            session.preview_state(),
            &PreviewState::Empty {
                reason: EmptyReason::ScriptMode
            }
        );

        wait_until(&mut session, "script exit", |s| !s.is_running()).await;
        assert!(session.log_snapshot().contains("hello"));
        assert_eq!(
            session.preview_state(),
            &PreviewState::Empty {
                reason: EmptyReason::Finished
            }
        );

        // Each snapshot extends the previous one, except the per-run reset
        let logs = recording.borrow().logs.clone();
        for pair in logs.windows(2) {
            assert!(pair[1].is_empty() || pair[1].starts_with(&pair[0]));
        }

        let root = session.workspace().root().to_path_buf();
        session.shutdown().await.unwrap();
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_route_change_restarts_and_resets_logs() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "@app('/old')\n");
        let recording = Rc::new(RefCell::new(Recording::default()));
        let mut session = Session::new(
            test_config(&dir),
            Box::new(RecordingObserver(recording.clone())),
        )
        .unwrap();

        session.bootstrap().await.unwrap();
        assert_eq!(
            session.classification(),
            &Classification::Service {
                route: "/old".to_string()
            }
        );
        match session.preview_state() {
            PreviewState::Live { url } => assert!(url.ends_with("/old")),
            other => panic!("expected live preview, got {:?}", other),
        }

        session.save_active("@app('/new')\n").await.unwrap();
        match session.preview_state() {
            PreviewState::Live { url } => assert!(url.ends_with("/new")),
            other => panic!("expected live preview, got {:?}", other),
        }
        // Buffer was reset before any new output
        assert_eq!(session.log_snapshot(), "");
        assert_eq!(recording.borrow().logs.last().map(String::as_str), Some(""));

        // The observer saw both live states in order
        let previews = recording.borrow().previews.clone();
        let urls: Vec<&str> = previews
            .iter()
            .filter_map(|p| match p {
                PreviewState::Live { url } => Some(url.as_str()),
                PreviewState::Empty { .. } => None,
            })
            .collect();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].ends_with("/old"));
        assert!(urls[1].ends_with("/new"));

        session.shutdown().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_entry_edit_leaves_process_alone() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "exec sleep 30\n");
        let mut session = Session::new(test_config(&dir), Box::new(NullObserver)).unwrap();

        session.bootstrap().await.unwrap();
        let pid = session.pid().expect("process running");

        session.workspace().create_file("notes.txt").unwrap();
        session.open_file("notes.txt").unwrap();
        session.save_active("scratch\n").await.unwrap();

        assert!(session.is_running());
        assert_eq!(session.pid(), Some(pid));
        assert_eq!(session.classification(), &Classification::Script);
        assert_eq!(
            session.workspace().read_file("notes.txt").unwrap(),
            "scratch\n"
        );

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_marker_removed_switches_to_script() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "@app('/app')\n");
        let mut session = Session::new(test_config(&dir), Box::new(NullObserver)).unwrap();

        session.bootstrap().await.unwrap();
        assert!(matches!(
            session.preview_state(),
            PreviewState::Live { .. }
        ));

        session.save_active("echo plain\n").await.unwrap();
        assert_eq!(session.classification(), &Classification::Script);
        assert!(session.is_running());
        assert_eq!(
            session.preview_state(),
            &PreviewState::Empty {
                reason: EmptyReason::ScriptMode
            }
        );

        session.shutdown().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unresolved_save_stops_previous_process() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "while true; do echo tick; sleep 0.02; done\n");
        let mut session = Session::new(test_config(&dir), Box::new(NullObserver)).unwrap();

        session.bootstrap().await.unwrap();
        let pid = session.pid().expect("process running");
        wait_until(&mut session, "first output", |s| !s.log_snapshot().is_empty()).await;

        session.save_active("@app(no_route)\n").await.unwrap();
        assert_eq!(session.classification(), &Classification::Unresolved);
        assert!(!session.is_running());
        assert_eq!(
            session.preview_state(),
            &PreviewState::Empty {
                reason: EmptyReason::NoRoute
            }
        );
        let alive = std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        assert!(!alive);

        // Events queued by the torn-down process are stale; draining them
        // must not disturb the reset buffer or the unresolved preview
        session.pump_events().await.unwrap();
        assert_eq!(session.log_snapshot(), "");
        assert_eq!(
            session.preview_state(),
            &PreviewState::Empty {
                reason: EmptyReason::NoRoute
            }
        );

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_crash_keeps_logs_and_reports_code() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "echo boom\nexit 3\n");
        let mut session = Session::new(test_config(&dir), Box::new(NullObserver)).unwrap();

        session.bootstrap().await.unwrap();
        wait_until(&mut session, "crash", |s| {
            s.preview_state()
                == &PreviewState::Empty {
                    reason: EmptyReason::Crashed(3),
                }
        })
        .await;
        assert!(session.log_snapshot().contains("boom"));

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_launch_failure_is_survivable() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "echo hi\n");
        let config = Config {
            interpreter: "definitely-not-an-interpreter".to_string(),
            ..test_config(&dir)
        };
        let mut session = Session::new(config, Box::new(NullObserver)).unwrap();

        session.bootstrap().await.unwrap();
        assert!(!session.is_running());
        assert!(matches!(
            session.preview_state(),
            PreviewState::Empty {
                reason: EmptyReason::LaunchFailed(_)
            }
        ));

        // The orchestrator stays usable for the next edit
        session.save_active("echo again\n").await.unwrap();
        session.shutdown().await.unwrap();
    }
}
