use sandcastle::{
    pane_layout, Classification, Config, EmptyReason, EntryDetector, NullObserver, PreviewState,
    Session, SideContent, ViewMode,
};
use std::time::Duration;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> Config {
    Config {
        workspace_root: dir.path().join("project"),
        interpreter: "sh".to_string(),
        poll_interval_ms: 20,
        grace_period_ms: 1000,
        history_dir: Some(dir.path().join("sessions")),
        export_dir: Some(dir.path().join("exports")),
        ..Config::default()
    }
}

#[test]
fn test_classification_of_starter_shapes() {
    let detector = EntryDetector::new();

    assert_eq!(
        detector.classify("@app('/dash')\nasync def main(q):\n    pass\n"),
        Classification::Service {
            route: "/dash".to_string()
        }
    );
    assert_eq!(detector.classify("print('hi')\n"), Classification::Script);
    assert_eq!(
        detector.classify("@app(some_page)\n"),
        Classification::Unresolved
    );
}

#[test]
fn test_layout_table() {
    let live = PreviewState::Live {
        url: "http://127.0.0.1:10101/a".to_string(),
    };
    let empty = PreviewState::Empty {
        reason: EmptyReason::NotRunning,
    };

    let split = pane_layout(ViewMode::Split, &live);
    assert_eq!((split.code_pct, split.side_pct), (50, 50));

    let code = pane_layout(ViewMode::Code, &empty);
    assert_eq!((code.code_pct, code.side_pct), (100, 0));

    let preview = pane_layout(ViewMode::Preview, &empty);
    assert_eq!(preview.side, SideContent::Placeholder);

    let console = pane_layout(ViewMode::Console, &live);
    assert_eq!(console.side, SideContent::Console);
    assert_eq!((console.code_pct, console.side_pct), (0, 100));
}

#[tokio::test]
async fn test_session_end_to_end_script_flow() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("project");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("app.py"), "printf 'ready\\n'\n").unwrap();

    let mut session = Session::new(test_config(&dir), Box::new(NullObserver)).unwrap();
    session.bootstrap().await.unwrap();
    assert_eq!(session.classification(), &Classification::Script);

    // Wait for the script to finish and be reaped
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while session.is_running() {
        session.pump_events().await.unwrap();
        assert!(tokio::time::Instant::now() < deadline, "script never exited");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(session.log_snapshot().contains("ready"));

    // Export produces a zip in the configured directory
    let archive = session.export().unwrap();
    assert!(archive.exists());
    assert_eq!(archive.extension().and_then(|e| e.to_str()), Some("zip"));

    session.shutdown().await.unwrap();
    assert!(!root.exists());

    // The journal survived the workspace teardown
    let sessions = sandcastle::SessionRecord::list_all(&dir.path().join("sessions")).unwrap();
    assert_eq!(sessions.len(), 1);
}
