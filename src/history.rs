//! Session journal - one JSON record per session under the user's home
//!
//! Tracks every supervised run (mode, route, exit) so past sessions can be
//! inspected after the workspace itself is gone.

use crate::core::LaunchMode;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How a supervised run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Running,
    /// Replaced or torn down by the orchestrator
    Stopped,
    /// Exited on its own with status zero
    Completed,
    /// Exited on its own with a nonzero status
    Crashed,
}

/// One supervised run of the user's program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub mode: String,
    pub route: Option<String>,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub outcome: RunOutcome,
}

/// A session journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub workspace: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub runs: Vec<RunRecord>,
}

impl SessionRecord {
    /// Create a new record for a session over `workspace`
    pub fn new(workspace: String) -> Self {
        let id = Utc::now().format("%Y-%m-%d-%H-%M-%S").to_string();
        Self {
            id,
            workspace,
            started_at: Utc::now(),
            ended_at: None,
            runs: Vec::new(),
        }
    }

    /// Default journal directory
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".sandcastle").join("sessions"))
    }

    /// Track the start of a supervised run
    pub fn begin_run(&mut self, mode: LaunchMode, route: Option<&str>) {
        self.runs.push(RunRecord {
            mode: mode.to_string(),
            route: route.map(|r| r.to_string()),
            started: Utc::now(),
            ended: None,
            exit_code: None,
            outcome: RunOutcome::Running,
        });
    }

    /// Close the current run with its outcome
    pub fn end_run(&mut self, outcome: RunOutcome, exit_code: Option<i32>) {
        if let Some(run) = self.runs.last_mut() {
            if run.outcome == RunOutcome::Running {
                run.ended = Some(Utc::now());
                run.outcome = outcome;
                run.exit_code = exit_code;
            }
        }
    }

    /// Close the session
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Save the record under `dir` and refresh the `latest.json` symlink
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", self.id));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs as unix_fs;
            let latest = dir.join("latest.json");
            let _ = fs::remove_file(&latest);
            unix_fs::symlink(&path, &latest)?;
        }

        Ok(path)
    }

    /// Load a record from a journal file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let record: SessionRecord = serde_json::from_str(&content)?;
        Ok(record)
    }

    /// List session ids under `dir`, most recent first
    pub fn list_all(dir: &Path) -> Result<Vec<String>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if stem != "latest" {
                        sessions.push(stem.to_string());
                    }
                }
            }
        }

        sessions.sort();
        sessions.reverse();
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_tracking() {
        let mut record = SessionRecord::new("project".to_string());
        record.begin_run(LaunchMode::Service, Some("/demo"));
        assert_eq!(record.runs.len(), 1);
        assert_eq!(record.runs[0].outcome, RunOutcome::Running);
        assert_eq!(record.runs[0].mode, "service");

        record.end_run(RunOutcome::Crashed, Some(3));
        assert_eq!(record.runs[0].outcome, RunOutcome::Crashed);
        assert_eq!(record.runs[0].exit_code, Some(3));

        // A closed run is not reopened by a second end
        record.end_run(RunOutcome::Stopped, None);
        assert_eq!(record.runs[0].outcome, RunOutcome::Crashed);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut record = SessionRecord::new("project".to_string());
        record.begin_run(LaunchMode::Script, None);
        record.end_run(RunOutcome::Completed, Some(0));
        record.end();

        let path = record.save_to(dir.path()).unwrap();
        let loaded = SessionRecord::load_from(&path).unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.runs.len(), 1);
        assert!(loaded.ended_at.is_some());

        let listed = SessionRecord::list_all(dir.path()).unwrap();
        assert_eq!(listed, vec![record.id.clone()]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let listed = SessionRecord::list_all(&dir.path().join("nope")).unwrap();
        assert!(listed.is_empty());
    }
}
